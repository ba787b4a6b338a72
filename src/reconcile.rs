//! Drift detection and the deliberate full rebuild of a user's general ledger.
//!
//! Statement generators report inconsistencies but never correct them. Correction happens
//! only here, and only when `rebuild` is called explicitly.

use std::{collections::BTreeMap, path::PathBuf};

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    chart::ChartOfAccounts,
    currency::within_tolerance,
    errors::{LedgerError, Result},
    gl::{Bucket, BucketKey, LedgerStore},
    journal::{line_deltas, JournalEntry},
};

/// A bucket whose stored aggregate disagrees with its recomputed value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketDrift {
    pub key: BucketKey,
    pub stored: Bucket,
    pub expected: Bucket,
}

impl BucketDrift {
    pub fn balance_difference(&self) -> f64 {
        self.stored.balance - self.expected.balance
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationReport {
    pub user_id: String,
    pub entries_scanned: usize,
    pub buckets_checked: usize,
    pub drift: Vec<BucketDrift>,
    /// Entries whose lines reference accounts missing from the chart.
    pub unresolved_entries: Vec<Uuid>,
}

impl ReconciliationReport {
    pub fn is_clean(&self) -> bool {
        self.drift.is_empty() && self.unresolved_entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RebuildOutcome {
    /// State found before the rebuild.
    pub report: ReconciliationReport,
    pub buckets_written: usize,
    pub backup: Option<PathBuf>,
}

struct Recomputed {
    buckets: BTreeMap<BucketKey, Bucket>,
    entries_scanned: usize,
    unresolved: Vec<Uuid>,
}

fn recompute(chart: &ChartOfAccounts, entries: &[JournalEntry]) -> Recomputed {
    let mut buckets: BTreeMap<BucketKey, Bucket> = BTreeMap::new();
    let mut unresolved = Vec::new();
    for entry in entries {
        match line_deltas(chart, &entry.user_id, entry.date, &entry.lines) {
            Ok(deltas) => {
                for item in deltas {
                    buckets.entry(item.key).or_default().apply(&item.delta);
                }
            }
            Err(err) => {
                warn!(entry_id = %entry.id, error = %err, "entry cannot be replayed");
                unresolved.push(entry.id);
            }
        }
    }
    Recomputed {
        buckets,
        entries_scanned: entries.len(),
        unresolved,
    }
}

fn differs(stored: &Bucket, expected: &Bucket, tolerance: f64) -> bool {
    !within_tolerance(stored.total_debits, expected.total_debits, tolerance)
        || !within_tolerance(stored.total_credits, expected.total_credits, tolerance)
        || !within_tolerance(stored.balance, expected.balance, tolerance)
}

fn compare(
    user_id: &str,
    stored: Vec<(BucketKey, Bucket)>,
    recomputed: &Recomputed,
    tolerance: f64,
) -> ReconciliationReport {
    let mut stored: BTreeMap<BucketKey, Bucket> = stored.into_iter().collect();
    let mut drift = Vec::new();
    let mut checked = 0;

    for (key, expected) in &recomputed.buckets {
        checked += 1;
        let actual = stored.remove(key).unwrap_or_default();
        if differs(&actual, expected, tolerance) {
            drift.push(BucketDrift {
                key: key.clone(),
                stored: actual,
                expected: *expected,
            });
        }
    }
    // Buckets no entry accounts for should be empty.
    for (key, actual) in stored {
        checked += 1;
        if differs(&actual, &Bucket::default(), tolerance) {
            drift.push(BucketDrift {
                key,
                stored: actual,
                expected: Bucket::default(),
            });
        }
    }
    drift.sort_by(|a, b| a.key.cmp(&b.key));

    ReconciliationReport {
        user_id: user_id.to_string(),
        entries_scanned: recomputed.entries_scanned,
        buckets_checked: checked,
        drift,
        unresolved_entries: recomputed.unresolved.clone(),
    }
}

/// Recomputes every bucket from the stored entries and reports disagreements.
pub fn verify(
    store: &dyn LedgerStore,
    chart: &ChartOfAccounts,
    user_id: &str,
    tolerance: f64,
) -> Result<ReconciliationReport> {
    let entries = store.list_entries(user_id)?;
    let recomputed = recompute(chart, &entries);
    let report = compare(user_id, store.scan_user(user_id)?, &recomputed, tolerance);
    if report.is_clean() {
        info!(user_id, buckets = report.buckets_checked, "ledger verified clean");
    } else {
        warn!(
            user_id,
            drifted = report.drift.len(),
            unresolved = report.unresolved_entries.len(),
            "ledger drift detected"
        );
    }
    Ok(report)
}

/// Replaces the user's buckets and running totals with values recomputed from the entries.
///
/// Refuses to run while any entry references an account missing from the chart, since
/// replaying would silently drop that entry's effect.
pub fn rebuild(
    store: &dyn LedgerStore,
    chart: &ChartOfAccounts,
    user_id: &str,
    tolerance: f64,
) -> Result<RebuildOutcome> {
    let entries = store.list_entries(user_id)?;
    let recomputed = recompute(chart, &entries);
    let report = compare(user_id, store.scan_user(user_id)?, &recomputed, tolerance);
    if let Some(id) = report.unresolved_entries.first() {
        return Err(LedgerError::InvalidInput(format!(
            "entry {id} references accounts missing from the chart; fix the chart before rebuilding"
        )));
    }

    let backup = store.checkpoint(&format!("before rebuild {user_id}"))?;
    let buckets: Vec<(BucketKey, Bucket)> = recomputed.buckets.into_iter().collect();
    let buckets_written = buckets.len();
    store.replace_user_ledger(user_id, buckets)?;
    store.flush()?;

    info!(
        user_id,
        buckets_written,
        corrected = report.drift.len(),
        backup = ?backup,
        "ledger rebuilt from journal entries"
    );
    Ok(RebuildOutcome {
        report,
        buckets_written,
        backup,
    })
}
