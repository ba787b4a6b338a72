//! Validation and staging of journal entries.
//!
//! Staging resolves every account and computes every bucket delta before the general
//! ledger is touched, so a rejected entry never leaves a partial effect behind.

use chrono::NaiveDate;

use crate::{
    chart::ChartOfAccounts,
    currency::{round2, within_tolerance},
    errors::{LedgerError, Result},
    gl::{BucketDelta, BucketKey, Delta},
    time::Period,
};

use super::entry::EntryLine;

/// A fully validated entry together with the deltas it will apply.
#[derive(Debug, Clone)]
pub struct StagedPosting {
    pub date: NaiveDate,
    pub lines: Vec<EntryLine>,
    pub total_debit: f64,
    pub total_credit: f64,
    pub deltas: Vec<BucketDelta>,
}

/// Checks proposed lines against the chart and the balance invariant.
pub struct EntryValidator<'a> {
    chart: &'a ChartOfAccounts,
    tolerance: f64,
}

impl<'a> EntryValidator<'a> {
    pub fn new(chart: &'a ChartOfAccounts, tolerance: f64) -> Self {
        Self { chart, tolerance }
    }

    pub fn validate(
        &self,
        user_id: &str,
        date: NaiveDate,
        lines: &[EntryLine],
    ) -> Result<StagedPosting> {
        if lines.is_empty() {
            return Err(LedgerError::InvalidEntry("entry has no lines".into()));
        }

        let mut normalized = Vec::with_capacity(lines.len());
        for (idx, line) in lines.iter().enumerate() {
            check_amounts(idx, line)?;
            let account = self.chart.lookup(&line.account_code)?;
            normalized.push(EntryLine {
                account_code: account.code.clone(),
                ..line.clone()
            });
        }

        let total_debit: f64 = normalized.iter().map(|line| line.debit).sum();
        let total_credit: f64 = normalized.iter().map(|line| line.credit).sum();
        if !within_tolerance(total_debit, total_credit, self.tolerance) {
            return Err(LedgerError::Balance {
                debits: round2(total_debit),
                credits: round2(total_credit),
            });
        }

        let deltas = line_deltas(self.chart, user_id, date, &normalized)?;
        Ok(StagedPosting {
            date,
            lines: normalized,
            total_debit,
            total_credit,
            deltas,
        })
    }
}

fn check_amounts(idx: usize, line: &EntryLine) -> Result<()> {
    let position = idx + 1;
    if !line.debit.is_finite() || !line.credit.is_finite() {
        return Err(LedgerError::InvalidEntry(format!(
            "line {position} has a non-finite amount"
        )));
    }
    if line.debit < 0.0 || line.credit < 0.0 {
        return Err(LedgerError::InvalidEntry(format!(
            "line {position} has a negative amount"
        )));
    }
    if line.debit == 0.0 && line.credit == 0.0 {
        return Err(LedgerError::InvalidEntry(format!(
            "line {position} ({}) has neither debit nor credit",
            line.account_code.trim()
        )));
    }
    Ok(())
}

/// Computes one bucket delta per line, signed by each account's effective normal balance.
pub fn line_deltas(
    chart: &ChartOfAccounts,
    user_id: &str,
    date: NaiveDate,
    lines: &[EntryLine],
) -> Result<Vec<BucketDelta>> {
    let period = Period::of(date);
    lines
        .iter()
        .map(|line| {
            let account = chart.lookup(&line.account_code)?;
            Ok(BucketDelta {
                key: BucketKey::new(user_id, account.code.clone(), period),
                delta: Delta {
                    debit: line.debit,
                    credit: line.credit,
                    balance: account.signed_delta(line.debit, line.credit),
                },
            })
        })
        .collect()
}
