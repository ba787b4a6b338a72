//! Reversal engine: offsets a posted entry's effect on the general ledger.
//!
//! Reversal re-derives each line's bucket and applies the negated deltas using the same
//! normal-balance rule as posting. Bucket history is never rewritten, only offset.

use crate::{
    chart::ChartOfAccounts,
    errors::Result,
    gl::{apply_all, BucketDelta, LedgerStore},
    journal::{line_deltas, JournalEntry},
};

/// Deltas that exactly cancel `entry`.
pub fn reversal_deltas(chart: &ChartOfAccounts, entry: &JournalEntry) -> Result<Vec<BucketDelta>> {
    Ok(line_deltas(chart, &entry.user_id, entry.date, &entry.lines)?
        .iter()
        .map(BucketDelta::negated)
        .collect())
}

/// Applies the offsetting deltas of `entry`, all or nothing, and returns what was applied.
pub fn reverse(
    store: &dyn LedgerStore,
    chart: &ChartOfAccounts,
    entry: &JournalEntry,
) -> Result<Vec<BucketDelta>> {
    let deltas = reversal_deltas(chart, entry)?;
    apply_all(store, &deltas)?;
    Ok(deltas)
}
