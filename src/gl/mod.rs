//! General ledger: per-period buckets, running account totals, and the storage boundary.

pub mod bucket;
pub mod json_store;
pub mod memory;

use std::path::PathBuf;

use tracing::warn;
use uuid::Uuid;

use crate::{
    errors::Result,
    journal::JournalEntry,
    time::{Period, PeriodRange},
};

pub use bucket::{AccountKey, AccountTotal, Bucket, BucketDelta, BucketKey, Delta};
pub use json_store::JsonStore;
pub use memory::MemoryStore;

/// Persistence boundary for ledger state.
///
/// `apply_delta` is the only write path for buckets; implementations must apply the bucket
/// and the account's running total as one atomic increment so concurrent posts never lose
/// an update.
pub trait LedgerStore: Send + Sync {
    fn apply_delta(&self, key: &BucketKey, delta: &Delta) -> Result<()>;

    /// Returns the bucket, or an all-zero bucket when nothing was ever posted to it.
    fn read_bucket(&self, key: &BucketKey) -> Result<Bucket>;

    /// All-time running total for one account.
    fn account_total(&self, user_id: &str, account_code: &str) -> Result<AccountTotal>;

    /// Every bucket of one account, in period order.
    fn scan_account(&self, user_id: &str, account_code: &str) -> Result<Vec<(Period, Bucket)>>;

    /// Every bucket a user owns, ordered by account code then period.
    fn scan_user(&self, user_id: &str) -> Result<Vec<(BucketKey, Bucket)>>;

    fn save_entry(&self, entry: &JournalEntry) -> Result<()>;
    fn load_entry(&self, user_id: &str, id: Uuid) -> Result<Option<JournalEntry>>;
    fn remove_entry(&self, user_id: &str, id: Uuid) -> Result<Option<JournalEntry>>;
    fn list_entries(&self, user_id: &str) -> Result<Vec<JournalEntry>>;

    /// Replaces all of a user's buckets and running totals. Reserved for reconciliation.
    fn replace_user_ledger(&self, user_id: &str, buckets: Vec<(BucketKey, Bucket)>)
        -> Result<()>;

    /// Persists pending state. In-memory stores have nothing to do.
    fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Takes a restorable snapshot before destructive operations, when supported.
    fn checkpoint(&self, _note: &str) -> Result<Option<PathBuf>> {
        Ok(None)
    }

    /// Sums the buckets of one account inside `range`.
    fn range_total(&self, user_id: &str, account_code: &str, range: PeriodRange) -> Result<Bucket> {
        let mut sum = Bucket::default();
        for (period, bucket) in self.scan_account(user_id, account_code)? {
            if range.contains(period) {
                sum.add(&bucket);
            }
        }
        Ok(sum)
    }

    /// Cumulative balance from the start of tracking through `through`.
    ///
    /// Each bucket is snapshotted under its own lock, so a concurrent post is either fully
    /// counted in its month or not at all. Stores that keep running totals may answer from
    /// them, provided the total and the later buckets are read as one consistent view.
    fn cumulative_balance(&self, user_id: &str, account_code: &str, through: Period) -> Result<f64> {
        Ok(self
            .scan_account(user_id, account_code)?
            .into_iter()
            .filter(|(period, _)| *period <= through)
            .map(|(_, bucket)| bucket.balance)
            .sum())
    }
}

/// Applies every delta or none: on failure the deltas already applied are rolled back.
pub fn apply_all(store: &dyn LedgerStore, deltas: &[BucketDelta]) -> Result<()> {
    for (idx, item) in deltas.iter().enumerate() {
        if let Err(err) = store.apply_delta(&item.key, &item.delta) {
            for applied in deltas[..idx].iter().rev() {
                let undo = applied.delta.negated();
                if let Err(rollback) = store.apply_delta(&applied.key, &undo) {
                    warn!(
                        account = %applied.key.account_code,
                        period = %applied.key.period,
                        error = %rollback,
                        "rollback of staged delta failed; run reconciliation"
                    );
                }
            }
            return Err(err);
        }
    }
    Ok(())
}
