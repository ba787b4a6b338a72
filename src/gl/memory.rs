use std::{
    collections::{BTreeMap, HashMap},
    ops::Bound,
    sync::{Arc, Mutex, RwLock},
};

use uuid::Uuid;

use crate::{
    errors::{LedgerError, Result},
    journal::JournalEntry,
    time::Period,
};

use super::{AccountTotal, Bucket, BucketKey, Delta, LedgerStore};

type BucketHandle = Arc<Mutex<Bucket>>;

/// One user's slice of the ledger. Users never share locks.
#[derive(Default)]
struct UserLedger {
    buckets: RwLock<BTreeMap<(String, Period), BucketHandle>>,
    totals: RwLock<BTreeMap<String, BucketHandle>>,
    entries: RwLock<BTreeMap<Uuid, JournalEntry>>,
}

/// In-process store with per-bucket locks.
///
/// Map locks are only held to find or create a bucket handle; the delta itself is applied
/// under that bucket's own mutex, so posts to unrelated buckets proceed in parallel.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<String, Arc<UserLedger>>>,
}

fn poisoned<T>(_: T) -> LedgerError {
    LedgerError::Storage("ledger lock poisoned".into())
}

fn handle_for<K: Ord + Clone>(
    map: &RwLock<BTreeMap<K, BucketHandle>>,
    key: &K,
) -> Result<BucketHandle> {
    if let Some(handle) = map.read().map_err(poisoned)?.get(key) {
        return Ok(Arc::clone(handle));
    }
    let mut guard = map.write().map_err(poisoned)?;
    Ok(Arc::clone(guard.entry(key.clone()).or_default()))
}

fn snapshot(handle: &BucketHandle) -> Result<Bucket> {
    Ok(*handle.lock().map_err(poisoned)?)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn user(&self, user_id: &str) -> Result<Option<Arc<UserLedger>>> {
        Ok(self.users.read().map_err(poisoned)?.get(user_id).cloned())
    }

    fn user_or_create(&self, user_id: &str) -> Result<Arc<UserLedger>> {
        if let Some(user) = self.user(user_id)? {
            return Ok(user);
        }
        let mut users = self.users.write().map_err(poisoned)?;
        Ok(Arc::clone(users.entry(user_id.to_string()).or_default()))
    }

    /// Ids of every user holding ledger state.
    pub fn users(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.users.read().map_err(poisoned)?.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    /// Loads state in bulk, recomputing running totals from the buckets.
    pub(crate) fn restore(
        &self,
        buckets: Vec<(BucketKey, Bucket)>,
        entries: Vec<JournalEntry>,
    ) -> Result<()> {
        let mut by_user: BTreeMap<String, Vec<(BucketKey, Bucket)>> = BTreeMap::new();
        for (key, bucket) in buckets {
            by_user.entry(key.user_id.clone()).or_default().push((key, bucket));
        }
        for (user_id, rows) in by_user {
            self.replace_user_ledger(&user_id, rows)?;
        }
        for entry in entries {
            self.save_entry(&entry)?;
        }
        Ok(())
    }

    /// Full dump used by the file-backed store.
    pub(crate) fn dump(&self) -> Result<(Vec<(BucketKey, Bucket)>, Vec<JournalEntry>)> {
        let mut buckets = Vec::new();
        let mut entries = Vec::new();
        for user_id in self.users()? {
            buckets.extend(self.scan_user(&user_id)?);
            entries.extend(self.list_entries(&user_id)?);
        }
        Ok((buckets, entries))
    }
}

impl LedgerStore for MemoryStore {
    fn apply_delta(&self, key: &BucketKey, delta: &Delta) -> Result<()> {
        let user = self.user_or_create(&key.user_id)?;
        let bucket = handle_for(&user.buckets, &(key.account_code.clone(), key.period))?;
        let total = handle_for(&user.totals, &key.account_code)?;

        // Bucket before total, always; readers that need both lock in the same order.
        let mut bucket_guard = bucket.lock().map_err(poisoned)?;
        let mut total_guard = total.lock().map_err(poisoned)?;
        bucket_guard.apply(delta);
        total_guard.apply(delta);
        Ok(())
    }

    fn read_bucket(&self, key: &BucketKey) -> Result<Bucket> {
        let Some(user) = self.user(&key.user_id)? else {
            return Ok(Bucket::default());
        };
        let buckets = user.buckets.read().map_err(poisoned)?;
        let bucket = match buckets.get(&(key.account_code.clone(), key.period)) {
            Some(handle) => snapshot(handle)?,
            None => Bucket::default(),
        };
        Ok(bucket)
    }

    fn account_total(&self, user_id: &str, account_code: &str) -> Result<AccountTotal> {
        let Some(user) = self.user(user_id)? else {
            return Ok(AccountTotal::default());
        };
        let totals = user.totals.read().map_err(poisoned)?;
        let total = match totals.get(account_code) {
            Some(handle) => snapshot(handle)?,
            None => AccountTotal::default(),
        };
        Ok(total)
    }

    fn scan_account(&self, user_id: &str, account_code: &str) -> Result<Vec<(Period, Bucket)>> {
        let Some(user) = self.user(user_id)? else {
            return Ok(Vec::new());
        };
        let lower = (
            account_code.to_string(),
            Period {
                year: i32::MIN,
                month: 1,
            },
        );
        let upper = (
            account_code.to_string(),
            Period {
                year: i32::MAX,
                month: 12,
            },
        );
        let buckets = user.buckets.read().map_err(poisoned)?;
        let rows = buckets
            .range(lower..=upper)
            .map(|((_, period), handle)| Ok((*period, snapshot(handle)?)))
            .collect();
        rows
    }

    /// Running total minus the account's later buckets, read as one view.
    ///
    /// The bucket map stays read-locked so no later bucket can appear, and every later
    /// bucket is locked before the total. `apply_delta` holds a bucket and then the total,
    /// so a post is seen in both or in neither.
    fn cumulative_balance(&self, user_id: &str, account_code: &str, through: Period) -> Result<f64> {
        let Some(user) = self.user(user_id)? else {
            return Ok(0.0);
        };
        let lower = (account_code.to_string(), through);
        let upper = (
            account_code.to_string(),
            Period {
                year: i32::MAX,
                month: 12,
            },
        );
        let buckets = user.buckets.read().map_err(poisoned)?;
        let later: Vec<&BucketHandle> = buckets
            .range((Bound::Excluded(lower), Bound::Included(upper)))
            .map(|(_, handle)| handle)
            .collect();
        let guards = later
            .iter()
            .map(|handle| handle.lock().map_err(poisoned))
            .collect::<Result<Vec<_>>>()?;

        let totals = user.totals.read().map_err(poisoned)?;
        let total = match totals.get(account_code) {
            Some(handle) => snapshot(handle)?,
            None => AccountTotal::default(),
        };
        let later_balance: f64 = guards.iter().map(|bucket| bucket.balance).sum();
        Ok(total.balance - later_balance)
    }

    fn scan_user(&self, user_id: &str) -> Result<Vec<(BucketKey, Bucket)>> {
        let Some(user) = self.user(user_id)? else {
            return Ok(Vec::new());
        };
        let buckets = user.buckets.read().map_err(poisoned)?;
        let rows = buckets
            .iter()
            .map(|((code, period), handle)| {
                Ok((
                    BucketKey::new(user_id, code.clone(), *period),
                    snapshot(handle)?,
                ))
            })
            .collect();
        rows
    }

    fn save_entry(&self, entry: &JournalEntry) -> Result<()> {
        let user = self.user_or_create(&entry.user_id)?;
        user.entries
            .write()
            .map_err(poisoned)?
            .insert(entry.id, entry.clone());
        Ok(())
    }

    fn load_entry(&self, user_id: &str, id: Uuid) -> Result<Option<JournalEntry>> {
        let Some(user) = self.user(user_id)? else {
            return Ok(None);
        };
        let entries = user.entries.read().map_err(poisoned)?;
        Ok(entries.get(&id).cloned())
    }

    fn remove_entry(&self, user_id: &str, id: Uuid) -> Result<Option<JournalEntry>> {
        let Some(user) = self.user(user_id)? else {
            return Ok(None);
        };
        let mut entries = user.entries.write().map_err(poisoned)?;
        Ok(entries.remove(&id))
    }

    fn list_entries(&self, user_id: &str) -> Result<Vec<JournalEntry>> {
        let Some(user) = self.user(user_id)? else {
            return Ok(Vec::new());
        };
        let entries = user.entries.read().map_err(poisoned)?;
        let mut list: Vec<JournalEntry> = entries.values().cloned().collect();
        list.sort_by(|a, b| a.date.cmp(&b.date).then(a.created_at.cmp(&b.created_at)));
        Ok(list)
    }

    fn replace_user_ledger(
        &self,
        user_id: &str,
        buckets: Vec<(BucketKey, Bucket)>,
    ) -> Result<()> {
        let user = self.user_or_create(user_id)?;
        let mut bucket_map = BTreeMap::new();
        let mut total_map: BTreeMap<String, Bucket> = BTreeMap::new();
        for (key, bucket) in buckets {
            if key.user_id != user_id {
                return Err(LedgerError::Storage(format!(
                    "bucket for user {} passed to ledger of {user_id}",
                    key.user_id
                )));
            }
            let total = total_map.entry(key.account_code.clone()).or_default();
            total.total_debits += bucket.total_debits;
            total.total_credits += bucket.total_credits;
            total.balance += bucket.balance;
            bucket_map.insert((key.account_code, key.period), Arc::new(Mutex::new(bucket)));
        }

        let mut bucket_guard = user.buckets.write().map_err(poisoned)?;
        let mut total_guard = user.totals.write().map_err(poisoned)?;
        *bucket_guard = bucket_map;
        *total_guard = total_map
            .into_iter()
            .map(|(code, total)| (code, Arc::new(Mutex::new(total))))
            .collect();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn key(user: &str, code: &str, month: u32) -> BucketKey {
        BucketKey::new(user, code, Period::new(2024, month).unwrap())
    }

    #[test]
    fn missing_bucket_reads_as_zero() {
        let store = MemoryStore::new();
        assert!(store.read_bucket(&key("u1", "1100", 3)).unwrap().is_zero());
        assert!(store.account_total("nobody", "1100").unwrap().is_zero());
    }

    #[test]
    fn concurrent_deltas_to_one_bucket_are_not_lost() {
        let store = Arc::new(MemoryStore::new());
        let target = key("u1", "1100", 3);
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let target = target.clone();
                thread::spawn(move || {
                    for _ in 0..500 {
                        store
                            .apply_delta(
                                &target,
                                &Delta {
                                    debit: 1.0,
                                    credit: 0.0,
                                    balance: 1.0,
                                },
                            )
                            .unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        let bucket = store.read_bucket(&target).unwrap();
        assert_eq!(bucket.total_debits, 4000.0);
        assert_eq!(bucket.balance, 4000.0);
        assert_eq!(store.account_total("u1", "1100").unwrap().balance, 4000.0);
    }

    #[test]
    fn cumulative_balance_is_stable_while_later_months_move() {
        let store = Arc::new(MemoryStore::new());
        let march = key("u1", "1100", 3);
        let may = key("u1", "1100", 5);
        let plus = |amount: f64| Delta {
            debit: amount,
            credit: 0.0,
            balance: amount,
        };
        store.apply_delta(&march, &plus(100.0)).unwrap();
        store.apply_delta(&may, &plus(1.0)).unwrap();

        let writer = {
            let store = Arc::clone(&store);
            let may = may.clone();
            thread::spawn(move || {
                for _ in 0..5_000 {
                    store.apply_delta(&may, &plus(1.0)).unwrap();
                }
            })
        };
        let through = march.period;
        for _ in 0..5_000 {
            assert_eq!(store.cumulative_balance("u1", "1100", through).unwrap(), 100.0);
        }
        writer.join().unwrap();

        assert_eq!(store.cumulative_balance("u1", "1100", through).unwrap(), 100.0);
        assert_eq!(
            store.cumulative_balance("u1", "1100", may.period).unwrap(),
            5_101.0
        );
    }

    #[test]
    fn users_are_isolated() {
        let store = MemoryStore::new();
        let delta = Delta {
            debit: 10.0,
            credit: 0.0,
            balance: 10.0,
        };
        store.apply_delta(&key("alice", "1100", 3), &delta).unwrap();
        assert!(store.read_bucket(&key("bob", "1100", 3)).unwrap().is_zero());
        assert!(store.scan_user("bob").unwrap().is_empty());
        assert_eq!(store.scan_user("alice").unwrap().len(), 1);
    }

    #[test]
    fn replace_recomputes_running_totals() {
        let store = MemoryStore::new();
        let rows = vec![
            (
                key("u1", "1100", 1),
                Bucket {
                    total_debits: 100.0,
                    total_credits: 0.0,
                    balance: 100.0,
                },
            ),
            (
                key("u1", "1100", 2),
                Bucket {
                    total_debits: 0.0,
                    total_credits: 30.0,
                    balance: -30.0,
                },
            ),
        ];
        store.replace_user_ledger("u1", rows).unwrap();
        let total = store.account_total("u1", "1100").unwrap();
        assert_eq!(total.balance, 70.0);
        assert_eq!(store.scan_account("u1", "1100").unwrap().len(), 2);
        assert!(store.scan_account("u1", "1200").unwrap().is_empty());
    }
}
