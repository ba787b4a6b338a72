#![allow(dead_code)]

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use chrono::NaiveDate;
use ledger_engine::{
    chart::ChartOfAccounts,
    events::CollectingSink,
    gl::{Bucket, BucketKey, LedgerStore, MemoryStore},
    time::FixedClock,
    LedgerEngine,
};
use once_cell::sync::Lazy;
use tempfile::TempDir;

/// Holds TempDir guards so temporary folders live for the duration of the test run.
static TEST_DIRS: Lazy<Mutex<Vec<TempDir>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Creates a unique directory that outlives the calling test.
pub fn temp_home() -> PathBuf {
    let temp = TempDir::new().expect("create temp dir");
    let path = temp.path().to_path_buf();
    TEST_DIRS.lock().expect("lock temp dir registry").push(temp);
    path
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub struct TestLedger {
    pub engine: LedgerEngine,
    pub store: Arc<MemoryStore>,
    pub events: Arc<CollectingSink>,
}

/// In-memory engine on the default chart with the clock pinned to `today`.
pub fn memory_engine(today: NaiveDate) -> TestLedger {
    let store = Arc::new(MemoryStore::new());
    let events = Arc::new(CollectingSink::new());
    let engine = LedgerEngine::new(Arc::new(ChartOfAccounts::default()), store.clone())
        .with_events(events.clone())
        .with_clock(Arc::new(FixedClock(today)));
    TestLedger {
        engine,
        store,
        events,
    }
}

pub fn buckets(store: &dyn LedgerStore, user_id: &str) -> Vec<(BucketKey, Bucket)> {
    store.scan_user(user_id).expect("scan buckets")
}

/// Asserts two bucket snapshots agree field by field within one sen.
pub fn assert_buckets_match(left: &[(BucketKey, Bucket)], right: &[(BucketKey, Bucket)]) {
    assert_eq!(left.len(), right.len(), "bucket sets differ in size");
    for ((lkey, lb), (rkey, rb)) in left.iter().zip(right) {
        assert_eq!(lkey, rkey);
        for (a, b) in [
            (lb.total_debits, rb.total_debits),
            (lb.total_credits, rb.total_credits),
            (lb.balance, rb.balance),
        ] {
            assert!((a - b).abs() <= 0.01, "{lkey:?}: {a} != {b}");
        }
    }
}
