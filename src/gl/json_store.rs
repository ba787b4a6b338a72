use std::{
    cmp::Reverse,
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    errors::{LedgerError, Result},
    journal::JournalEntry,
    time::Period,
    utils::paths::{ensure_dir, replace_file},
};

use super::{AccountTotal, Bucket, BucketKey, Delta, LedgerStore, MemoryStore};

const CURRENT_SCHEMA_VERSION: u8 = 1;
const BACKUP_EXTENSION: &str = "json";
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const DEFAULT_RETENTION: usize = 5;

#[derive(Serialize, Deserialize)]
struct StoreSnapshot {
    schema_version: u8,
    saved_at: DateTime<Utc>,
    #[serde(default)]
    buckets: Vec<BucketRecord>,
    #[serde(default)]
    entries: Vec<JournalEntry>,
}

#[derive(Serialize, Deserialize)]
struct BucketRecord {
    #[serde(flatten)]
    key: BucketKey,
    #[serde(flatten)]
    bucket: Bucket,
}

/// File-backed store: an in-memory ledger mirrored to a single JSON document.
///
/// Every `flush` rewrites the document through a temporary file and a rename, so a crash
/// leaves either the previous or the new snapshot on disk.
pub struct JsonStore {
    path: PathBuf,
    backups_dir: PathBuf,
    retention: usize,
    inner: MemoryStore,
    write_lock: Mutex<()>,
}

impl JsonStore {
    /// Opens the store at `path`, loading existing state when the file is present.
    pub fn open(path: impl Into<PathBuf>, retention: Option<usize>) -> Result<Self> {
        let path = path.into();
        let parent = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        ensure_dir(&parent)?;
        let backups_dir = parent.join("backups");
        let store = Self {
            path,
            backups_dir,
            retention: retention.unwrap_or(DEFAULT_RETENTION).max(1),
            inner: MemoryStore::new(),
            write_lock: Mutex::new(()),
        };
        if store.path.exists() {
            let data = fs::read_to_string(&store.path)?;
            let snapshot: StoreSnapshot = serde_json::from_str(&data)?;
            if snapshot.schema_version > CURRENT_SCHEMA_VERSION {
                return Err(LedgerError::Storage(format!(
                    "ledger file `{}` is from a newer schema version",
                    store.path.display()
                )));
            }
            let bucket_count = snapshot.buckets.len();
            let entry_count = snapshot.entries.len();
            store.inner.restore(
                snapshot
                    .buckets
                    .into_iter()
                    .map(|record| (record.key, record.bucket))
                    .collect(),
                snapshot.entries,
            )?;
            info!(
                path = %store.path.display(),
                buckets = bucket_count,
                entries = entry_count,
                "ledger store loaded"
            );
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backups_dir(&self) -> &Path {
        &self.backups_dir
    }

    /// Backup files, newest first.
    pub fn list_backups(&self) -> Result<Vec<PathBuf>> {
        if !self.backups_dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.backups_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some(BACKUP_EXTENSION) {
                entries.push(path);
            }
        }
        entries.sort_by_key(|path| Reverse(path.file_name().map(|name| name.to_owned())));
        Ok(entries)
    }

    fn prune_backups(&self) -> Result<()> {
        for stale in self.list_backups()?.iter().skip(self.retention) {
            debug!(path = %stale.display(), "pruning ledger backup");
            let _ = fs::remove_file(stale);
        }
        Ok(())
    }
}

impl LedgerStore for JsonStore {
    fn apply_delta(&self, key: &BucketKey, delta: &Delta) -> Result<()> {
        self.inner.apply_delta(key, delta)
    }

    fn read_bucket(&self, key: &BucketKey) -> Result<Bucket> {
        self.inner.read_bucket(key)
    }

    fn account_total(&self, user_id: &str, account_code: &str) -> Result<AccountTotal> {
        self.inner.account_total(user_id, account_code)
    }

    fn scan_account(&self, user_id: &str, account_code: &str) -> Result<Vec<(Period, Bucket)>> {
        self.inner.scan_account(user_id, account_code)
    }

    fn cumulative_balance(&self, user_id: &str, account_code: &str, through: Period) -> Result<f64> {
        self.inner.cumulative_balance(user_id, account_code, through)
    }

    fn scan_user(&self, user_id: &str) -> Result<Vec<(BucketKey, Bucket)>> {
        self.inner.scan_user(user_id)
    }

    fn save_entry(&self, entry: &JournalEntry) -> Result<()> {
        self.inner.save_entry(entry)
    }

    fn load_entry(&self, user_id: &str, id: Uuid) -> Result<Option<JournalEntry>> {
        self.inner.load_entry(user_id, id)
    }

    fn remove_entry(&self, user_id: &str, id: Uuid) -> Result<Option<JournalEntry>> {
        self.inner.remove_entry(user_id, id)
    }

    fn list_entries(&self, user_id: &str) -> Result<Vec<JournalEntry>> {
        self.inner.list_entries(user_id)
    }

    fn replace_user_ledger(
        &self,
        user_id: &str,
        buckets: Vec<(BucketKey, Bucket)>,
    ) -> Result<()> {
        self.inner.replace_user_ledger(user_id, buckets)
    }

    fn flush(&self) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| LedgerError::Storage("ledger file lock poisoned".into()))?;
        let (buckets, entries) = self.inner.dump()?;
        let snapshot = StoreSnapshot {
            schema_version: CURRENT_SCHEMA_VERSION,
            saved_at: Utc::now(),
            buckets: buckets
                .into_iter()
                .map(|(key, bucket)| BucketRecord { key, bucket })
                .collect(),
            entries,
        };
        let json = serde_json::to_string_pretty(&snapshot)?;
        replace_file(&self.path, &json)
    }

    fn checkpoint(&self, note: &str) -> Result<Option<PathBuf>> {
        self.flush()?;
        ensure_dir(&self.backups_dir)?;
        let stem = self
            .path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("ledger");
        let mut name = format!("{}_{}", stem, Utc::now().format(BACKUP_TIMESTAMP_FORMAT));
        if let Some(label) = sanitize_note(note) {
            name.push('_');
            name.push_str(&label);
        }
        let backup = self.backups_dir.join(format!("{name}.{BACKUP_EXTENSION}"));
        fs::copy(&self.path, &backup)?;
        self.prune_backups()?;
        info!(path = %backup.display(), "ledger checkpoint written");
        Ok(Some(backup))
    }
}

fn sanitize_note(note: &str) -> Option<String> {
    let raw = note.trim();
    if raw.is_empty() {
        return None;
    }
    let mut sanitized = String::new();
    let mut last_dash = false;
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            sanitized.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if (ch.is_whitespace() || matches!(ch, '-' | '.' | '_'))
            && !sanitized.is_empty()
            && !last_dash
        {
            sanitized.push('-');
            last_dash = true;
        }
    }
    let trimmed = sanitized.trim_matches('-').to_string();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
