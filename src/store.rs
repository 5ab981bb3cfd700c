//! Storage collaborator for blacklist entries.
//!
//! The pipeline needs only [`BlacklistStore::list_malicious_variants`],
//! [`BlacklistStore::append_entry`] and [`BlacklistStore::flush`]. Appended
//! entries stay pending until a flush commits them; a failed flush leaves
//! them pending so the next flush picks them up again.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::StorageError;

fn default_blocked() -> bool {
    true
}

/// One persisted lookalike record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlacklistEntry {
    /// Authentic domain, FQDN with root dot
    pub original: String,
    /// Confirmed lookalike, FQDN with root dot
    pub malicious: String,
    #[serde(default = "default_blocked")]
    pub blocked: bool,
}

impl BlacklistEntry {
    pub fn new(original: impl Into<String>, malicious: impl Into<String>) -> Self {
        Self {
            original: original.into(),
            malicious: malicious.into(),
            blocked: true,
        }
    }
}

#[async_trait]
pub trait BlacklistStore: Send + Sync {
    /// Malicious variants already committed for `original`.
    async fn list_malicious_variants(&self, original: &str) -> Result<HashSet<String>, StorageError>;

    /// Stages one entry for the next flush.
    async fn append_entry(&self, entry: BlacklistEntry) -> Result<(), StorageError>;

    /// Commits staged entries, returning how many were committed.
    async fn flush(&self) -> Result<usize, StorageError>;

    /// Committed entries, optionally restricted to one original.
    async fn list_entries(&self, original: Option<&str>) -> Result<Vec<BlacklistEntry>, StorageError>;
}

/// Entry count per original domain.
pub fn summarize(entries: &[BlacklistEntry]) -> BTreeMap<String, usize> {
    let mut stats = BTreeMap::new();
    for entry in entries {
        *stats.entry(entry.original.clone()).or_insert(0) += 1;
    }
    stats
}

/// Committed entries grouped by original.
#[derive(Debug, Default)]
struct Index {
    by_original: DashMap<String, Vec<BlacklistEntry>>,
}

impl Index {
    fn insert(&self, entry: BlacklistEntry) {
        self.by_original
            .entry(entry.original.clone())
            .or_default()
            .push(entry);
    }

    fn variants(&self, original: &str) -> HashSet<String> {
        self.by_original
            .get(original)
            .map(|entries| entries.iter().map(|e| e.malicious.clone()).collect())
            .unwrap_or_default()
    }

    fn entries(&self, original: Option<&str>) -> Vec<BlacklistEntry> {
        let mut keys: Vec<String> = match original {
            Some(o) => vec![o.to_string()],
            None => self.by_original.iter().map(|e| e.key().clone()).collect(),
        };
        keys.sort();

        keys.iter()
            .filter_map(|k| self.by_original.get(k).map(|v| v.value().clone()))
            .flatten()
            .collect()
    }
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    committed: Index,
    pending: Mutex<Vec<BlacklistEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with committed entries.
    pub fn with_entries(entries: impl IntoIterator<Item = BlacklistEntry>) -> Self {
        let store = Self::new();
        for entry in entries {
            store.committed.insert(entry);
        }
        store
    }

    pub async fn pending_len(&self) -> usize {
        self.pending.lock().await.len()
    }
}

#[async_trait]
impl BlacklistStore for MemoryStore {
    async fn list_malicious_variants(&self, original: &str) -> Result<HashSet<String>, StorageError> {
        Ok(self.committed.variants(original))
    }

    async fn append_entry(&self, entry: BlacklistEntry) -> Result<(), StorageError> {
        self.pending.lock().await.push(entry);
        Ok(())
    }

    async fn flush(&self) -> Result<usize, StorageError> {
        let mut pending = self.pending.lock().await;
        let count = pending.len();
        for entry in pending.drain(..) {
            self.committed.insert(entry);
        }
        Ok(count)
    }

    async fn list_entries(&self, original: Option<&str>) -> Result<Vec<BlacklistEntry>, StorageError> {
        Ok(self.committed.entries(original))
    }
}

/// Append-only JSON-lines file, one entry per line.
#[derive(Debug)]
pub struct JsonlStore {
    path: PathBuf,
    committed: Index,
    pending: Mutex<Vec<BlacklistEntry>>,
}

impl JsonlStore {
    /// Opens `path`, indexing any entries it already holds. A missing file is
    /// created on first flush.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let committed = Index::default();

        if tokio::fs::try_exists(&path).await? {
            let contents = tokio::fs::read_to_string(&path).await?;
            let mut loaded = 0usize;
            let mut offset = 0usize;
            let mut torn_at = None;

            for line in contents.split_inclusive('\n') {
                let start = offset;
                offset += line.len();
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match serde_json::from_str(trimmed) {
                    Ok(entry) => {
                        committed.insert(entry);
                        loaded += 1;
                    }
                    // Only an unterminated last line can be an interrupted write
                    Err(e) if !line.ends_with('\n') => {
                        warn!("Dropping torn last line of {}: {}", path.display(), e);
                        torn_at = Some(start);
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            if let Some(len) = torn_at {
                let file = OpenOptions::new().write(true).open(&path).await?;
                file.set_len(len as u64).await?;
                file.sync_data().await?;
            } else if !contents.is_empty() && !contents.ends_with('\n') {
                let mut file = OpenOptions::new().append(true).open(&path).await?;
                file.write_all(b"\n").await?;
                file.sync_data().await?;
            }
            info!("Loaded {} blacklist entries from {}", loaded, path.display());
        }

        Ok(Self {
            path,
            committed,
            pending: Mutex::new(Vec::new()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl BlacklistStore for JsonlStore {
    async fn list_malicious_variants(&self, original: &str) -> Result<HashSet<String>, StorageError> {
        Ok(self.committed.variants(original))
    }

    async fn append_entry(&self, entry: BlacklistEntry) -> Result<(), StorageError> {
        self.pending.lock().await.push(entry);
        Ok(())
    }

    async fn flush(&self) -> Result<usize, StorageError> {
        let mut pending = self.pending.lock().await;
        if pending.is_empty() {
            return Ok(0);
        }

        let mut buf = String::new();
        for entry in pending.iter() {
            buf.push_str(&serde_json::to_string(entry)?);
            buf.push('\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        let committed_len = file.metadata().await?.len();
        if let Err(e) = append_batch(&mut file, buf.as_bytes()).await {
            // Nothing from this batch may stay on disk while it is still pending
            if let Err(truncate) = file.set_len(committed_len).await {
                warn!(
                    "Failed to roll back partial batch in {}: {}",
                    self.path.display(),
                    truncate
                );
            }
            return Err(e.into());
        }

        let count = pending.len();
        for entry in pending.drain(..) {
            self.committed.insert(entry);
        }
        debug!("Flushed {} entries to {}", count, self.path.display());
        Ok(count)
    }

    async fn list_entries(&self, original: Option<&str>) -> Result<Vec<BlacklistEntry>, StorageError> {
        Ok(self.committed.entries(original))
    }
}

async fn append_batch(file: &mut File, batch: &[u8]) -> std::io::Result<()> {
    file.write_all(batch).await?;
    file.flush().await?;
    file.sync_data().await
}
