//! Batches confirmed lookalikes into the blacklist store.
//!
//! The writer is the single consumer of verification results for a run, so
//! its counter is deterministic regardless of how verification is scheduled.
//! It flushes after every `batch_size` confirmations and once more in
//! [`BlacklistWriter::finish`].

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error};

use crate::error::StorageError;
use crate::retry::{with_exponential_backoff, RetryConfig};
use crate::store::{BlacklistEntry, BlacklistStore};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteReport {
    /// Entries handed to the writer
    pub confirmed: usize,
    /// Entries the store accepted for staging
    pub appended: usize,
    pub append_failures: usize,
    /// Successful flushes
    pub flushes: usize,
    /// Entries committed across all flushes
    pub committed: usize,
    /// Flushes that failed after every retry
    pub flush_failures: usize,
}

impl WriteReport {
    pub fn is_clean(&self) -> bool {
        self.append_failures == 0 && self.flush_failures == 0
    }
}

pub struct BlacklistWriter {
    store: Arc<dyn BlacklistStore>,
    original: String,
    batch_size: usize,
    retry: RetryConfig,
    report: WriteReport,
}

impl BlacklistWriter {
    /// `original` is the authentic FQDN every entry is recorded under.
    pub fn new(
        store: Arc<dyn BlacklistStore>,
        original: impl Into<String>,
        batch_size: usize,
        retry: RetryConfig,
    ) -> Self {
        Self {
            store,
            original: original.into(),
            batch_size: batch_size.max(1),
            retry,
            report: WriteReport::default(),
        }
    }

    pub fn report(&self) -> &WriteReport {
        &self.report
    }

    /// Stages one confirmed lookalike, flushing when the batch is full.
    /// A failed append is counted and does not stop the run.
    pub async fn record(&mut self, malicious_fqdn: &str) {
        self.report.confirmed += 1;

        let entry = BlacklistEntry::new(self.original.clone(), malicious_fqdn);
        match self.store.append_entry(entry).await {
            Ok(()) => self.report.appended += 1,
            Err(e) => {
                error!("Failed to append {} for {}: {}", malicious_fqdn, self.original, e);
                self.report.append_failures += 1;
            }
        }

        if self.report.confirmed % self.batch_size == 0 {
            // Entries stay staged in the store on failure; the next flush retries them
            if let Err(e) = self.flush().await {
                debug!("Batch flush for {} deferred: {}", self.original, e);
            }
        }
    }

    /// Final, unconditional flush.
    pub async fn finish(mut self) -> Result<WriteReport, StorageError> {
        self.flush().await?;
        Ok(self.report)
    }

    async fn flush(&mut self) -> Result<(), StorageError> {
        let store = Arc::clone(&self.store);
        let (result, attempts) = with_exponential_backoff(
            || {
                let store = Arc::clone(&store);
                async move { store.flush().await }
            },
            |err| !matches!(err, StorageError::Serialization(_)),
            &self.retry,
        )
        .await;

        match result {
            Ok(committed) => {
                debug!("Flushed {} entries for {}", committed, self.original);
                self.report.flushes += 1;
                self.report.committed += committed;
                Ok(())
            }
            Err(e) => {
                let pending = self.report.appended.saturating_sub(self.report.committed);
                error!(
                    "Flush for {} failed after {} attempts ({} pending): {}",
                    self.original, attempts, pending, e
                );
                self.report.flush_failures += 1;
                Err(StorageError::FlushFailed { pending, attempts })
            }
        }
    }
}
