#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use trust_dns_resolver::proto::rr::RecordType;
use typoguard::config::AnalysisConfig;
use typoguard::dns::RecordLookup;
use typoguard::error::{ResolutionFailure, StorageError};
use typoguard::rate_limit::{RateLimitGuard, RateLimiter};
use typoguard::store::{BlacklistEntry, BlacklistStore};

/// A resolver whose answers are scripted per FQDN. Unscripted names get
/// the fallback answer (NXDOMAIN unless changed).
pub struct ScriptedLookup {
    name: String,
    answers: HashMap<String, Result<usize, ResolutionFailure>>,
    stalled: HashSet<String>,
    fallback: Result<usize, ResolutionFailure>,
    limiter: Option<Arc<RateLimiter>>,
    a_calls: AtomicUsize,
    record_calls: AtomicUsize,
    queried: Mutex<Vec<String>>,
}

impl ScriptedLookup {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            answers: HashMap::new(),
            stalled: HashSet::new(),
            fallback: Err(ResolutionFailure::NxDomain),
            limiter: None,
            a_calls: AtomicUsize::new(0),
            record_calls: AtomicUsize::new(0),
            queried: Mutex::new(Vec::new()),
        }
    }

    /// `fqdn` resolves to one record.
    pub fn registered(mut self, fqdn: &str) -> Self {
        self.answers.insert(fqdn.to_string(), Ok(1));
        self
    }

    pub fn answer(mut self, fqdn: &str, answer: Result<usize, ResolutionFailure>) -> Self {
        self.answers.insert(fqdn.to_string(), answer);
        self
    }

    /// Lookups for `fqdn` never complete on their own.
    pub fn stall(mut self, fqdn: &str) -> Self {
        self.stalled.insert(fqdn.to_string());
        self
    }

    pub fn fallback(mut self, answer: Result<usize, ResolutionFailure>) -> Self {
        self.fallback = answer;
        self
    }

    /// Queries are admitted through `limiter`.
    pub fn limited(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn a_calls(&self) -> usize {
        self.a_calls.load(Ordering::SeqCst)
    }

    pub fn record_calls(&self) -> usize {
        self.record_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.a_calls() + self.record_calls()
    }

    pub fn queried(&self) -> Vec<String> {
        self.queried.lock().unwrap().clone()
    }

    async fn respond(&self, fqdn: &str) -> Result<usize, ResolutionFailure> {
        self.queried.lock().unwrap().push(fqdn.to_string());
        if self.stalled.contains(fqdn) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        self.answers
            .get(fqdn)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl RecordLookup for ScriptedLookup {
    fn endpoint(&self) -> String {
        self.name.clone()
    }

    async fn reserve(&self) -> Result<Option<RateLimitGuard>, ResolutionFailure> {
        match &self.limiter {
            Some(limiter) => limiter
                .acquire()
                .await
                .map(Some)
                .map_err(|e| ResolutionFailure::Other(e.to_string())),
            None => Ok(None),
        }
    }

    async fn lookup_a(&self, fqdn: &str) -> Result<usize, ResolutionFailure> {
        self.a_calls.fetch_add(1, Ordering::SeqCst);
        self.respond(fqdn).await
    }

    async fn lookup_records(
        &self,
        fqdn: &str,
        _record_type: RecordType,
    ) -> Result<usize, ResolutionFailure> {
        self.record_calls.fetch_add(1, Ordering::SeqCst);
        self.respond(fqdn).await
    }
}

/// A store whose appends and flushes fail on demand.
#[derive(Default)]
pub struct FlakyStore {
    /// Number of upcoming flush calls that fail
    pub failing_flushes: AtomicUsize,
    pub fail_appends: bool,
    pub flush_calls: AtomicUsize,
    pending: Mutex<Vec<BlacklistEntry>>,
    committed: Mutex<Vec<BlacklistEntry>>,
}

impl FlakyStore {
    pub fn failing_flushes(n: usize) -> Self {
        Self {
            failing_flushes: AtomicUsize::new(n),
            ..Self::default()
        }
    }

    pub fn failing_appends() -> Self {
        Self {
            fail_appends: true,
            ..Self::default()
        }
    }

    pub fn committed(&self) -> Vec<BlacklistEntry> {
        self.committed.lock().unwrap().clone()
    }

    pub fn flush_calls(&self) -> usize {
        self.flush_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlacklistStore for FlakyStore {
    async fn list_malicious_variants(&self, original: &str) -> Result<HashSet<String>, StorageError> {
        Ok(self
            .committed
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.original == original)
            .map(|e| e.malicious.clone())
            .collect())
    }

    async fn append_entry(&self, entry: BlacklistEntry) -> Result<(), StorageError> {
        if self.fail_appends {
            return Err(StorageError::Unavailable("append rejected".into()));
        }
        self.pending.lock().unwrap().push(entry);
        Ok(())
    }

    async fn flush(&self) -> Result<usize, StorageError> {
        self.flush_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failing_flushes.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_flushes.store(remaining - 1, Ordering::SeqCst);
            return Err(StorageError::Unavailable("connection reset".into()));
        }
        let mut pending = self.pending.lock().unwrap();
        let count = pending.len();
        self.committed.lock().unwrap().extend(pending.drain(..));
        Ok(count)
    }

    async fn list_entries(&self, original: Option<&str>) -> Result<Vec<BlacklistEntry>, StorageError> {
        Ok(self
            .committed
            .lock()
            .unwrap()
            .iter()
            .filter(|e| original.map_or(true, |o| e.original == o))
            .cloned()
            .collect())
    }
}

/// Small, fast configuration for pipeline tests.
pub fn test_config() -> AnalysisConfig {
    AnalysisConfig {
        tlds: vec!["com".to_string()],
        lookup_timeout_ms: 200,
        max_concurrent_lookups: 8,
        flush_retries: 2,
        ..AnalysisConfig::default()
    }
}

/// Unique scratch path under the system temp dir.
pub fn temp_path(prefix: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("{}_{}.jsonl", prefix, uuid::Uuid::new_v4()))
}

pub fn shared<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
