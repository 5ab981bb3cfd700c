//! Exponential backoff for storage operations.
//!
//! DNS verification never retries: one failed lookup rejects the candidate.
//! Flushing a batch to storage is different, since a lost flush loses
//! confirmed entries, so the writer retries it through [`with_exponential_backoff`].

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

/// Backoff policy for one flush.
///
/// ```
/// use typoguard::retry::RetryConfig;
///
/// // Four flush attempts: immediately, then after ~100, ~200 and ~400 ms
/// let policy = RetryConfig::with_attempts(4);
/// assert_eq!(policy.max_retries, 4);
/// assert!(policy.add_jitter);
/// ```
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub backoff_factor: f64,
    pub max_backoff_ms: u64,
    /// Scale each delay by a random factor in 0.9..1.1
    pub add_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 100,
            backoff_factor: 2.0,
            max_backoff_ms: 5_000,
            add_jitter: true,
        }
    }
}

impl RetryConfig {
    /// Default backoff with `attempts` total attempts.
    pub fn with_attempts(attempts: u32) -> Self {
        Self {
            max_retries: attempts.max(1),
            ..Self::default()
        }
    }

    fn delay_for(&self, backoff_ms: u64) -> Duration {
        let ms = if self.add_jitter {
            let factor = rand::random::<f64>() * 0.2 + 0.9;
            (backoff_ms as f64 * factor) as u64
        } else {
            backoff_ms
        };
        Duration::from_millis(ms.min(self.max_backoff_ms))
    }
}

/// Runs `operation` until it succeeds, `is_retriable` rejects the error, or
/// `config.max_retries` attempts have been made. Returns the last result
/// together with the number of attempts used.
pub async fn with_exponential_backoff<F, Fut, T, E, R>(
    operation: F,
    is_retriable: R,
    config: &RetryConfig,
) -> (Result<T, E>, u32)
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    let mut backoff_ms = config.initial_backoff_ms;

    loop {
        attempt += 1;
        let err = match operation().await {
            Ok(value) => return (Ok(value), attempt),
            Err(err) => err,
        };

        if attempt >= config.max_retries || !is_retriable(&err) {
            warn!("Giving up after {} attempt(s): {}", attempt, err);
            return (Err(err), attempt);
        }

        let delay = config.delay_for(backoff_ms);
        debug!(
            "Retry attempt {}/{} after {:?}: {}",
            attempt, config.max_retries, delay, err
        );
        sleep(delay).await;

        backoff_ms = ((backoff_ms as f64 * config.backoff_factor) as u64).min(config.max_backoff_ms);
    }
}
