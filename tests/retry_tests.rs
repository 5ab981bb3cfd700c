use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use typoguard::error::StorageError;
use typoguard::retry::{with_exponential_backoff, RetryConfig};

fn fast_config(max_retries: u32) -> RetryConfig {
    RetryConfig {
        max_retries,
        initial_backoff_ms: 10,
        backoff_factor: 2.0,
        max_backoff_ms: 100,
        add_jitter: false,
    }
}

fn unavailable() -> StorageError {
    StorageError::Unavailable("database is locked".into())
}

#[tokio::test]
async fn test_successful_flush_uses_one_attempt() -> Result<()> {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();

    let (result, attempts) = with_exponential_backoff(
        || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<usize, StorageError>(50)
            }
        },
        |_| true,
        &fast_config(3),
    )
    .await;

    assert_eq!(result?, 50);
    assert_eq!(attempts, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_retries_until_store_recovers() -> Result<()> {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();

    let (result, attempts) = with_exponential_backoff(
        || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(unavailable())
                } else {
                    Ok(7usize)
                }
            }
        },
        |_| true,
        &fast_config(3),
    )
    .await;

    assert_eq!(result?, 7);
    assert_eq!(attempts, 3);
    Ok(())
}

#[tokio::test]
async fn test_max_retries_counts_total_attempts() -> Result<()> {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();

    let (result, attempts): (Result<usize, _>, u32) = with_exponential_backoff(
        || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(unavailable())
            }
        },
        |_| true,
        &fast_config(2),
    )
    .await;

    assert!(matches!(result, Err(StorageError::Unavailable(_))));
    assert_eq!(attempts, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test]
async fn test_serialization_errors_are_not_retried() -> Result<()> {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();

    let (result, attempts): (Result<usize, _>, u32) = with_exponential_backoff(
        || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
                Err(StorageError::from(err))
            }
        },
        |err| !matches!(err, StorageError::Serialization(_)),
        &fast_config(5),
    )
    .await;

    assert!(matches!(result, Err(StorageError::Serialization(_))));
    assert_eq!(attempts, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_backoff_increases_between_attempts() -> Result<()> {
    let config = RetryConfig {
        max_retries: 3,
        initial_backoff_ms: 20,
        backoff_factor: 3.0,
        max_backoff_ms: 1000,
        add_jitter: false,
    };

    let starts = Arc::new(std::sync::Mutex::new(Vec::new()));
    let recorder = starts.clone();

    let (result, attempts): (Result<usize, _>, u32) = with_exponential_backoff(
        || {
            let recorder = recorder.clone();
            async move {
                recorder.lock().unwrap().push(Instant::now());
                Err(unavailable())
            }
        },
        |_| true,
        &config,
    )
    .await;

    assert!(result.is_err());
    assert_eq!(attempts, 3);

    let times = starts.lock().unwrap();
    assert_eq!(times.len(), 3);
    let first = times[1].duration_since(times[0]);
    let second = times[2].duration_since(times[1]);
    assert!(
        second > first,
        "Second delay ({:?}) should exceed first delay ({:?})",
        second,
        first
    );
    Ok(())
}

#[test]
fn test_with_attempts_never_returns_zero() {
    assert_eq!(RetryConfig::with_attempts(0).max_retries, 1);
    assert_eq!(RetryConfig::with_attempts(4).max_retries, 4);
    assert_eq!(RetryConfig::with_attempts(4).initial_backoff_ms, 100);
}
