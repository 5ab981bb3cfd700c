use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::sleep;
use tracing::debug;

/// Token bucket plus in-flight cap guarding one resolver endpoint.
#[derive(Debug)]
pub struct RateLimiter {
    /// Queries allowed per period
    capacity: usize,
    period: Duration,
    bucket: Mutex<Bucket>,
    in_flight: Arc<Semaphore>,
    max_in_flight: usize,
}

#[derive(Debug)]
struct Bucket {
    tokens: usize,
    last_refill: Instant,
}

impl RateLimiter {
    /// * `requests_per_period` - queries allowed per `period_ms`
    /// * `period_ms` - refill period in milliseconds
    /// * `max_concurrent` - queries allowed in flight at once
    pub fn new(requests_per_period: usize, period_ms: u64, max_concurrent: usize) -> Self {
        Self {
            capacity: requests_per_period,
            period: Duration::from_millis(period_ms),
            bucket: Mutex::new(Bucket {
                tokens: requests_per_period,
                last_refill: Instant::now(),
            }),
            in_flight: Arc::new(Semaphore::new(max_concurrent)),
            max_in_flight: max_concurrent,
        }
    }

    /// Limiter for a DNS resolver: `queries_per_minute` with at most
    /// `max_in_flight` outstanding lookups.
    pub fn for_resolver(queries_per_minute: usize, max_in_flight: usize) -> Self {
        Self::new(queries_per_minute, 60_000, max_in_flight)
    }

    /// Waits for a token, then for an in-flight slot. The slot is released
    /// when the returned guard drops.
    pub async fn acquire(&self) -> Result<RateLimitGuard> {
        loop {
            let wait = self.take_token().await;
            if wait.is_zero() {
                break;
            }
            debug!("Query budget exhausted, waiting {:?}", wait);
            sleep(wait).await;
        }

        let permit = self
            .in_flight
            .clone()
            .acquire_owned()
            .await
            .context("Failed to acquire in-flight slot")?;

        Ok(RateLimitGuard { _permit: permit })
    }

    /// Lookups currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.max_in_flight - self.in_flight.available_permits()
    }

    async fn take_token(&self) -> Duration {
        let mut bucket = self.bucket.lock().await;
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill);

        if elapsed >= self.period {
            let periods = (elapsed.as_millis() / self.period.as_millis().max(1)) as usize;
            bucket.tokens = bucket
                .tokens
                .saturating_add(periods.saturating_mul(self.capacity))
                .min(self.capacity);
            let remainder = elapsed.as_millis() % self.period.as_millis().max(1);
            bucket.last_refill = now - Duration::from_millis(remainder as u64);
        }

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            Duration::ZERO
        } else {
            self.period
                .saturating_sub(now.duration_since(bucket.last_refill))
                .max(Duration::from_millis(1))
        }
    }
}

/// Releases the in-flight slot when dropped
#[derive(Debug)]
pub struct RateLimitGuard {
    _permit: OwnedSemaphorePermit,
}
