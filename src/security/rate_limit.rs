//! Minimum-spacing rate limiter for sensitive calls.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::observability::metrics;

/// Serializes callers so consecutive acquisitions are at least `min_delay` apart.
///
/// The async mutex queues waiters in arrival order, so no caller starves.
#[derive(Debug)]
pub struct RateLimiter {
    min_delay: Duration,
    last_acquired: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last_acquired: Mutex::new(None),
        }
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    /// Wait until `min_delay` has passed since the previous acquisition.
    pub async fn acquire(&self) {
        let mut last = self.last_acquired.lock().await;

        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_delay {
                let wait = self.min_delay - elapsed;
                tracing::debug!(wait_ms = wait.as_millis() as u64, "Rate limiting: waiting");
                metrics::record_rate_limit_wait(wait);
                tokio::time::sleep(wait).await;
            }
        }

        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_first_acquire_does_not_wait() {
        let limiter = RateLimiter::new(Duration::from_secs(1));
        let start = Instant::now();
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_back_to_back_acquire_waits_min_delay() {
        let limiter = RateLimiter::new(Duration::from_secs(1));
        limiter.acquire().await;

        tokio::time::advance(Duration::from_millis(300)).await;
        let start = Instant::now();
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::from_millis(700));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spaced_acquire_does_not_wait() {
        let limiter = RateLimiter::new(Duration::from_secs(1));
        limiter.acquire().await;

        tokio::time::advance(Duration::from_millis(1_500)).await;
        let start = Instant::now();
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_are_spaced() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_secs(1)));
        let start = Instant::now();

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    limiter.acquire().await;
                    Instant::now()
                })
            })
            .collect();

        let mut finished = Vec::new();
        for handle in handles {
            finished.push(handle.await.unwrap());
        }
        finished.sort();

        assert_eq!(finished[0] - start, Duration::ZERO);
        assert!(finished[1] - finished[0] >= Duration::from_secs(1));
        assert!(finished[2] - finished[1] >= Duration::from_secs(1));
    }
}
