//! Call deadlines.
//!
//! # Responsibilities
//! - Bound the total time a correlated call may wait
//! - Clamp every suspension (long poll, backoff sleep) to the time left
//!
//! # Design Decisions
//! - Uses Tokio's clock so paused-time tests drive it deterministically
//! - Cooperative: callers check `is_expired` once per loop iteration
//! - Expiry is never reported before the deadline instant

use std::time::Duration;

use tokio::time::Instant;

/// Absolute deadline for one call.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    expires: Instant,
}

impl Deadline {
    /// Deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        let started = Instant::now();
        Self {
            started,
            expires: started + timeout,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires
    }

    /// Time left, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.expires.saturating_duration_since(Instant::now())
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// `wait` shortened to fit before the deadline.
    pub fn clamp(&self, wait: Duration) -> Duration {
        wait.min(self.remaining())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_expires_exactly_at_deadline() {
        let deadline = Deadline::after(Duration::from_secs(5));
        assert!(!deadline.is_expired());

        tokio::time::advance(Duration::from_millis(4_999)).await;
        assert!(!deadline.is_expired());
        assert_eq!(deadline.remaining(), Duration::from_millis(1));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(deadline.is_expired());
        assert_eq!(deadline.remaining(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clamp_to_remaining() {
        let deadline = Deadline::after(Duration::from_secs(2));
        assert_eq!(deadline.clamp(Duration::from_secs(1)), Duration::from_secs(1));
        tokio::time::advance(Duration::from_millis(1_500)).await;
        assert_eq!(deadline.clamp(Duration::from_secs(1)), Duration::from_millis(500));
        assert_eq!(deadline.elapsed(), Duration::from_millis(1_500));
    }
}
