//! Multiplicative poll backoff.

use std::time::Duration;

use crate::config::PollingConfig;

/// Grow `delay` by `factor`, never past `ceiling`.
pub fn next_delay(delay: Duration, factor: f64, ceiling: Duration) -> Duration {
    let grown = delay.as_secs_f64() * factor;
    if !grown.is_finite() || grown >= ceiling.as_secs_f64() {
        return ceiling;
    }
    Duration::from_secs_f64(grown).max(delay).min(ceiling)
}

/// Shape of a backoff sequence. Cheap to copy into every call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub ceiling: Duration,
    pub factor: f64,
}

impl BackoffPolicy {
    pub fn new(initial: Duration, ceiling: Duration, factor: f64) -> Self {
        Self {
            initial: initial.min(ceiling),
            ceiling,
            factor: factor.max(1.0),
        }
    }

    /// Start a fresh sequence at the initial delay.
    pub fn start(&self) -> Backoff {
        Backoff {
            current: self.initial,
            policy: *self,
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(5), 1.5)
    }
}

impl From<&PollingConfig> for BackoffPolicy {
    fn from(config: &PollingConfig) -> Self {
        Self::new(
            Duration::from_millis(config.initial_backoff_ms),
            Duration::from_millis(config.max_backoff_ms),
            config.backoff_factor,
        )
    }
}

/// Per-call backoff state. Only ever grows.
#[derive(Debug, Clone)]
pub struct Backoff {
    current: Duration,
    policy: BackoffPolicy,
}

impl Backoff {
    /// Delay to apply now.
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Return the delay to apply now and grow the next one.
    pub fn advance(&mut self) -> Duration {
        let delay = self.current;
        self.current = next_delay(self.current, self.policy.factor, self.policy.ceiling);
        delay
    }
}
