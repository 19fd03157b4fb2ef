//! Response poller.
//!
//! # Responsibilities
//! - Fetch batches from the response channel until the target id shows up
//! - Hand every foreign message straight back to the queue
//! - Delete the matched message once its body parses, and only then
//! - Stop at the deadline with a `Timeout`
//!
//! # Design Decisions
//! - All per-call state (deadline, backoff) lives in the `wait_for` future
//! - Backoff grows on every unproductive iteration and never resets mid-call
//! - Every suspension is clamped to the time left, so expiry is observed at
//!   the deadline and not before
//! - Messages are tracked in a guard while held; dropping the future mid-scan
//!   releases whatever is still held on a background task

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::channel::{Channel, LockHandle, ReceivedMessage};
use crate::correlation::id::CorrelationId;
use crate::correlation::types::{CallError, CallResult};
use crate::observability::metrics;
use crate::resilience::{Backoff, BackoffPolicy, Deadline};

/// Locks fetched but not yet released or deleted.
struct HeldMessages {
    channel: Arc<dyn Channel>,
    locks: Vec<LockHandle>,
}

impl HeldMessages {
    fn new(channel: Arc<dyn Channel>, batch: &[ReceivedMessage]) -> Self {
        Self {
            channel,
            locks: batch.iter().map(|m| m.lock.clone()).collect(),
        }
    }

    /// Stop tracking a lock that has been settled.
    fn settle(&mut self, lock: &LockHandle) {
        self.locks.retain(|held| held != lock);
    }
}

impl Drop for HeldMessages {
    fn drop(&mut self) {
        if self.locks.is_empty() {
            return;
        }
        let locks = std::mem::take(&mut self.locks);
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(count = locks.len(), "No runtime to release held messages; they reappear after their lock expires");
            return;
        };

        debug!(count = locks.len(), "Releasing messages held by an abandoned wait");
        let channel = Arc::clone(&self.channel);
        runtime.spawn(async move {
            for lock in &locks {
                if let Err(e) = channel.release(lock).await {
                    debug!(lock = %lock, error = %e, "Background release failed");
                }
            }
            metrics::record_released(locks.len());
        });
    }
}

/// Polls the response channel for one correlation id at a time.
pub struct ResponsePoller {
    channel: Arc<dyn Channel>,
    batch_size: usize,
    correlation_attribute: String,
    backoff: BackoffPolicy,
}

impl ResponsePoller {
    pub fn new(
        channel: Arc<dyn Channel>,
        batch_size: usize,
        correlation_attribute: impl Into<String>,
        backoff: BackoffPolicy,
    ) -> Self {
        Self {
            channel,
            batch_size: batch_size.max(1),
            correlation_attribute: correlation_attribute.into(),
            backoff,
        }
    }

    pub fn correlation_attribute(&self) -> &str {
        &self.correlation_attribute
    }

    /// Wait until the response tagged with `correlation_id` arrives.
    ///
    /// `poll_interval` is the long-poll wait passed to each fetch. Fetch
    /// errors are logged and retried; only the deadline ends the wait
    /// without a payload.
    pub async fn wait_for(
        &self,
        correlation_id: &CorrelationId,
        timeout: Duration,
        poll_interval: Duration,
    ) -> CallResult<Value> {
        let deadline = Deadline::after(timeout);
        let mut backoff = self.backoff.start();

        loop {
            if deadline.is_expired() {
                warn!(
                    correlation_id = %correlation_id,
                    elapsed_ms = deadline.elapsed().as_millis() as u64,
                    "Timed out waiting for response"
                );
                return Err(CallError::Timeout {
                    correlation_id: correlation_id.clone(),
                    elapsed: deadline.elapsed(),
                });
            }

            let batch = match self
                .channel
                .fetch(self.batch_size, deadline.clamp(poll_interval))
                .await
            {
                Ok(batch) => batch,
                Err(e) => {
                    metrics::record_poll("error");
                    warn!(
                        correlation_id = %correlation_id,
                        error = %e,
                        delay_ms = backoff.current().as_millis() as u64,
                        "Fetch failed, backing off"
                    );
                    Self::pause(&deadline, &mut backoff).await;
                    continue;
                }
            };

            if batch.is_empty() {
                metrics::record_poll("empty");
                Self::pause(&deadline, &mut backoff).await;
                continue;
            }

            metrics::record_poll("batch");
            debug!(
                correlation_id = %correlation_id,
                size = batch.len(),
                "Scanning batch"
            );

            if let Some(payload) = self.scan(correlation_id, batch).await {
                info!(
                    correlation_id = %correlation_id,
                    elapsed_ms = deadline.elapsed().as_millis() as u64,
                    "Response matched"
                );
                return Ok(payload);
            }
            Self::pause(&deadline, &mut backoff).await;
        }
    }

    async fn pause(deadline: &Deadline, backoff: &mut Backoff) {
        let delay = deadline.clamp(backoff.advance());
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    /// Settle every message in `batch`; return the payload if the target was
    /// among them and parsed.
    async fn scan(&self, correlation_id: &CorrelationId, batch: Vec<ReceivedMessage>) -> Option<Value> {
        let mut held = HeldMessages::new(Arc::clone(&self.channel), &batch);

        let target = batch.iter().position(|m| {
            m.attribute(&self.correlation_attribute)
                .is_some_and(|value| correlation_id.matches(value))
        });

        // 1. Foreign messages (and later duplicates of ours) go straight back.
        let mut released = 0;
        for (index, message) in batch.iter().enumerate() {
            if Some(index) == target {
                continue;
            }
            if let Err(e) = self.channel.release(&message.lock).await {
                debug!(lock = %message.lock, error = %e, "Release failed");
            }
            held.settle(&message.lock);
            released += 1;
        }
        metrics::record_released(released);

        // 2. The candidate is consumed only if its body is usable.
        let candidate = &batch[target?];
        match serde_json::from_str::<Value>(&candidate.body) {
            Ok(payload) => {
                if let Err(e) = self.channel.delete(&candidate.lock).await {
                    warn!(
                        correlation_id = %correlation_id,
                        lock = %candidate.lock,
                        error = %e,
                        "Failed to delete matched message"
                    );
                }
                held.settle(&candidate.lock);
                Some(payload)
            }
            Err(e) => {
                metrics::record_malformed_response();
                warn!(
                    correlation_id = %correlation_id,
                    error = %e,
                    "Matched message is not valid JSON, releasing it"
                );
                if let Err(e) = self.channel.release(&candidate.lock).await {
                    debug!(lock = %candidate.lock, error = %e, "Release failed");
                }
                held.settle(&candidate.lock);
                metrics::record_released(1);
                None
            }
        }
    }
}
