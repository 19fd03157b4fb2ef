//! In-process channel with queue-like lock semantics.
//!
//! Requests published here land in an outbound log that a worker (or a test)
//! drains with [`MemoryChannel::recv_published`]. Responses are injected with
//! [`MemoryChannel::deliver`] and behave like a visibility-timeout queue:
//! a fetched message is hidden until it is released, deleted, or its lock
//! expires.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::channel::{Channel, ChannelError, LockHandle, ReceivedMessage};

const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
struct StoredMessage {
    id: u64,
    body: String,
    metadata: HashMap<String, String>,
    lock: Option<(LockHandle, Instant)>,
    receive_count: u32,
}

impl StoredMessage {
    fn is_visible(&self, now: Instant) -> bool {
        match &self.lock {
            None => true,
            Some((_, until)) => *until <= now,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    outbound: VecDeque<String>,
    inbound: Vec<StoredMessage>,
    next_id: u64,
    stats: MemoryStats,
}

/// Operation counters, for assertions and debugging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub published: u64,
    pub delivered: u64,
    pub released: u64,
    pub deleted: u64,
}

/// Lock-based in-memory queue pair.
#[derive(Debug)]
pub struct MemoryChannel {
    state: Mutex<State>,
    inbound_ready: Notify,
    outbound_ready: Notify,
    visibility_timeout: Duration,
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::with_visibility_timeout(DEFAULT_VISIBILITY_TIMEOUT)
    }

    pub fn with_visibility_timeout(visibility_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(State::default()),
            inbound_ready: Notify::new(),
            outbound_ready: Notify::new(),
            visibility_timeout,
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, State> {
        // A panic while holding the lock cannot leave the queues half-updated,
        // so a poisoned guard is still usable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Put a response on the inbound queue.
    pub fn deliver(&self, body: impl Into<String>, metadata: HashMap<String, String>) {
        {
            let mut state = self.lock_state();
            let id = state.next_id;
            state.next_id += 1;
            state.stats.delivered += 1;
            state.inbound.push(StoredMessage {
                id,
                body: body.into(),
                metadata,
                lock: None,
                receive_count: 0,
            });
        }
        self.inbound_ready.notify_waiters();
    }

    /// Convenience for a response tagged with one attribute.
    pub fn deliver_tagged(&self, body: impl Into<String>, attribute: &str, value: &str) {
        self.deliver(body, HashMap::from([(attribute.to_string(), value.to_string())]));
    }

    /// Wait for and take the oldest published request.
    pub async fn recv_published(&self) -> String {
        loop {
            let notified = self.outbound_ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let next = self.lock_state().outbound.pop_front();
            if let Some(body) = next {
                return body;
            }
            notified.await;
        }
    }

    /// Published requests not yet taken, oldest first.
    pub fn published(&self) -> Vec<String> {
        self.lock_state().outbound.iter().cloned().collect()
    }

    /// Messages still on the inbound queue, locked or not.
    pub fn pending(&self) -> usize {
        self.lock_state().inbound.len()
    }

    pub fn stats(&self) -> MemoryStats {
        self.lock_state().stats
    }

    fn take_visible(&self, max_count: usize) -> (Vec<ReceivedMessage>, Option<Instant>) {
        let now = Instant::now();
        let mut state = self.lock_state();
        let mut batch = Vec::new();
        let mut next_unlock: Option<Instant> = None;

        for message in state.inbound.iter_mut() {
            if batch.len() >= max_count {
                break;
            }
            if !message.is_visible(now) {
                if let Some((_, until)) = &message.lock {
                    next_unlock = Some(next_unlock.map_or(*until, |n| n.min(*until)));
                }
                continue;
            }
            message.receive_count += 1;
            let handle = LockHandle::new(format!("mem-{}-{}", message.id, message.receive_count));
            message.lock = Some((handle.clone(), now + self.visibility_timeout));
            batch.push(ReceivedMessage {
                body: message.body.clone(),
                metadata: message.metadata.clone(),
                lock: handle,
            });
        }

        (batch, next_unlock)
    }
}

#[async_trait]
impl Channel for MemoryChannel {
    async fn publish(&self, body: String) -> Result<(), ChannelError> {
        {
            let mut state = self.lock_state();
            state.stats.published += 1;
            state.outbound.push_back(body);
        }
        self.outbound_ready.notify_one();
        Ok(())
    }

    async fn fetch(&self, max_count: usize, wait: Duration) -> Result<Vec<ReceivedMessage>, ChannelError> {
        let give_up = Instant::now() + wait;

        loop {
            let notified = self.inbound_ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let (batch, next_unlock) = self.take_visible(max_count);
            if !batch.is_empty() || Instant::now() >= give_up {
                return Ok(batch);
            }

            let wake_at = next_unlock.map_or(give_up, |unlock| unlock.min(give_up));
            let _ = tokio::time::timeout_at(wake_at, notified).await;
        }
    }

    async fn release(&self, lock: &LockHandle) -> Result<(), ChannelError> {
        {
            let mut state = self.lock_state();
            let message = state
                .inbound
                .iter_mut()
                .find(|m| matches!(&m.lock, Some((h, _)) if h == lock))
                .ok_or_else(|| ChannelError::UnknownLock(lock.clone()))?;
            message.lock = None;
            state.stats.released += 1;
        }
        self.inbound_ready.notify_waiters();
        Ok(())
    }

    async fn delete(&self, lock: &LockHandle) -> Result<(), ChannelError> {
        let mut state = self.lock_state();
        let position = state
            .inbound
            .iter()
            .position(|m| matches!(&m.lock, Some((h, _)) if h == lock))
            .ok_or_else(|| ChannelError::UnknownLock(lock.clone()))?;
        state.inbound.remove(position);
        state.stats.deleted += 1;
        Ok(())
    }
}
