//! Message channel subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher ── publish(body) ──▶ request queue ──▶ remote worker
//!                                                       │
//! Poller ◀── fetch(max, wait) ── response queue ◀───────┘
//!    ├── release(lock)   foreign message, visible to others again
//!    └── delete(lock)    matched message, consumed
//! ```
//!
//! # Design Decisions
//! - One trait covers the four operations the correlation engine needs
//! - Any at-least-once, lock-based, long-poll capable queue fits
//! - Transports are injected as `Arc<dyn Channel>`; nothing is global

pub mod memory;
pub mod sigv4;
pub mod sqs;

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryChannel;
pub use sigv4::Credentials;
pub use sqs::SqsChannel;

/// Opaque token proving the holder currently has a message locked.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockHandle(String);

impl LockHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Receipt handles are long; the tail is enough to tell them apart in logs.
        let tail = self.0.len().saturating_sub(12);
        match self.0.get(tail..) {
            Some(suffix) if tail > 0 => write!(f, "…{}", suffix),
            _ => f.write_str(&self.0),
        }
    }
}

/// A message fetched from the inbound queue and locked for this consumer.
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub body: String,
    pub metadata: HashMap<String, String>,
    pub lock: LockHandle,
}

impl ReceivedMessage {
    /// Metadata attribute by exact name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.metadata.get(name).map(String::as_str)
    }
}

/// Errors raised by a transport.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Network failure or timeout talking to the queue service.
    #[error("transport error: {0}")]
    Transport(String),

    /// The queue service answered with an error.
    #[error("queue service rejected {action} ({status}): {code}: {message}")]
    Rejected {
        action: String,
        status: u16,
        code: String,
        message: String,
    },

    /// The queue service answered with something we could not read.
    #[error("malformed queue response: {0}")]
    Decode(String),

    /// No usable credentials for signing requests.
    #[error("credentials unavailable: {0}")]
    Credentials(String),

    /// The lock is stale: the message was deleted or its lock expired.
    #[error("unknown or expired lock handle {0}")]
    UnknownLock(LockHandle),

    #[error("invalid channel configuration: {0}")]
    Config(String),
}

/// Transport operations the correlation engine consumes.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Publish a request body to the outbound queue.
    async fn publish(&self, body: String) -> Result<(), ChannelError>;

    /// Fetch up to `max_count` messages, waiting up to `wait` for the first one.
    async fn fetch(&self, max_count: usize, wait: Duration) -> Result<Vec<ReceivedMessage>, ChannelError>;

    /// Make a locked message visible to other consumers immediately.
    async fn release(&self, lock: &LockHandle) -> Result<(), ChannelError>;

    /// Remove a locked message permanently.
    async fn delete(&self, lock: &LockHandle) -> Result<(), ChannelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_handle_display_truncates() {
        let short = LockHandle::new("abc");
        assert_eq!(short.to_string(), "abc");

        let long = LockHandle::new("AQEBzbVv2Y5cHbmE4oQmJkZ6Ohnb0123456789ab");
        assert_eq!(long.to_string(), "…0123456789ab");
    }

    #[test]
    fn test_attribute_lookup_is_exact() {
        let message = ReceivedMessage {
            body: "{}".into(),
            metadata: HashMap::from([("ExecutionId".to_string(), "abc".to_string())]),
            lock: LockHandle::new("l1"),
        };
        assert_eq!(message.attribute("ExecutionId"), Some("abc"));
        assert_eq!(message.attribute("executionid"), None);
    }

    #[test]
    fn test_error_display() {
        let err = ChannelError::Rejected {
            action: "SendMessage".into(),
            status: 403,
            code: "AccessDenied".into(),
            message: "not authorized".into(),
        };
        assert_eq!(
            err.to_string(),
            "queue service rejected SendMessage (403): AccessDenied: not authorized"
        );
    }
}
