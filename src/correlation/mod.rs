//! Request/response correlation over an asynchronous channel.
//!
//! # Data Flow
//! ```text
//! call(op, params, timeout)
//!   ├── Dispatcher::send      envelope {operation, correlation_id, timestamp, ..params}
//!   │                         published once, id returned
//!   └── ResponsePoller::wait_for
//!         loop until deadline:
//!           fetch batch ─▶ release foreign ─▶ parse match ─▶ delete ─▶ payload
//!                 └── empty / error / malformed ─▶ backoff sleep
//! ```
//!
//! # Design Decisions
//! - No registry of outstanding calls; each waiter owns its own state
//! - Matching is exact string equality on a metadata attribute, never the body
//! - A fresh id per call; ids are never reused

pub mod client;
pub mod dispatcher;
pub mod envelope;
pub mod id;
pub mod poller;
pub mod types;

pub use client::CorrelationClient;
pub use dispatcher::Dispatcher;
pub use envelope::{RequestEnvelope, RESERVED_KEYS};
pub use id::CorrelationId;
pub use poller::ResponsePoller;
pub use types::{CallError, CallResult};
