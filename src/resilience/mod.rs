//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Correlated call:
//!     → timeouts.rs (Deadline: total wait bound, clamps every sleep)
//!     → each unsuccessful poll: backoff.rs (grow delay up to ceiling)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every correlated call has a deadline
//! - Backoff state is per call, never shared between calls
//! - Poll failures are retried, never escalated

pub mod backoff;
pub mod timeouts;

pub use backoff::{Backoff, BackoffPolicy};
pub use timeouts::Deadline;
