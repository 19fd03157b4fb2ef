//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Vault tool call:
//!     → allowlist (vault name must be permitted)
//!     → rate_limit.rs (secret resolution spaced by min delay)
//!     → redaction (sensitive field values replaced before leaving the process)
//! ```
//!
//! # Design Decisions
//! - Fail closed: an unknown vault is treated as not allowed
//! - Limiter is an injected instance, one per server process
//! - Secrets and tokens are never logged

pub mod rate_limit;

pub use rate_limit::RateLimiter;
