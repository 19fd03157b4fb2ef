//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events on stderr)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → MCP client log capture (stderr)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Correlation ID is a field on every log event of a call
//! - Metrics are cheap (atomic increments) and off unless enabled

pub mod logging;
pub mod metrics;
