//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Build server dependencies → Serve stdio
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → MCP read loop stops → config watcher stops → exit
//! ```
//!
//! # Design Decisions
//! - In-flight tool calls are not awaited; dropping them releases any
//!   messages they still hold
//! - End of stdin is a normal shutdown, not an error

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::{shutdown_signal, spawn_signal_handler};
