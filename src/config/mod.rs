//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, overlay environment)
//!     → validation.rs (semantic checks for the server being started)
//!     → BridgeConfig (validated, immutable)
//!     → sections handed to each subsystem at startup
//!
//! On file change (vault server only):
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → new vault allowlist swapped in atomically
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; only the vault allowlist is live-reloaded
//! - All fields have defaults to allow minimal configs
//! - Environment variables win over the file so secrets can stay out of it

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    BridgeConfig, ChannelConfig, LoggingConfig, ObservabilityConfig, PollingConfig, TimeoutConfig,
    VaultConfig,
};
pub use validation::ServerKind;
