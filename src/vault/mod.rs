//! Credential vault (1Password) tools.
//!
//! # Data Flow
//! ```text
//! tools/call(name, args)
//!     → tools.rs: VaultTool::parse
//!     → client.rs: allowlist check, redaction, reference resolution
//!     → backend.rs: VaultBackend (connect.rs: 1Password Connect REST)
//! ```
//!
//! # Design Decisions
//! - Read-only: nothing here creates, edits or archives items
//! - Secret resolution is rate limited by the service, not the client

pub mod backend;
pub mod client;
pub mod connect;
pub mod reference;
pub mod security;
pub mod tools;

pub use backend::{VaultBackend, VaultError};
pub use client::VaultClient;
pub use connect::ConnectBackend;
pub use reference::SecretReference;
pub use security::{FieldRedactor, VaultFilter};
pub use tools::{VaultService, VaultTool};
