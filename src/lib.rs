//! MCP bridge library.
//!
//! Two MCP servers over stdio: a brokerage server that relays tool calls to a
//! remote worker through a request/response queue pair, and a read-only
//! credential vault server.

pub mod brokerage;
pub mod channel;
pub mod config;
pub mod correlation;
pub mod lifecycle;
pub mod mcp;
pub mod observability;
pub mod resilience;
pub mod security;
pub mod vault;

pub use config::schema::BridgeConfig;
pub use correlation::CorrelationClient;
pub use lifecycle::Shutdown;
pub use mcp::McpServer;
