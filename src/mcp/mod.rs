//! MCP (Model Context Protocol) server subsystem.
//!
//! # Data Flow
//! ```text
//! stdin line ─▶ server.rs (JSON-RPC parse, method dispatch)
//!                  └── tools/call ─▶ ToolHandler (brokerage | vault)
//!                                       └── ToolOutput ─▶ stdout line
//! ```

pub mod client_config;
pub mod protocol;
pub mod server;
pub mod tool;

pub use client_config::mcp_client_config;
pub use server::McpServer;
pub use tool::{Arguments, ToolDefinition, ToolError, ToolHandler, ToolOutput};
