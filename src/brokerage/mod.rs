//! Brokerage (IBKR) tools.
//!
//! # Data Flow
//! ```text
//! tools/call(name, args)
//!     → tools.rs: BrokerageTool::parse (closed set, validated arguments)
//!     → service.rs: CorrelationClient::call(operation, params, timeout class)
//!     → heading + pretty JSON, or a rendered CallError
//! ```

pub mod service;
pub mod tools;

pub use service::{render_call_error, BrokerageService};
pub use tools::{BrokerageTool, SymbolSpec, TimeoutClass};
