//! Line-delimited JSON-RPC over stdio.
//!
//! # Responsibilities
//! - Read one request per line, write one response per line
//! - Answer `initialize`, `ping`, `tools/list` and `tools/call`
//! - Swallow notifications; report unknown methods and bad lines
//!
//! # Design Decisions
//! - Generic over reader and writer so tests drive it through in-memory pipes
//! - Requests are handled in order; a slow tool call holds the line
//! - Shutdown interrupts a call in progress; its future is dropped
//! - Only the protocol goes to stdout; logs go to stderr

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::mcp::protocol::{self, JsonRpcRequest, RpcError};
use crate::mcp::tool::ToolHandler;
use crate::observability::metrics;

/// MCP server for one tool handler.
pub struct McpServer {
    handler: Arc<dyn ToolHandler>,
}

impl McpServer {
    pub fn new(handler: Arc<dyn ToolHandler>) -> Self {
        Self { handler }
    }

    /// Serve until the reader closes or `shutdown` fires.
    pub async fn run<R, W>(
        &self,
        reader: R,
        mut writer: W,
        mut shutdown: broadcast::Receiver<()>,
    ) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!(server = self.handler.server_name(), "MCP server ready on stdio");
        let mut lines = reader.lines();

        loop {
            let line = tokio::select! {
                line = lines.next_line() => line?,
                _ = shutdown.recv() => {
                    info!("MCP server received shutdown signal");
                    break;
                }
            };

            let Some(line) = line else {
                info!("Input closed, stopping MCP server");
                break;
            };
            if line.trim().is_empty() {
                continue;
            }

            // Dropping an in-flight call on shutdown releases any queue messages it holds.
            let response = tokio::select! {
                response = self.handle_line(&line) => response,
                _ = shutdown.recv() => {
                    info!("MCP server received shutdown signal during a request, abandoning it");
                    break;
                }
            };

            if let Some(response) = response {
                writer.write_all(response.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }
        Ok(())
    }

    /// Process one input line; `None` for notifications.
    pub async fn handle_line(&self, line: &str) -> Option<String> {
        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Failed to parse JSON-RPC request");
                return Some(protocol::serialize_response(
                    None,
                    Err((protocol::PARSE_ERROR, format!("parse error: {}", e))),
                ));
            }
        };

        if request.is_notification() {
            debug!(method = %request.method, "Notification received");
            return None;
        }

        let result = self.dispatch(&request.method, &request.params).await;
        Some(protocol::serialize_response(request.id, result))
    }

    async fn dispatch(&self, method: &str, params: &Value) -> Result<Value, RpcError> {
        debug!(method = method, "MCP method dispatch");

        match method {
            "initialize" => Ok(json!({
                "protocolVersion": protocol::PROTOCOL_VERSION,
                "capabilities": {
                    "tools": { "listChanged": false },
                },
                "serverInfo": {
                    "name": self.handler.server_name(),
                    "version": env!("CARGO_PKG_VERSION"),
                }
            })),

            "ping" => Ok(json!({})),

            "tools/list" => Ok(json!({ "tools": self.handler.tool_definitions() })),

            "tools/call" => {
                let name = params["name"]
                    .as_str()
                    .ok_or_else(|| (protocol::INVALID_PARAMS, "missing tool name".to_string()))?;
                let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

                metrics::record_tool_call(self.handler.server_name(), name);
                info!(tool = name, "Tool call");
                let output = self.handler.call_tool(name, &arguments).await;
                if output.is_error {
                    warn!(tool = name, "Tool call returned an error");
                }
                Ok(output.to_value())
            }

            _ => {
                warn!(method = method, "Unknown MCP method");
                Err((protocol::METHOD_NOT_FOUND, format!("unknown method: {}", method)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::tool::{ToolDefinition, ToolOutput};
    use async_trait::async_trait;
    use tokio::io::BufReader;

    struct EchoHandler;

    #[async_trait]
    impl ToolHandler for EchoHandler {
        fn server_name(&self) -> &'static str {
            "echo"
        }

        fn tool_definitions(&self) -> Vec<ToolDefinition> {
            vec![ToolDefinition::no_args("echo", "Echo the arguments")]
        }

        async fn call_tool(&self, name: &str, arguments: &Value) -> ToolOutput {
            match name {
                "echo" => ToolOutput::json(arguments),
                other => ToolOutput::error(format!("Error: Unknown tool: {}", other)),
            }
        }
    }

    fn server() -> McpServer {
        McpServer::new(Arc::new(EchoHandler))
    }

    async fn roundtrip(line: &str) -> Value {
        let response = server().handle_line(line).await.unwrap();
        serde_json::from_str(&response).unwrap()
    }

    #[tokio::test]
    async fn test_initialize() {
        let v = roundtrip(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#).await;
        assert_eq!(v["result"]["protocolVersion"], "2024-11-05");
        assert!(v["result"]["capabilities"]["tools"].is_object());
        assert_eq!(v["result"]["serverInfo"]["name"], "echo");
    }

    #[tokio::test]
    async fn test_tools_list() {
        let v = roundtrip(r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#).await;
        let tools = v["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["name"], "echo");
        assert!(tools[0]["inputSchema"].is_object());
    }

    #[tokio::test]
    async fn test_tools_call() {
        let v = roundtrip(
            r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"echo","arguments":{"x":1}}}"#,
        )
        .await;
        assert_eq!(v["id"], 3);
        assert_eq!(v["result"]["isError"], false);
        let text = v["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("\"x\": 1"));
    }

    #[tokio::test]
    async fn test_tools_call_without_name() {
        let v = roundtrip(r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{}}"#).await;
        assert_eq!(v["error"]["code"], protocol::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let v = roundtrip(r#"{"jsonrpc":"2.0","id":5,"method":"resources/list"}"#).await;
        assert_eq!(v["error"]["code"], protocol::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_parse_error() {
        let v = roundtrip("{not json").await;
        assert_eq!(v["error"]["code"], protocol::PARSE_ERROR);
        assert!(v.get("id").is_none());
    }

    #[tokio::test]
    async fn test_notification_gets_no_reply() {
        let reply = server()
            .handle_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await;
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn test_run_over_pipes() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "\n"
        );
        let mut output = Vec::new();
        let (_tx, rx) = broadcast::channel(1);

        server()
            .run(BufReader::new(input.as_bytes()), &mut output, rx)
            .await
            .unwrap();

        let text = String::from_utf8(output).unwrap();
        let lines: Vec<Value> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["id"], 1);
        assert_eq!(lines[1]["id"], 2);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (_client, server_side) = tokio::io::duplex(64);
        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(async move {
            server()
                .run(BufReader::new(server_side), tokio::io::sink(), rx)
                .await
        });

        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }

    struct StuckHandler {
        dropped: Arc<std::sync::atomic::AtomicBool>,
    }

    struct SetOnDrop(Arc<std::sync::atomic::AtomicBool>);

    impl Drop for SetOnDrop {
        fn drop(&mut self) {
            self.0.store(true, std::sync::atomic::Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl ToolHandler for StuckHandler {
        fn server_name(&self) -> &'static str {
            "stuck"
        }

        fn tool_definitions(&self) -> Vec<ToolDefinition> {
            vec![ToolDefinition::no_args("wait", "Never finishes in time")]
        }

        async fn call_tool(&self, _name: &str, _arguments: &Value) -> ToolOutput {
            let _guard = SetOnDrop(self.dropped.clone());
            tokio::time::sleep(std::time::Duration::from_secs(1_200)).await;
            ToolOutput::text("done")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_tool_call() {
        let dropped = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let server = McpServer::new(Arc::new(StuckHandler {
            dropped: dropped.clone(),
        }));
        let (mut client, server_side) = tokio::io::duplex(1024);
        let (tx, rx) = broadcast::channel(1);
        let started = tokio::time::Instant::now();

        let handle = tokio::spawn(async move {
            server
                .run(BufReader::new(server_side), tokio::io::sink(), rx)
                .await
        });

        client
            .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"tools/call\",\"params\":{\"name\":\"wait\"}}\n")
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        tx.send(()).unwrap();

        handle.await.unwrap().unwrap();
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
        assert!(dropped.load(std::sync::atomic::Ordering::SeqCst));
    }
}
