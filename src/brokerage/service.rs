//! Brokerage MCP server: tool calls forwarded over the correlation channel.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::error;

use crate::brokerage::tools::BrokerageTool;
use crate::config::TimeoutConfig;
use crate::correlation::{CallError, CorrelationClient};
use crate::mcp::{ToolDefinition, ToolHandler, ToolOutput};

pub const SERVER_NAME: &str = "ibkr-mcp";

/// Render a failed call for the agent.
pub fn render_call_error(err: &CallError) -> ToolOutput {
    let text = match err {
        CallError::Channel(_) => format!(
            "SQS communication error. Check AWS credentials and queue access.\n\nError: {}",
            err
        ),
        CallError::Timeout { .. } => format!(
            "Request timed out. The TWS service may be unavailable or processing a long operation.\n\nError: {}",
            err
        ),
        CallError::ReservedParameter(_) | CallError::Encode(_) => format!("Unexpected error: {}", err),
    };
    ToolOutput::error(text)
}

pub struct BrokerageService {
    client: Arc<CorrelationClient>,
    timeouts: TimeoutConfig,
}

impl BrokerageService {
    pub fn new(client: Arc<CorrelationClient>, timeouts: TimeoutConfig) -> Self {
        Self { client, timeouts }
    }

    /// Run one parsed tool to completion.
    pub async fn execute(&self, tool: &BrokerageTool) -> Result<Value, CallError> {
        let timeout = tool.timeout_class().duration(&self.timeouts);
        self.client.call(tool.operation(), tool.params(), timeout).await
    }
}

#[async_trait]
impl ToolHandler for BrokerageService {
    fn server_name(&self) -> &'static str {
        SERVER_NAME
    }

    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        BrokerageTool::definitions()
    }

    async fn call_tool(&self, name: &str, arguments: &Value) -> ToolOutput {
        let tool = match BrokerageTool::parse(name, arguments) {
            Ok(tool) => tool,
            Err(e) => return e.into(),
        };

        match self.execute(&tool).await {
            Ok(payload) => ToolOutput::titled_json(&tool.heading(), &payload),
            Err(e) => {
                error!(
                    tool = name,
                    operation = tool.operation(),
                    correlation_id = ?e.correlation_id().map(|id| id.as_str()),
                    error = %e,
                    "Brokerage call failed"
                );
                render_call_error(&e)
            }
        }
    }
}
