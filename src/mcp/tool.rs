//! Tool surface shared by the brokerage and vault servers.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;

/// A tool as advertised by `tools/list`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl ToolDefinition {
    pub fn new(name: &'static str, description: &'static str, input_schema: Value) -> Self {
        Self {
            name,
            description,
            input_schema,
        }
    }

    /// A tool that takes no arguments.
    pub fn no_args(name: &'static str, description: &'static str) -> Self {
        Self::new(name, description, json!({"type": "object", "properties": {}}))
    }
}

/// Text result of one tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub text: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }

    /// Heading line followed by pretty-printed JSON.
    pub fn titled_json(heading: &str, payload: &Value) -> Self {
        let body = serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string());
        Self::text(format!("{}\n{}", heading, body))
    }

    /// Pretty-printed JSON on its own.
    pub fn json(payload: &Value) -> Self {
        Self::text(serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string()))
    }

    /// MCP `CallToolResult` shape.
    pub fn to_value(&self) -> Value {
        json!({
            "content": [{"type": "text", "text": self.text}],
            "isError": self.is_error,
        })
    }
}

/// Bad tool name or arguments. Rendered as `Error: ...`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("{0} is required")]
    MissingArgument(&'static str),

    #[error("{name} {reason}")]
    InvalidArgument { name: &'static str, reason: String },
}

impl ToolError {
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        ToolError::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }
}

impl From<ToolError> for ToolOutput {
    fn from(err: ToolError) -> Self {
        ToolOutput::error(format!("Error: {}", err))
    }
}

/// Typed view over a `tools/call` arguments object.
pub struct Arguments<'a> {
    map: Option<&'a Map<String, Value>>,
}

impl<'a> Arguments<'a> {
    pub fn new(value: &'a Value) -> Self {
        Self {
            map: value.as_object(),
        }
    }

    fn get(&self, name: &str) -> Option<&'a Value> {
        self.map.and_then(|m| m.get(name)).filter(|v| !v.is_null())
    }

    /// Required string, non-empty after trimming.
    pub fn required_str(&self, name: &'static str) -> Result<&'a str, ToolError> {
        match self.get(name) {
            None => Err(ToolError::MissingArgument(name)),
            Some(Value::String(s)) if s.trim().is_empty() => Err(ToolError::MissingArgument(name)),
            Some(Value::String(s)) => Ok(s.as_str()),
            Some(_) => Err(ToolError::invalid(name, "must be a string")),
        }
    }

    pub fn optional_str(&self, name: &'static str) -> Result<Option<&'a str>, ToolError> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str()).filter(|s| !s.is_empty())),
            Some(_) => Err(ToolError::invalid(name, "must be a string")),
        }
    }

    /// Required integer. Numeric strings are accepted.
    pub fn required_i64(&self, name: &'static str) -> Result<i64, ToolError> {
        match self.get(name) {
            None => Err(ToolError::MissingArgument(name)),
            Some(Value::Number(n)) => n
                .as_i64()
                .ok_or_else(|| ToolError::invalid(name, "must be an integer")),
            Some(Value::String(s)) => s
                .trim()
                .parse()
                .map_err(|_| ToolError::invalid(name, "must be an integer")),
            Some(_) => Err(ToolError::invalid(name, "must be an integer")),
        }
    }

    pub fn bool_or(&self, name: &'static str, default: bool) -> Result<bool, ToolError> {
        match self.get(name) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(ToolError::invalid(name, "must be a boolean")),
        }
    }

    /// Raw value, for arguments with their own structure.
    pub fn raw(&self, name: &str) -> Option<&'a Value> {
        self.get(name)
    }
}

/// One MCP server's tool set.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Name reported in `serverInfo`.
    fn server_name(&self) -> &'static str;

    fn tool_definitions(&self) -> Vec<ToolDefinition>;

    /// Run a tool. Every failure comes back as an error output, never a panic.
    async fn call_tool(&self, name: &str, arguments: &Value) -> ToolOutput;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_shape() {
        let v = ToolOutput::error("Error: boom").to_value();
        assert_eq!(v["content"][0]["type"], "text");
        assert_eq!(v["content"][0]["text"], "Error: boom");
        assert_eq!(v["isError"], true);
    }

    #[test]
    fn test_titled_json() {
        let out = ToolOutput::titled_json("Positions:", &json!({"a": 1}));
        assert_eq!(out.text, "Positions:\n{\n  \"a\": 1\n}");
        assert!(!out.is_error);
    }

    #[test]
    fn test_definition_serializes_input_schema() {
        let def = ToolDefinition::no_args("ibkr_health", "Check health");
        let v = serde_json::to_value(&def).unwrap();
        assert_eq!(v["inputSchema"]["type"], "object");
        assert_eq!(v["name"], "ibkr_health");
    }

    #[test]
    fn test_required_str() {
        let value = json!({"query": "AAPL", "blank": "  ", "num": 3});
        let args = Arguments::new(&value);
        assert_eq!(args.required_str("query"), Ok("AAPL"));
        assert_eq!(args.required_str("blank"), Err(ToolError::MissingArgument("blank")));
        assert_eq!(args.required_str("missing"), Err(ToolError::MissingArgument("missing")));
        assert!(matches!(args.required_str("num"), Err(ToolError::InvalidArgument { .. })));
    }

    #[test]
    fn test_required_i64_accepts_numeric_strings() {
        let value = json!({"a": 265598, "b": "8314", "c": "x", "d": 1.5});
        let args = Arguments::new(&value);
        assert_eq!(args.required_i64("a"), Ok(265598));
        assert_eq!(args.required_i64("b"), Ok(8314));
        assert!(args.required_i64("c").is_err());
        assert!(args.required_i64("d").is_err());
    }

    #[test]
    fn test_bool_default_and_null_arguments() {
        let value = json!({"flag": null});
        let args = Arguments::new(&value);
        assert_eq!(args.bool_or("flag", false), Ok(false));

        let none = Value::Null;
        let args = Arguments::new(&none);
        assert_eq!(args.optional_str("category"), Ok(None));
    }

    #[test]
    fn test_tool_error_renders_with_prefix() {
        let out: ToolOutput = ToolError::MissingArgument("query").into();
        assert_eq!(out.text, "Error: query is required");
        assert!(out.is_error);
    }
}
