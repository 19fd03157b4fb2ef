//! Request envelope.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::correlation::id::CorrelationId;
use crate::correlation::types::{CallError, CallResult};

/// Envelope keys a parameter may not use.
pub const RESERVED_KEYS: [&str; 3] = ["operation", "correlation_id", "timestamp"];

/// Request as published: envelope fields plus flat-merged parameters.
#[derive(Debug, Clone, Serialize)]
pub struct RequestEnvelope {
    operation: String,
    correlation_id: CorrelationId,
    timestamp: String,
    #[serde(flatten)]
    params: Map<String, Value>,
}

impl RequestEnvelope {
    /// Build an envelope with a fresh correlation id and the current UTC time.
    pub fn new(operation: impl Into<String>, params: Option<Map<String, Value>>) -> CallResult<Self> {
        let params = params.unwrap_or_default();
        if let Some(key) = params.keys().find(|k| RESERVED_KEYS.contains(&k.as_str())) {
            return Err(CallError::ReservedParameter(key.clone()));
        }

        Ok(Self {
            operation: operation.into(),
            correlation_id: CorrelationId::generate(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            params,
        })
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// Serialize for the wire.
    pub fn to_body(&self) -> CallResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
