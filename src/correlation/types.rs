//! Correlation errors and result type.

use std::time::Duration;

use thiserror::Error;

use crate::channel::ChannelError;
use crate::correlation::id::CorrelationId;

/// Errors a correlated call can end with.
#[derive(Debug, Error)]
pub enum CallError {
    /// The request could not be published. Nothing reached the worker.
    #[error("Failed to send request: {0}")]
    Channel(#[from] ChannelError),

    /// No matching response arrived before the deadline.
    #[error("Timeout waiting for response after {:.1}s. Correlation ID: {correlation_id}", elapsed.as_secs_f64())]
    Timeout {
        correlation_id: CorrelationId,
        elapsed: Duration,
    },

    /// A caller parameter would overwrite an envelope field.
    #[error("Parameter '{0}' collides with a reserved envelope field")]
    ReservedParameter(String),

    /// The request could not be encoded as JSON.
    #[error("Failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
}

impl CallError {
    /// Correlation id for diagnostics, when the request got that far.
    pub fn correlation_id(&self) -> Option<&CorrelationId> {
        match self {
            CallError::Timeout { correlation_id, .. } => Some(correlation_id),
            _ => None,
        }
    }

    /// Short label for metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            CallError::Channel(_) => "channel_error",
            CallError::Timeout { .. } => "timeout",
            CallError::ReservedParameter(_) | CallError::Encode(_) => "invalid_request",
        }
    }
}

/// Result type for correlated calls.
pub type CallResult<T> = Result<T, CallError>;
