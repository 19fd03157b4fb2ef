//! Request dispatcher.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::channel::Channel;
use crate::correlation::envelope::RequestEnvelope;
use crate::correlation::id::CorrelationId;
use crate::correlation::types::CallResult;

/// Publishes request envelopes to the outbound channel.
pub struct Dispatcher {
    channel: Arc<dyn Channel>,
}

impl Dispatcher {
    pub fn new(channel: Arc<dyn Channel>) -> Self {
        Self { channel }
    }

    /// Publish `operation` with `params` and return the id to wait on.
    ///
    /// Nothing is published if a parameter uses a reserved envelope key.
    pub async fn send(
        &self,
        operation: &str,
        params: Option<Map<String, Value>>,
    ) -> CallResult<CorrelationId> {
        let envelope = RequestEnvelope::new(operation, params)?;
        let body = envelope.to_body()?;

        if let Err(e) = self.channel.publish(body).await {
            error!(
                operation = operation,
                correlation_id = %envelope.correlation_id(),
                error = %e,
                "Failed to publish request"
            );
            return Err(e.into());
        }

        debug!(
            operation = operation,
            correlation_id = %envelope.correlation_id(),
            timestamp = envelope.timestamp(),
            "Request published"
        );
        Ok(envelope.correlation_id().clone())
    }
}
