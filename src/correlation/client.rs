//! Synchronous-looking calls over the request/response channel.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::time::Instant;
use tracing::info;

use crate::channel::{Channel, ChannelError, Credentials, SqsChannel};
use crate::config::{BridgeConfig, ChannelConfig, PollingConfig};
use crate::correlation::dispatcher::Dispatcher;
use crate::correlation::id::CorrelationId;
use crate::correlation::poller::ResponsePoller;
use crate::correlation::types::CallResult;
use crate::observability::metrics;
use crate::resilience::BackoffPolicy;

/// `send` + `wait_for` over one channel.
///
/// Cheap to share behind an `Arc`; concurrent calls only share the channel.
pub struct CorrelationClient {
    dispatcher: Dispatcher,
    poller: ResponsePoller,
    poll_interval: Duration,
}

impl CorrelationClient {
    pub fn new(channel: Arc<dyn Channel>, config: &ChannelConfig, polling: &PollingConfig) -> Self {
        Self {
            dispatcher: Dispatcher::new(Arc::clone(&channel)),
            poller: ResponsePoller::new(
                channel,
                config.batch_size,
                config.correlation_attribute.clone(),
                BackoffPolicy::from(polling),
            ),
            poll_interval: config.long_poll(),
        }
    }

    /// Client over the SQS queues named in `config`, with credentials from
    /// the environment.
    pub fn from_config(config: &BridgeConfig) -> Result<Self, ChannelError> {
        let channel = SqsChannel::new(&config.channel, Credentials::from_env()?)?;
        info!(
            request_queue = %config.channel.request_queue_url,
            response_queue = %config.channel.response_queue_url,
            region = %config.channel.region,
            "SQS channel configured"
        );
        Ok(Self::new(Arc::new(channel), &config.channel, &config.polling))
    }

    pub async fn send(&self, operation: &str, params: Option<Map<String, Value>>) -> CallResult<CorrelationId> {
        self.dispatcher.send(operation, params).await
    }

    pub async fn wait_for(&self, correlation_id: &CorrelationId, timeout: Duration) -> CallResult<Value> {
        self.poller
            .wait_for(correlation_id, timeout, self.poll_interval)
            .await
    }

    /// Publish `operation` and wait up to `timeout` for its response.
    pub async fn call(
        &self,
        operation: &str,
        params: Option<Map<String, Value>>,
        timeout: Duration,
    ) -> CallResult<Value> {
        let started = Instant::now();
        let result = match self.send(operation, params).await {
            Ok(id) => {
                info!(
                    operation = operation,
                    correlation_id = %id,
                    timeout_secs = timeout.as_secs(),
                    "Waiting for response"
                );
                self.wait_for(&id, timeout).await
            }
            Err(e) => Err(e),
        };

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.outcome(),
        };
        metrics::record_call(operation, outcome, started.elapsed());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MemoryChannel;
    use crate::correlation::types::CallError;

    fn client(channel: Arc<MemoryChannel>) -> CorrelationClient {
        CorrelationClient::new(channel, &ChannelConfig::default(), &PollingConfig::default())
    }

    /// Answers every published request once, tagging the reply with its id.
    fn spawn_worker(channel: Arc<MemoryChannel>, reply: Value) {
        tokio::spawn(async move {
            loop {
                let body = channel.recv_published().await;
                let request: Value = serde_json::from_str(&body).unwrap();
                let id = request["correlation_id"].as_str().unwrap().to_string();
                let mut response = reply.clone();
                response["operation"] = request["operation"].clone();
                channel.deliver_tagged(response.to_string(), "ExecutionId", &id);
            }
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_round_trip() {
        let channel = Arc::new(MemoryChannel::new());
        spawn_worker(channel.clone(), serde_json::json!({"status": "ok"}));

        let payload = client(channel.clone())
            .call("health", None, Duration::from_secs(10))
            .await
            .unwrap();

        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["operation"], "health");
        assert_eq!(channel.stats().deleted, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_times_out_without_worker() {
        let channel = Arc::new(MemoryChannel::new());
        let err = client(channel)
            .call("health", None, Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::Timeout { .. }));
    }
}
