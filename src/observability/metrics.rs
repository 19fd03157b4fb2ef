//! Metrics collection and exposition.
//!
//! # Metrics
//! - `bridge_calls_total` (counter): correlated calls by operation, outcome
//! - `bridge_call_duration_seconds` (histogram): send-to-match latency
//! - `bridge_poll_batches_total` (counter): fetches by result (empty, batch, error)
//! - `bridge_messages_released_total` (counter): foreign messages handed back
//! - `bridge_malformed_responses_total` (counter): matched bodies that failed to parse
//! - `bridge_rate_limit_wait_seconds` (histogram): time spent in the limiter
//! - `bridge_tool_calls_total` (counter): MCP tool invocations by server, tool
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_call(operation: &str, outcome: &'static str, elapsed: Duration) {
    metrics::counter!(
        "bridge_calls_total",
        "operation" => operation.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!("bridge_call_duration_seconds", "operation" => operation.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn record_poll(result: &'static str) {
    metrics::counter!("bridge_poll_batches_total", "result" => result).increment(1);
}

pub fn record_released(count: usize) {
    if count > 0 {
        metrics::counter!("bridge_messages_released_total").increment(count as u64);
    }
}

pub fn record_malformed_response() {
    metrics::counter!("bridge_malformed_responses_total").increment(1);
}

pub fn record_rate_limit_wait(wait: Duration) {
    metrics::histogram!("bridge_rate_limit_wait_seconds").record(wait.as_secs_f64());
}

pub fn record_tool_call(server: &'static str, tool: &str) {
    metrics::counter!(
        "bridge_tool_calls_total",
        "server" => server,
        "tool" => tool.to_string()
    )
    .increment(1);
}
