//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the bridge.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for both MCP servers.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BridgeConfig {
    /// Log output settings.
    pub logging: LoggingConfig,

    /// Metrics settings.
    pub observability: ObservabilityConfig,

    /// Queue transport used by the brokerage server.
    pub channel: ChannelConfig,

    /// Poll cadence for the correlation engine.
    pub polling: PollingConfig,

    /// Per-operation call deadlines.
    pub timeouts: TimeoutConfig,

    /// Credential vault settings.
    pub vault: VaultConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset (trace, debug, info, warn, error).
    pub level: String,

    /// Emit JSON lines instead of the human-readable format.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable the Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9464".to_string(),
        }
    }
}

/// Queue transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// AWS region of both queues.
    pub region: String,

    /// Queue that receives request envelopes.
    pub request_queue_url: String,

    /// Queue the remote worker answers on.
    pub response_queue_url: String,

    /// Message attribute carrying the correlation id on responses.
    pub correlation_attribute: String,

    /// Maximum messages fetched per poll (SQS caps this at 10).
    pub batch_size: usize,

    /// Long-poll wait applied to each fetch, in seconds.
    pub long_poll_secs: u64,

    /// HTTP timeout for a single transport request, in seconds.
    pub http_timeout_secs: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            region: "us-west-2".to_string(),
            request_queue_url: String::new(),
            response_queue_url: String::new(),
            correlation_attribute: "ExecutionId".to_string(),
            batch_size: 10,
            long_poll_secs: 3,
            http_timeout_secs: 30,
        }
    }
}

impl ChannelConfig {
    pub fn long_poll(&self) -> Duration {
        Duration::from_secs(self.long_poll_secs)
    }
}

/// Backoff between unsuccessful polls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PollingConfig {
    /// First delay of every call, in milliseconds.
    pub initial_backoff_ms: u64,

    /// Ceiling the delay never exceeds, in milliseconds.
    pub max_backoff_ms: u64,

    /// Multiplier applied after each unsuccessful poll.
    pub backoff_factor: f64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 500,
            max_backoff_ms: 5_000,
            backoff_factor: 1.5,
        }
    }
}

/// Deadlines for the three classes of brokerage operation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Quick lookups (health, symbol search, single contract).
    pub lookup_secs: u64,

    /// Account snapshots (balances, positions).
    pub standard_secs: u64,

    /// Bulk market-data jobs that legitimately run for minutes.
    pub bulk_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            lookup_secs: 120,
            standard_secs: 300,
            bulk_secs: 1_200,
        }
    }
}

/// Credential vault configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Base URL of the 1Password Connect server.
    pub connect_url: String,

    /// Connect access token. Prefer `OP_CONNECT_TOKEN` over the file.
    #[serde(skip_serializing)]
    pub token: String,

    /// Vault names visible to the agent (case-insensitive).
    pub allowed_vaults: Vec<String>,

    /// Minimum spacing between secret resolutions, in milliseconds.
    pub resolve_min_delay_ms: u64,

    /// HTTP timeout for Connect requests, in seconds.
    pub http_timeout_secs: u64,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            connect_url: "http://localhost:8080".to_string(),
            token: String::new(),
            allowed_vaults: vec!["AI".to_string()],
            resolve_min_delay_ms: 1_000,
            http_timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_worker_contract() {
        let config = BridgeConfig::default();
        assert_eq!(config.channel.correlation_attribute, "ExecutionId");
        assert_eq!(config.channel.batch_size, 10);
        assert_eq!(config.polling.initial_backoff_ms, 500);
        assert_eq!(config.polling.max_backoff_ms, 5_000);
        assert_eq!(config.timeouts.lookup_secs, 120);
        assert_eq!(config.timeouts.bulk_secs, 1_200);
        assert_eq!(config.vault.allowed_vaults, vec!["AI".to_string()]);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let raw = r#"
            [channel]
            request_queue_url = "https://sqs.us-west-2.amazonaws.com/1/req"

            [polling]
            backoff_factor = 2.0
        "#;
        let config: BridgeConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.channel.request_queue_url, "https://sqs.us-west-2.amazonaws.com/1/req");
        assert_eq!(config.channel.region, "us-west-2");
        assert_eq!(config.polling.backoff_factor, 2.0);
        assert_eq!(config.polling.max_backoff_ms, 5_000);
    }

    #[test]
    fn test_token_not_serialized() {
        let mut config = BridgeConfig::default();
        config.vault.token = "ops_secret".to_string();
        let rendered = toml::to_string(&config).unwrap();
        assert!(!rendered.contains("ops_secret"));
    }
}
