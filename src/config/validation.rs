//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (batch size, backoff, deadlines)
//! - Check that the server being started has what it needs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function of the config and the server kind

use std::fmt;

use url::Url;

use crate::config::schema::BridgeConfig;

/// Which MCP server the configuration is being validated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerKind {
    Brokerage,
    Vault,
}

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate `config` for the given server.
pub fn validate_config(config: &BridgeConfig, kind: ServerKind) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<std::net::SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    match kind {
        ServerKind::Brokerage => validate_brokerage(config, &mut errors),
        ServerKind::Vault => validate_vault(config, &mut errors),
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_brokerage(config: &BridgeConfig, errors: &mut Vec<ValidationError>) {
    let channel = &config.channel;
    for (field, value) in [
        ("channel.request_queue_url", &channel.request_queue_url),
        ("channel.response_queue_url", &channel.response_queue_url),
    ] {
        if value.is_empty() {
            errors.push(ValidationError::new(field, "is required (or set the IBKR_* environment variable)"));
        } else if Url::parse(value).is_err() {
            errors.push(ValidationError::new(field, format!("'{}' is not a URL", value)));
        }
    }
    if channel.region.is_empty() {
        errors.push(ValidationError::new("channel.region", "is required"));
    }
    if channel.correlation_attribute.is_empty() {
        errors.push(ValidationError::new("channel.correlation_attribute", "must not be empty"));
    }
    if !(1..=10).contains(&channel.batch_size) {
        errors.push(ValidationError::new("channel.batch_size", "must be between 1 and 10"));
    }
    if channel.long_poll_secs > 20 {
        errors.push(ValidationError::new("channel.long_poll_secs", "must be at most 20"));
    }
    if channel.http_timeout_secs <= channel.long_poll_secs {
        errors.push(ValidationError::new(
            "channel.http_timeout_secs",
            "must exceed channel.long_poll_secs",
        ));
    }

    let polling = &config.polling;
    if polling.initial_backoff_ms == 0 {
        errors.push(ValidationError::new("polling.initial_backoff_ms", "must be greater than 0"));
    }
    if polling.max_backoff_ms < polling.initial_backoff_ms {
        errors.push(ValidationError::new(
            "polling.max_backoff_ms",
            "must be at least polling.initial_backoff_ms",
        ));
    }
    if !polling.backoff_factor.is_finite() || polling.backoff_factor < 1.0 {
        errors.push(ValidationError::new("polling.backoff_factor", "must be a finite value >= 1.0"));
    }

    let timeouts = &config.timeouts;
    for (field, value) in [
        ("timeouts.lookup_secs", timeouts.lookup_secs),
        ("timeouts.standard_secs", timeouts.standard_secs),
        ("timeouts.bulk_secs", timeouts.bulk_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than 0"));
        }
    }
}

fn validate_vault(config: &BridgeConfig, errors: &mut Vec<ValidationError>) {
    let vault = &config.vault;
    if Url::parse(&vault.connect_url).is_err() {
        errors.push(ValidationError::new(
            "vault.connect_url",
            format!("'{}' is not a URL", vault.connect_url),
        ));
    }
    if vault.token.is_empty() {
        errors.push(ValidationError::new("vault.token", "is required (set OP_CONNECT_TOKEN)"));
    }
    if vault.allowed_vaults.iter().all(|v| v.trim().is_empty()) {
        errors.push(ValidationError::new("vault.allowed_vaults", "must name at least one vault"));
    }
    if vault.http_timeout_secs == 0 {
        errors.push(ValidationError::new("vault.http_timeout_secs", "must be greater than 0"));
    }
}
