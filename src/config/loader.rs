//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::BridgeConfig;
use crate::config::validation::{validate_config, ServerKind, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load configuration for `kind`.
///
/// Reads the TOML file when a path is given (defaults otherwise), applies
/// environment overrides, then validates.
pub fn load_config(path: Option<&Path>, kind: ServerKind) -> Result<BridgeConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
            toml::from_str(&content).map_err(ConfigError::Parse)?
        }
        None => BridgeConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    validate_config(&config, kind).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay environment variables onto `config`.
///
/// Empty values are ignored so an exported-but-blank variable does not wipe
/// out a value from the file.
pub fn apply_env_overrides<F>(config: &mut BridgeConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(url) = get("IBKR_REQUEST_QUEUE_URL") {
        config.channel.request_queue_url = url;
    }
    if let Some(url) = get("IBKR_RESPONSE_QUEUE_URL") {
        config.channel.response_queue_url = url;
    }
    if let Some(region) = get("AWS_REGION") {
        config.channel.region = region;
    }
    if let Some(host) = get("OP_CONNECT_HOST") {
        config.vault.connect_url = host;
    }
    if let Some(token) = get("OP_CONNECT_TOKEN") {
        config.vault.token = token;
    }
    if let Some(vaults) = get("OP_ALLOWED_VAULTS") {
        config.vault.allowed_vaults = vaults
            .split(',')
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();
    }
    if let Some(level) = get("OP_LOG_LEVEL") {
        config.logging.level = level.to_lowercase();
    }
}
