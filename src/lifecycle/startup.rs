//! Startup orchestration.
//!
//! # Responsibilities
//! - Build each server's dependency graph from a validated config
//! - Start the allowlist hot-reload task for the vault server
//!
//! # Design Decisions
//! - Fail fast: any construction error is fatal
//! - Everything is built once here and handed down as `Arc`s

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use notify::RecommendedWatcher;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

use crate::brokerage::BrokerageService;
use crate::channel::ChannelError;
use crate::config::watcher::ConfigWatcher;
use crate::config::{BridgeConfig, ServerKind};
use crate::correlation::CorrelationClient;
use crate::security::RateLimiter;
use crate::vault::{ConnectBackend, VaultClient, VaultError, VaultFilter, VaultService};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("channel setup failed: {0}")]
    Channel(#[from] ChannelError),

    #[error("vault setup failed: {0}")]
    Vault(#[from] VaultError),
}

pub fn build_brokerage(config: &BridgeConfig) -> Result<Arc<BrokerageService>, StartupError> {
    let client = CorrelationClient::from_config(config)?;
    Ok(Arc::new(BrokerageService::new(
        Arc::new(client),
        config.timeouts.clone(),
    )))
}

/// Vault service plus the client, so the caller can wire reloads into it.
pub fn build_vault(config: &BridgeConfig) -> Result<(Arc<VaultService>, Arc<VaultClient>), StartupError> {
    let backend = ConnectBackend::new(&config.vault)?;
    tracing::info!(connect_url = %config.vault.connect_url, "1Password Connect backend configured");

    let client = Arc::new(VaultClient::new(
        Arc::new(backend),
        VaultFilter::new(&config.vault.allowed_vaults),
    ));
    let limiter = Arc::new(RateLimiter::new(Duration::from_millis(
        config.vault.resolve_min_delay_ms,
    )));

    Ok((Arc::new(VaultService::new(Arc::clone(&client), limiter)), client))
}

/// Apply reloaded configs to the allowlist until shutdown.
pub async fn apply_allowlist_updates(
    client: Arc<VaultClient>,
    mut updates: mpsc::UnboundedReceiver<BridgeConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Some(config) => client.update_allowlist(VaultFilter::new(&config.vault.allowed_vaults)),
                None => break,
            },
            _ = shutdown.recv() => break,
        }
    }
    tracing::debug!("Allowlist reload task stopped");
}

/// Watch `path` and keep the vault allowlist in sync with it.
///
/// Returns the watcher, which must stay alive for reloads to happen.
pub fn watch_allowlist(
    path: &Path,
    client: Arc<VaultClient>,
    shutdown: broadcast::Receiver<()>,
) -> Result<RecommendedWatcher, notify::Error> {
    let (watcher, updates) = ConfigWatcher::new(path, ServerKind::Vault);
    let handle = watcher.run()?;
    tokio::spawn(apply_allowlist_updates(client, updates, shutdown));
    Ok(handle)
}
