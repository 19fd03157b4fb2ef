//! MCP bridge
//!
//! Runs one of two MCP servers over stdio.
//!
//! # Architecture Overview
//!
//! ```text
//!   MCP client ──stdin──▶ mcp::server ──tools/call──▶ brokerage ──▶ correlation ──▶ channel (SQS)
//!              ◀─stdout──             ◀──ToolOutput──            ◀──            ◀── remote worker
//!
//!   MCP client ──stdin──▶ mcp::server ──tools/call──▶ vault ──▶ 1Password Connect
//!
//!   Cross-cutting: config (+ allowlist reload), observability, resilience, lifecycle
//! ```
//!
//! stdout carries only protocol frames; all logging goes to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::BufReader;

use mcp_bridge::config::{load_config, ServerKind};
use mcp_bridge::lifecycle::signals::spawn_signal_handler;
use mcp_bridge::lifecycle::startup::{build_brokerage, build_vault, watch_allowlist};
use mcp_bridge::lifecycle::Shutdown;
use mcp_bridge::mcp::{McpServer, ToolHandler};
use mcp_bridge::observability::{logging::init_logging, metrics::init_metrics};

#[derive(Parser)]
#[command(name = "mcp-bridge")]
#[command(about = "MCP servers for brokerage and credential vault access", long_about = None)]
struct Cli {
    /// TOML config file. Environment variables override its values.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    server: Server,
}

#[derive(Subcommand, Clone, Copy)]
enum Server {
    /// Brokerage tools relayed through the request/response queues
    Brokerage,
    /// Read-only 1Password tools
    Vault,
}

impl Server {
    fn kind(self) -> ServerKind {
        match self {
            Server::Brokerage => ServerKind::Brokerage,
            Server::Vault => ServerKind::Vault,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref(), cli.server.kind()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("mcp-bridge: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config.logging);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "mcp-bridge starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Arc::new(Shutdown::new());
    spawn_signal_handler(Arc::clone(&shutdown));

    // Held until exit so the allowlist keeps reloading.
    let mut _watcher = None;

    let handler: Arc<dyn ToolHandler> = match cli.server {
        Server::Brokerage => {
            tracing::info!(
                request_queue = %config.channel.request_queue_url,
                response_queue = %config.channel.response_queue_url,
                "Brokerage server configured"
            );
            build_brokerage(&config)?
        }
        Server::Vault => {
            let (service, client) = build_vault(&config)?;
            tracing::info!(
                allowed_vaults = ?client.allowlist().names(),
                "Vault server configured"
            );
            if let Some(path) = cli.config.as_deref() {
                match watch_allowlist(path, client, shutdown.subscribe()) {
                    Ok(watcher) => _watcher = Some(watcher),
                    Err(e) => tracing::warn!(error = %e, "Config watching disabled"),
                }
            }
            service
        }
    };

    let server = McpServer::new(handler);
    server
        .run(
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
            shutdown.subscribe(),
        )
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
