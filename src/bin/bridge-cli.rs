use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::{Map, Value};

use mcp_bridge::config::{load_config, ServerKind};
use mcp_bridge::mcp::mcp_client_config;
use mcp_bridge::CorrelationClient;

#[derive(Parser)]
#[command(name = "bridge-cli")]
#[command(about = "Operator CLI for the MCP bridge", long_about = None)]
struct Cli {
    /// TOML config file. Environment variables override its values.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one operation to the worker and print its response
    Call {
        operation: String,

        /// Request parameter as key=value; the value is parsed as JSON when possible
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, Value)>,

        #[arg(short, long, default_value_t = 30)]
        timeout_secs: u64,
    },
    /// Print an MCP client config registering both servers
    McpConfig {
        /// Path of the mcp-bridge binary the client should launch
        #[arg(short, long, default_value = "mcp-bridge")]
        binary: PathBuf,
    },
}

fn parse_param(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Call {
            operation,
            params,
            timeout_secs,
        } => {
            let config = load_config(cli.config.as_deref(), ServerKind::Brokerage)?;
            let client = CorrelationClient::from_config(&config)?;
            let params: Map<String, Value> = params.into_iter().collect();
            let params = (!params.is_empty()).then_some(params);

            match client
                .call(&operation, params, Duration::from_secs(timeout_secs))
                .await
            {
                Ok(response) => println!("{}", serde_json::to_string_pretty(&response)?),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::McpConfig { binary } => {
            let value = mcp_client_config(&binary, cli.config.as_deref());
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }

    Ok(())
}
