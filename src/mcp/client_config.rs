//! MCP client configuration for both servers.
//!
//! Emits the `mcpServers` document an MCP client loads to spawn the bridge.
//! Secrets are passed through as `${VAR}` placeholders, never inlined.

use std::path::Path;

use serde_json::{json, Map, Value};

const BROKERAGE_ENV: [&str; 6] = [
    "IBKR_REQUEST_QUEUE_URL",
    "IBKR_RESPONSE_QUEUE_URL",
    "AWS_REGION",
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "AWS_SESSION_TOKEN",
];

const VAULT_ENV: [&str; 4] = [
    "OP_CONNECT_HOST",
    "OP_CONNECT_TOKEN",
    "OP_ALLOWED_VAULTS",
    "OP_LOG_LEVEL",
];

fn passthrough(names: &[&str]) -> Value {
    let env: Map<String, Value> = names
        .iter()
        .map(|name| (name.to_string(), Value::String(format!("${{{}}}", name))))
        .collect();
    Value::Object(env)
}

fn server_entry(binary: &Path, config: Option<&Path>, subcommand: &str, env: &[&str]) -> Value {
    let mut args = Vec::new();
    if let Some(path) = config {
        args.push("--config".to_string());
        args.push(path.display().to_string());
    }
    args.push(subcommand.to_string());

    json!({
        "type": "stdio",
        "command": binary.display().to_string(),
        "args": args,
        "env": passthrough(env),
    })
}

/// Build the client config registering `ibkr` and `onepassword`.
pub fn mcp_client_config(binary: &Path, config: Option<&Path>) -> Value {
    json!({
        "mcpServers": {
            "ibkr": server_entry(binary, config, "brokerage", &BROKERAGE_ENV),
            "onepassword": server_entry(binary, config, "vault", &VAULT_ENV),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_servers_registered() {
        let value = mcp_client_config(Path::new("/usr/local/bin/mcp-bridge"), None);
        let servers = value["mcpServers"].as_object().unwrap();
        assert_eq!(servers.len(), 2);

        let ibkr = &servers["ibkr"];
        assert_eq!(ibkr["type"], "stdio");
        assert_eq!(ibkr["command"], "/usr/local/bin/mcp-bridge");
        assert_eq!(ibkr["args"], json!(["brokerage"]));
        assert_eq!(ibkr["env"]["IBKR_REQUEST_QUEUE_URL"], "${IBKR_REQUEST_QUEUE_URL}");

        let vault = &servers["onepassword"];
        assert_eq!(vault["args"], json!(["vault"]));
        assert_eq!(vault["env"]["OP_CONNECT_TOKEN"], "${OP_CONNECT_TOKEN}");
        assert!(vault["env"].get("AWS_SECRET_ACCESS_KEY").is_none());
    }

    #[test]
    fn test_config_path_precedes_subcommand() {
        let value = mcp_client_config(
            Path::new("mcp-bridge"),
            Some(Path::new("/etc/mcp-bridge.toml")),
        );
        assert_eq!(
            value["mcpServers"]["ibkr"]["args"],
            json!(["--config", "/etc/mcp-bridge.toml", "brokerage"])
        );
    }
}
