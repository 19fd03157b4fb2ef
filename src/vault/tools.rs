//! Vault (1Password) MCP tools.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::error;

use crate::mcp::{Arguments, ToolDefinition, ToolError, ToolHandler, ToolOutput};
use crate::security::RateLimiter;
use crate::vault::backend::VaultError;
use crate::vault::client::VaultClient;

pub const SERVER_NAME: &str = "onepassword-mcp";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultTool {
    ListVaults,
    ListItems {
        vault_id: String,
        category: Option<String>,
    },
    GetItem {
        vault_id: String,
        item_id: String,
    },
    ResolveSecret {
        reference: String,
    },
    GetOtp {
        vault_id: String,
        item_id: String,
        field_id: Option<String>,
    },
}

impl VaultTool {
    pub fn parse(name: &str, arguments: &Value) -> Result<Self, ToolError> {
        let args = Arguments::new(arguments);
        let owned = |s: &str| s.to_string();

        Ok(match name {
            "op_list_vaults" => VaultTool::ListVaults,
            "op_list_items" => VaultTool::ListItems {
                vault_id: owned(args.required_str("vault_id")?),
                category: args.optional_str("category")?.map(owned),
            },
            "op_get_item" => VaultTool::GetItem {
                vault_id: owned(args.required_str("vault_id")?),
                item_id: owned(args.required_str("item_id")?),
            },
            "op_resolve_secret" => VaultTool::ResolveSecret {
                reference: owned(args.required_str("secret_reference")?),
            },
            "op_get_otp" => VaultTool::GetOtp {
                vault_id: owned(args.required_str("vault_id")?),
                item_id: owned(args.required_str("item_id")?),
                field_id: args.optional_str("field_id")?.map(owned),
            },
            other => return Err(ToolError::UnknownTool(other.to_string())),
        })
    }

    pub fn definitions() -> Vec<ToolDefinition> {
        vec![
            ToolDefinition::no_args(
                "op_list_vaults",
                "List all accessible 1Password vaults (filtered by allowlist)",
            ),
            ToolDefinition::new(
                "op_list_items",
                "List items in a 1Password vault",
                json!({
                    "type": "object",
                    "properties": {
                        "vault_id": {"type": "string", "description": "The vault ID to list items from"},
                        "category": {
                            "type": "string",
                            "description": "Optional category filter (e.g., LOGIN, PASSWORD, API_CREDENTIAL)",
                        },
                    },
                    "required": ["vault_id"],
                }),
            ),
            ToolDefinition::new(
                "op_get_item",
                "Get item details from 1Password (sensitive fields redacted)",
                json!({
                    "type": "object",
                    "properties": {
                        "vault_id": {"type": "string", "description": "The vault ID containing the item"},
                        "item_id": {"type": "string", "description": "The item ID to retrieve"},
                    },
                    "required": ["vault_id", "item_id"],
                }),
            ),
            ToolDefinition::new(
                "op_resolve_secret",
                "Resolve a secret reference to get its value. Use format: op://vault/item/field",
                json!({
                    "type": "object",
                    "properties": {
                        "secret_reference": {
                            "type": "string",
                            "description": "Secret reference (e.g., op://AI/GitHub/password)",
                        },
                    },
                    "required": ["secret_reference"],
                }),
            ),
            ToolDefinition::new(
                "op_get_otp",
                "Get the current TOTP code for an item",
                json!({
                    "type": "object",
                    "properties": {
                        "vault_id": {"type": "string", "description": "The vault ID containing the item"},
                        "item_id": {"type": "string", "description": "The item ID with TOTP field"},
                        "field_id": {
                            "type": "string",
                            "description": "Optional field ID if item has multiple TOTP fields",
                        },
                    },
                    "required": ["vault_id", "item_id"],
                }),
            ),
        ]
    }
}

pub struct VaultService {
    client: Arc<VaultClient>,
    resolve_limiter: Arc<RateLimiter>,
}

impl VaultService {
    pub fn new(client: Arc<VaultClient>, resolve_limiter: Arc<RateLimiter>) -> Self {
        Self {
            client,
            resolve_limiter,
        }
    }

    pub async fn execute(&self, tool: &VaultTool) -> Result<ToolOutput, VaultError> {
        match tool {
            VaultTool::ListVaults => Ok(ToolOutput::json(&self.client.list_vaults().await?)),
            VaultTool::ListItems { vault_id, category } => Ok(ToolOutput::json(
                &self.client.list_items(vault_id, category.as_deref()).await?,
            )),
            VaultTool::GetItem { vault_id, item_id } => {
                Ok(ToolOutput::json(&self.client.get_item(vault_id, item_id).await?))
            }
            VaultTool::ResolveSecret { reference } => {
                self.resolve_limiter.acquire().await;
                Ok(ToolOutput::text(self.client.resolve_secret(reference).await?))
            }
            VaultTool::GetOtp {
                vault_id,
                item_id,
                field_id,
            } => Ok(ToolOutput::text(
                self.client
                    .get_otp(vault_id, item_id, field_id.as_deref())
                    .await?,
            )),
        }
    }
}

#[async_trait]
impl ToolHandler for VaultService {
    fn server_name(&self) -> &'static str {
        SERVER_NAME
    }

    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        VaultTool::definitions()
    }

    async fn call_tool(&self, name: &str, arguments: &Value) -> ToolOutput {
        let tool = match VaultTool::parse(name, arguments) {
            Ok(tool) => tool,
            Err(e) => return e.into(),
        };

        match self.execute(&tool).await {
            Ok(output) => output,
            Err(e) => {
                error!(tool = name, error = %e, "Vault call failed");
                ToolOutput::error(format!("1Password error: {}", e))
            }
        }
    }
}
