//! Vault backend abstraction and its error type.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Vault {0} is not in the allowed vaults list")]
    NotAllowed(String),

    #[error("{0}")]
    InvalidReference(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Field '{0}' has no value")]
    EmptyField(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("server returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VaultSummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemSummary {
    pub id: String,
    pub title: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemField {
    pub id: String,
    pub label: String,
    /// Section label, or id when the section is unlabelled.
    pub section: Option<String>,
    pub field_type: String,
    pub value: Option<String>,
    /// Current code, for OTP fields.
    pub totp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemUrl {
    pub href: String,
    pub primary: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDetails {
    pub id: String,
    pub title: String,
    pub category: String,
    pub fields: Vec<ItemField>,
    pub tags: Vec<String>,
    pub urls: Vec<ItemUrl>,
}

/// Read-only access to a password manager.
#[async_trait]
pub trait VaultBackend: Send + Sync {
    async fn list_vaults(&self) -> Result<Vec<VaultSummary>, VaultError>;

    async fn list_items(&self, vault_id: &str) -> Result<Vec<ItemSummary>, VaultError>;

    async fn get_item(&self, vault_id: &str, item_id: &str) -> Result<ItemDetails, VaultError>;
}
