//! 1Password Connect REST backend.
//!
//! # Design Decisions
//! - Bearer token on every request, set once as a default header
//! - Ids are added as path segments so they are always percent-encoded
//! - Section ids on fields are resolved to section labels here, once

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use crate::config::VaultConfig;
use crate::vault::backend::{
    ItemDetails, ItemField, ItemSummary, ItemUrl, VaultBackend, VaultError, VaultSummary,
};

#[derive(Debug, Deserialize)]
struct ConnectVault {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ConnectItemSummary {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    category: String,
}

#[derive(Debug, Deserialize)]
struct ConnectSectionRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ConnectSection {
    id: String,
    #[serde(default)]
    label: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConnectField {
    id: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(rename = "type", default)]
    field_type: Option<String>,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    totp: Option<String>,
    #[serde(default)]
    section: Option<ConnectSectionRef>,
}

#[derive(Debug, Deserialize)]
struct ConnectUrl {
    href: String,
    #[serde(default)]
    primary: bool,
}

#[derive(Debug, Deserialize)]
struct ConnectItem {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    fields: Vec<ConnectField>,
    #[serde(default)]
    sections: Vec<ConnectSection>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    urls: Vec<ConnectUrl>,
}

#[derive(Debug, Deserialize)]
struct ConnectError {
    #[serde(default)]
    message: String,
}

impl From<ConnectItem> for ItemDetails {
    fn from(item: ConnectItem) -> Self {
        let section_labels: HashMap<String, String> = item
            .sections
            .into_iter()
            .map(|s| {
                let label = s.label.filter(|l| !l.is_empty()).unwrap_or_else(|| s.id.clone());
                (s.id, label)
            })
            .collect();

        let fields = item
            .fields
            .into_iter()
            .map(|f| ItemField {
                label: f.label.unwrap_or_else(|| f.id.clone()),
                section: f
                    .section
                    .map(|s| section_labels.get(&s.id).cloned().unwrap_or(s.id)),
                field_type: f.field_type.unwrap_or_else(|| "STRING".to_string()),
                value: f.value,
                totp: f.totp,
                id: f.id,
            })
            .collect();

        ItemDetails {
            id: item.id,
            title: item.title,
            category: item.category,
            fields,
            tags: item.tags,
            urls: item
                .urls
                .into_iter()
                .map(|u| ItemUrl {
                    href: u.href,
                    primary: u.primary,
                })
                .collect(),
        }
    }
}

/// Client for a 1Password Connect server.
#[derive(Clone)]
pub struct ConnectBackend {
    http: reqwest::Client,
    base: Url,
}

impl ConnectBackend {
    pub fn new(config: &VaultConfig) -> Result<Self, VaultError> {
        let base = Url::parse(&config.connect_url)
            .map_err(|e| VaultError::Config(format!("invalid connect_url: {}", e)))?;
        if base.cannot_be_a_base() {
            return Err(VaultError::Config(format!(
                "connect_url '{}' cannot be used as a base URL",
                config.connect_url
            )));
        }

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.token))
            .map_err(|_| VaultError::Config("token contains invalid characters".into()))?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| VaultError::Transport(e.to_string()))?;

        Ok(Self { http, base })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, VaultError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| VaultError::Config("connect_url cannot be a base".into()))?
            .pop_if_empty()
            .extend(["v1"].iter().chain(segments));
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, VaultError> {
        tracing::debug!(path = url.path(), "Connect request");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| VaultError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| VaultError::Transport(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ConnectError>(&text)
                .map(|e| e.message)
                .ok()
                .filter(|m| !m.is_empty())
                .unwrap_or(text);
            return Err(VaultError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&text).map_err(|e| VaultError::Decode(e.to_string()))
    }
}

#[async_trait]
impl VaultBackend for ConnectBackend {
    async fn list_vaults(&self) -> Result<Vec<VaultSummary>, VaultError> {
        let vaults: Vec<ConnectVault> = self.get_json(self.endpoint(&["vaults"])?).await?;
        Ok(vaults
            .into_iter()
            .map(|v| VaultSummary { id: v.id, name: v.name })
            .collect())
    }

    async fn list_items(&self, vault_id: &str) -> Result<Vec<ItemSummary>, VaultError> {
        let items: Vec<ConnectItemSummary> = self
            .get_json(self.endpoint(&["vaults", vault_id, "items"])?)
            .await?;
        Ok(items
            .into_iter()
            .map(|i| ItemSummary {
                id: i.id,
                title: i.title,
                category: i.category,
            })
            .collect())
    }

    async fn get_item(&self, vault_id: &str, item_id: &str) -> Result<ItemDetails, VaultError> {
        let item: ConnectItem = self
            .get_json(self.endpoint(&["vaults", vault_id, "items", item_id])?)
            .await?;
        Ok(item.into())
    }
}

impl std::fmt::Debug for ConnectBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectBackend")
            .field("base", &self.base.as_str())
            .finish()
    }
}
