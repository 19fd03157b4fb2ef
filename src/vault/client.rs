//! Policy layer over a vault backend.
//!
//! # Responsibilities
//! - Enforce the vault allowlist on every operation
//! - Redact sensitive fields before item details leave the server
//! - Resolve secret references and OTP codes
//!
//! # Design Decisions
//! - The allowlist sits behind `ArcSwap` so a config reload swaps it without
//!   blocking in-flight calls
//! - Vault id → name mapping is cached and refreshed on a miss
//! - Allowlist checks go by vault *name*; ids are looked up first

use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::vault::backend::{ItemDetails, ItemField, VaultBackend, VaultError};
use crate::vault::reference::{FieldAttribute, SecretReference};
use crate::vault::security::{FieldRedactor, VaultFilter};

pub const DEFAULT_OTP_FIELD: &str = "one-time password";

pub struct VaultClient {
    backend: Arc<dyn VaultBackend>,
    filter: ArcSwap<VaultFilter>,
    vault_names: DashMap<String, String>,
    redactor: FieldRedactor,
}

impl VaultClient {
    pub fn new(backend: Arc<dyn VaultBackend>, filter: VaultFilter) -> Self {
        info!(allowed_vaults = ?filter.names(), "Vault allowlist");
        Self {
            backend,
            filter: ArcSwap::from_pointee(filter),
            vault_names: DashMap::new(),
            redactor: FieldRedactor,
        }
    }

    /// Swap in a new allowlist.
    pub fn update_allowlist(&self, filter: VaultFilter) {
        info!(allowed_vaults = ?filter.names(), "Vault allowlist updated");
        self.filter.store(Arc::new(filter));
    }

    pub fn allowlist(&self) -> Arc<VaultFilter> {
        self.filter.load_full()
    }

    async fn refresh_vault_names(&self) -> Result<(), VaultError> {
        let vaults = self.backend.list_vaults().await?;
        self.vault_names.clear();
        for vault in vaults {
            self.vault_names.insert(vault.id, vault.name);
        }
        debug!(count = self.vault_names.len(), "Vault name cache refreshed");
        Ok(())
    }

    async fn vault_name(&self, vault_id: &str) -> Result<Option<String>, VaultError> {
        if !self.vault_names.contains_key(vault_id) {
            self.refresh_vault_names().await?;
        }
        Ok(self.vault_names.get(vault_id).map(|name| name.value().clone()))
    }

    /// Name of `vault_id` if it is allowed; `NotAllowed` otherwise.
    async fn ensure_allowed(&self, vault_id: &str) -> Result<String, VaultError> {
        let name = self.vault_name(vault_id).await?;
        match name {
            Some(name) if self.filter.load().is_allowed(&name) => Ok(name),
            Some(name) => Err(VaultError::NotAllowed(format!("'{}' (ID: {})", name, vault_id))),
            None => Err(VaultError::NotAllowed(format!("'{}' (ID: {})", vault_id, vault_id))),
        }
    }

    /// Allowed vaults as `{vaults, count}`.
    pub async fn list_vaults(&self) -> Result<Value, VaultError> {
        let filter = self.filter.load();
        let vaults: Vec<_> = self
            .backend
            .list_vaults()
            .await?
            .into_iter()
            .inspect(|v| {
                self.vault_names.insert(v.id.clone(), v.name.clone());
            })
            .filter(|v| filter.is_allowed(&v.name))
            .collect();

        Ok(json!({ "count": vaults.len(), "vaults": vaults }))
    }

    /// Items in an allowed vault as `{items, count, vault_id}`.
    pub async fn list_items(&self, vault_id: &str, category: Option<&str>) -> Result<Value, VaultError> {
        self.ensure_allowed(vault_id).await?;

        let items: Vec<Value> = self
            .backend
            .list_items(vault_id)
            .await?
            .into_iter()
            .filter(|item| category.map_or(true, |c| item.category.eq_ignore_ascii_case(c)))
            .map(|item| {
                json!({
                    "id": item.id,
                    "title": item.title,
                    "category": item.category,
                    "vault_id": vault_id,
                })
            })
            .collect();

        Ok(json!({ "count": items.len(), "items": items, "vault_id": vault_id }))
    }

    /// Item details with sensitive values redacted.
    pub async fn get_item(&self, vault_id: &str, item_id: &str) -> Result<Value, VaultError> {
        self.ensure_allowed(vault_id).await?;
        let item = self.backend.get_item(vault_id, item_id).await?;
        Ok(self.item_view(vault_id, item))
    }

    fn item_view(&self, vault_id: &str, item: ItemDetails) -> Value {
        let fields: Vec<Value> = self
            .redactor
            .redact_fields(item.fields)
            .into_iter()
            .map(|f| {
                json!({
                    "id": f.id,
                    "title": f.label,
                    "field_type": f.field_type,
                    "value": f.value.unwrap_or_default(),
                })
            })
            .collect();
        let urls: Vec<Value> = item
            .urls
            .into_iter()
            .map(|u| json!({ "url": u.href, "primary": u.primary }))
            .collect();

        json!({
            "id": item.id,
            "title": item.title,
            "category": item.category,
            "vault_id": vault_id,
            "fields": fields,
            "tags": item.tags,
            "urls": urls,
        })
    }

    /// Resolve an `op://` reference to the raw secret value.
    pub async fn resolve_secret(&self, reference: &str) -> Result<String, VaultError> {
        let reference = SecretReference::parse(reference)?;
        if !self.filter.load().is_allowed(&reference.vault) {
            return Err(VaultError::NotAllowed(format!("'{}'", reference.vault)));
        }
        self.resolve(&reference).await
    }

    /// Current TOTP code of an item in an allowed vault.
    pub async fn get_otp(&self, vault_id: &str, item_id: &str, field_id: Option<&str>) -> Result<String, VaultError> {
        let vault_name = self.ensure_allowed(vault_id).await?;
        let reference = SecretReference::otp(&vault_name, item_id, field_id.unwrap_or(DEFAULT_OTP_FIELD));
        self.resolve(&reference).await
    }

    async fn resolve(&self, reference: &SecretReference) -> Result<String, VaultError> {
        debug!(vault = %reference.vault, item = %reference.item, "Resolving secret reference");

        // 1. Vault by name (or id).
        let vaults = self.backend.list_vaults().await?;
        let vault = vaults
            .iter()
            .find(|v| v.name.eq_ignore_ascii_case(&reference.vault))
            .or_else(|| vaults.iter().find(|v| v.id == reference.vault))
            .ok_or_else(|| VaultError::NotFound(format!("Vault '{}'", reference.vault)))?;

        // 2. Item by id (or title).
        let items = self.backend.list_items(&vault.id).await?;
        let item = items
            .iter()
            .find(|i| i.id == reference.item)
            .or_else(|| items.iter().find(|i| i.title.eq_ignore_ascii_case(&reference.item)))
            .ok_or_else(|| VaultError::NotFound(format!("Item '{}'", reference.item)))?;
        let details = self.backend.get_item(&vault.id, &item.id).await?;

        // 3. Field within the item.
        let field = find_field(&details.fields, reference)
            .ok_or_else(|| VaultError::NotFound(format!("Field '{}'", reference.field)))?;

        let secret = match reference.attribute {
            FieldAttribute::Value => field.value.clone(),
            FieldAttribute::Otp => field.totp.clone(),
        };
        secret
            .filter(|s| !s.is_empty())
            .ok_or_else(|| VaultError::EmptyField(reference.field.clone()))
    }
}

fn find_field<'a>(fields: &'a [ItemField], reference: &SecretReference) -> Option<&'a ItemField> {
    let in_section = |f: &&ItemField| match &reference.section {
        None => true,
        Some(section) => f
            .section
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case(section)),
    };
    let named = |f: &&ItemField| {
        f.id.eq_ignore_ascii_case(&reference.field) || f.label.eq_ignore_ascii_case(&reference.field)
    };

    fields
        .iter()
        .filter(in_section)
        .find(named)
        .or_else(|| {
            // An item's TOTP field is often labelled differently; take the first one.
            if reference.attribute == FieldAttribute::Otp && reference.field == DEFAULT_OTP_FIELD {
                fields.iter().filter(in_section).find(|f| f.totp.is_some())
            } else {
                None
            }
        })
}
