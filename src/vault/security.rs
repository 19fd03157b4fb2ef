//! Vault allowlisting and field redaction.

use std::collections::HashSet;

use crate::vault::backend::ItemField;

pub const REDACTED: &str = "[REDACTED]";

/// Field types whose values never leave the server through item views.
const SENSITIVE_FIELD_TYPES: [&str; 4] = [
    "CONCEALED",
    "PASSWORD",
    "CREDIT_CARD_NUMBER",
    "CREDIT_CARD_VERIFICATION_NUMBER",
];

/// Substrings of a field id that mark it sensitive regardless of type.
const SENSITIVE_FIELD_IDS: [&str; 5] = ["password", "credential", "secret", "cvv", "pin"];

/// Case-insensitive set of vault names the server may touch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VaultFilter {
    allowed: HashSet<String>,
}

impl VaultFilter {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = names
            .into_iter()
            .map(|name| name.as_ref().trim().to_lowercase())
            .filter(|name| !name.is_empty())
            .collect();
        Self { allowed }
    }

    /// Parse a comma-separated list, as found in `OP_ALLOWED_VAULTS`.
    pub fn parse(raw: &str) -> Self {
        Self::new(raw.split(','))
    }

    pub fn is_allowed(&self, vault_name: &str) -> bool {
        self.allowed.contains(&vault_name.to_lowercase())
    }

    /// Allowed names, sorted, for logging.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.allowed.iter().cloned().collect();
        names.sort();
        names
    }
}

/// Replaces the value of sensitive fields with a placeholder.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldRedactor;

impl FieldRedactor {
    pub fn is_sensitive(&self, field: &ItemField) -> bool {
        let field_type = field.field_type.to_uppercase();
        let id = field.id.to_lowercase();
        SENSITIVE_FIELD_TYPES.contains(&field_type.as_str())
            || SENSITIVE_FIELD_IDS.iter().any(|pattern| id.contains(pattern))
    }

    pub fn redact_field(&self, mut field: ItemField) -> ItemField {
        if self.is_sensitive(&field) {
            field.value = Some(REDACTED.to_string());
            field.totp = None;
        }
        field
    }

    pub fn redact_fields(&self, fields: Vec<ItemField>) -> Vec<ItemField> {
        fields.into_iter().map(|f| self.redact_field(f)).collect()
    }
}
