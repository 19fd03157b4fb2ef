//! Secret references of the form `op://vault/item/[section/]field`.

use std::fmt;

use crate::vault::backend::VaultError;

const SCHEME: &str = "op://";

/// Which part of a field a reference asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldAttribute {
    Value,
    Otp,
}

/// A parsed secret reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretReference {
    pub vault: String,
    pub item: String,
    pub section: Option<String>,
    pub field: String,
    pub attribute: FieldAttribute,
}

impl SecretReference {
    pub fn parse(raw: &str) -> Result<Self, VaultError> {
        let rest = raw
            .trim()
            .strip_prefix(SCHEME)
            .ok_or_else(|| VaultError::InvalidReference("Secret reference must start with 'op://'".into()))?;

        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (rest, None),
        };

        let attribute = match query {
            None => FieldAttribute::Value,
            Some(query) => parse_attribute(query)?,
        };

        let parts: Vec<&str> = path.split('/').collect();
        let invalid = || {
            VaultError::InvalidReference(
                "Invalid secret reference format. Use: op://vault/item/field".into(),
            )
        };
        if parts.iter().any(|p| p.is_empty()) {
            return Err(invalid());
        }

        match parts.as_slice() {
            [vault, item, field] => Ok(Self {
                vault: vault.to_string(),
                item: item.to_string(),
                section: None,
                field: field.to_string(),
                attribute,
            }),
            [vault, item, section, field] => Ok(Self {
                vault: vault.to_string(),
                item: item.to_string(),
                section: Some(section.to_string()),
                field: field.to_string(),
                attribute,
            }),
            _ => Err(invalid()),
        }
    }

    /// Reference to the current TOTP code of a field.
    pub fn otp(vault: &str, item: &str, field: &str) -> Self {
        Self {
            vault: vault.to_string(),
            item: item.to_string(),
            section: None,
            field: field.to_string(),
            attribute: FieldAttribute::Otp,
        }
    }
}

fn parse_attribute(query: &str) -> Result<FieldAttribute, VaultError> {
    for pair in query.split('&') {
        if let Some(("attribute", value)) = pair.split_once('=') {
            return match value.to_ascii_lowercase().as_str() {
                "otp" | "totp" => Ok(FieldAttribute::Otp),
                "value" => Ok(FieldAttribute::Value),
                other => Err(VaultError::InvalidReference(format!(
                    "Unsupported secret reference attribute '{}'",
                    other
                ))),
            };
        }
    }
    Ok(FieldAttribute::Value)
}

impl fmt::Display for SecretReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}/", SCHEME, self.vault, self.item)?;
        if let Some(section) = &self.section {
            write!(f, "{}/", section)?;
        }
        f.write_str(&self.field)?;
        if self.attribute == FieldAttribute::Otp {
            f.write_str("?attribute=otp")?;
        }
        Ok(())
    }
}
