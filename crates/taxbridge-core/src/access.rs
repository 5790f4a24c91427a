//! # Roles and Access Vocabulary
//!
//! The closed vocabularies the authorization rules are written in:
//! principal [`Role`]s, the [`AccessType`] being requested, and the
//! [`Permission`]s a delegation grants.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Role of an authenticated principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Full access to every credential.
    Admin,
    /// Access to credentials they are assigned to or delegated on.
    #[serde(alias = "contador")]
    Accountant,
    /// Access to credentials of their own customer record.
    #[serde(alias = "cliente")]
    Customer,
}

impl Role {
    /// Canonical snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Accountant => "accountant",
            Self::Customer => "customer",
        }
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "accountant" | "contador" => Ok(Self::Accountant),
            "customer" | "cliente" => Ok(Self::Customer),
            other => Err(ValidationError::InvalidRole(other.to_string())),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of access being requested against a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
    /// Read the credential, including decrypted secrets.
    View,
    /// Modify the credential or its delegations.
    Edit,
    /// Create a credential. Recorded in the audit log only.
    Create,
    /// Delete a credential. Recorded in the audit log only.
    Delete,
    /// Export credential data. Recorded in the audit log only.
    Export,
}

impl AccessType {
    /// Canonical snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Edit => "edit",
            Self::Create => "create",
            Self::Delete => "delete",
            Self::Export => "export",
        }
    }
}

impl std::fmt::Display for AccessType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Permission granted by a delegation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Grants [`AccessType::View`].
    View,
    /// Grants [`AccessType::Edit`].
    Edit,
}

impl Permission {
    /// Canonical snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Edit => "edit",
        }
    }

    /// Whether this permission satisfies a request for `access`.
    ///
    /// A permission covers only the access type of the same name; `edit`
    /// does not imply `view`.
    pub fn covers(&self, access: AccessType) -> bool {
        matches!(
            (self, access),
            (Self::View, AccessType::View) | (Self::Edit, AccessType::Edit)
        )
    }
}

impl FromStr for Permission {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view" => Ok(Self::View),
            "edit" => Ok(Self::Edit),
            other => Err(ValidationError::InvalidPermission(other.to_string())),
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_canonical_and_legacy_names() {
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!("contador".parse::<Role>(), Ok(Role::Accountant));
        assert_eq!("cliente".parse::<Role>(), Ok(Role::Customer));
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn role_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Role::Accountant).unwrap(), "\"accountant\"");
    }

    #[test]
    fn permission_covers_only_same_named_access() {
        assert!(Permission::View.covers(AccessType::View));
        assert!(Permission::Edit.covers(AccessType::Edit));
        assert!(!Permission::Edit.covers(AccessType::View));
        assert!(!Permission::View.covers(AccessType::Edit));
        for access in [AccessType::Create, AccessType::Delete, AccessType::Export] {
            assert!(!Permission::View.covers(access));
            assert!(!Permission::Edit.covers(access));
        }
    }

    #[test]
    fn permission_parse_rejects_unknown() {
        assert_eq!(
            "export".parse::<Permission>(),
            Err(ValidationError::InvalidPermission("export".into()))
        );
    }

    #[test]
    fn access_type_display() {
        assert_eq!(AccessType::Export.to_string(), "export");
    }
}
