//! # Credential Records
//!
//! A credential exists in two shapes:
//!
//! - [`CredentialDocument`]: the stored aggregate. The portal username,
//!   password and notes are [`SealedField`] tokens; delegations and the
//!   access log are embedded value collections mutated as one unit.
//! - [`Credential`]: the plaintext projection returned by
//!   [`CredentialDocument::open`]. A field that fails to decrypt reads as
//!   `None`.
//!
//! [`SafeCredential`] is the outward projection: no password and no access
//! log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taxbridge_core::{
    CredentialId, CredentialNumber, CustomerId, CustomerNumber, Ruc, TaxpayerType, UserId,
};
use taxbridge_crypto::{FieldCipher, SealedField};

use crate::audit::AccessLogEntry;
use crate::delegation::Delegation;
use crate::directory::{Customer, User};

/// Hierarchy tier of a credential whose customer has an assigned accountant:
/// admin(0) → accountant(1) → customer(2) → credential(3).
pub const DEPTH_WITH_ACCOUNTANT: u8 = 3;

/// Hierarchy tier of a credential reached only through its customer.
pub const DEPTH_WITHOUT_ACCOUNTANT: u8 = 2;

/// Lifecycle status of a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialStatus {
    /// In use. The only status included in role-filtered listings and graphs.
    #[default]
    Active,
    /// Disabled by an operator.
    Inactive,
    /// Past its validity.
    Expired,
    /// Withdrawn by the customer or an administrator.
    Revoked,
}

impl CredentialStatus {
    /// Canonical snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
        }
    }
}

impl std::str::FromStr for CredentialStatus {
    type Err = taxbridge_core::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "expired" => Ok(Self::Expired),
            "revoked" => Ok(Self::Revoked),
            other => Err(taxbridge_core::ValidationError::InvalidStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for CredentialStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Denormalized pointer to an ancestor node in the access hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum ParentNode {
    /// The owning customer.
    Customer(CustomerId),
    /// The assigned accountant.
    Accountant(UserId),
}

/// The stored credential aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialDocument {
    pub id: CredentialId,
    pub credential_number: CredentialNumber,
    pub customer_id: CustomerId,
    pub customer_number: CustomerNumber,
    pub customer_name: String,
    pub assigned_accountant: Option<UserId>,
    pub assigned_accountant_name: Option<String>,
    pub sri_username: Option<SealedField>,
    pub sri_password: Option<SealedField>,
    pub notes: Option<SealedField>,
    pub tax_id: Ruc,
    pub taxpayer_type: TaxpayerType,
    pub legal_name: Option<String>,
    #[serde(default)]
    pub delegations: Vec<Delegation>,
    /// Oldest first, never longer than [`ACCESS_LOG_CAPACITY`](crate::audit::ACCESS_LOG_CAPACITY).
    #[serde(default)]
    pub access_log: Vec<AccessLogEntry>,
    pub status: CredentialStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub last_accessed_by: Option<UserId>,
    pub graph_depth: u8,
    pub parent_nodes: Vec<ParentNode>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CredentialDocument {
    /// Decrypt the sensitive fields into a plaintext [`Credential`].
    pub fn open(&self, cipher: &FieldCipher) -> Credential {
        Credential {
            id: self.id,
            credential_number: self.credential_number.clone(),
            customer_id: self.customer_id,
            customer_number: self.customer_number.clone(),
            customer_name: self.customer_name.clone(),
            assigned_accountant: self.assigned_accountant,
            assigned_accountant_name: self.assigned_accountant_name.clone(),
            sri_username: cipher.decrypt_opt(self.sri_username.as_ref()),
            sri_password: cipher.decrypt_opt(self.sri_password.as_ref()),
            notes: cipher.decrypt_opt(self.notes.as_ref()),
            tax_id: self.tax_id.clone(),
            taxpayer_type: self.taxpayer_type,
            legal_name: self.legal_name.clone(),
            delegations: self.delegations.clone(),
            access_log: self.access_log.clone(),
            status: self.status,
            expires_at: self.expires_at,
            last_accessed_at: self.last_accessed_at,
            last_accessed_by: self.last_accessed_by,
            graph_depth: self.graph_depth,
            parent_nodes: self.parent_nodes.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Whether this record counts toward the one-active-per-RUC rule.
    pub fn is_active(&self) -> bool {
        self.status == CredentialStatus::Active
    }

    /// Set the ancestor pointers for a freshly created record.
    pub(crate) fn place(&mut self, customer: &Customer, accountant: Option<&User>) {
        self.parent_nodes = vec![ParentNode::Customer(customer.id)];
        self.graph_depth = DEPTH_WITHOUT_ACCOUNTANT;
        if let Some(user) = accountant {
            self.assign_accountant(user);
        }
    }

    /// Assign an accountant, replacing the accountant ancestor pointer if
    /// one exists and appending it otherwise.
    pub(crate) fn assign_accountant(&mut self, accountant: &User) {
        self.assigned_accountant = Some(accountant.id);
        self.assigned_accountant_name = Some(accountant.display_name.clone());
        match self
            .parent_nodes
            .iter_mut()
            .find(|n| matches!(n, ParentNode::Accountant(_)))
        {
            Some(node) => *node = ParentNode::Accountant(accountant.id),
            None => self.parent_nodes.push(ParentNode::Accountant(accountant.id)),
        }
        self.graph_depth = DEPTH_WITH_ACCOUNTANT;
    }
}

/// Plaintext view of a credential.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Credential {
    pub id: CredentialId,
    pub credential_number: CredentialNumber,
    pub customer_id: CustomerId,
    pub customer_number: CustomerNumber,
    pub customer_name: String,
    pub assigned_accountant: Option<UserId>,
    pub assigned_accountant_name: Option<String>,
    pub sri_username: Option<String>,
    pub sri_password: Option<String>,
    pub notes: Option<String>,
    pub tax_id: Ruc,
    pub taxpayer_type: TaxpayerType,
    pub legal_name: Option<String>,
    pub delegations: Vec<Delegation>,
    pub access_log: Vec<AccessLogEntry>,
    pub status: CredentialStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub last_accessed_by: Option<UserId>,
    pub graph_depth: u8,
    pub parent_nodes: Vec<ParentNode>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Credential {
    /// Project away the password and the access log.
    pub fn to_safe_view(&self) -> SafeCredential {
        SafeCredential {
            id: self.id,
            credential_number: self.credential_number.clone(),
            customer_id: self.customer_id,
            customer_number: self.customer_number.clone(),
            customer_name: self.customer_name.clone(),
            assigned_accountant: self.assigned_accountant,
            assigned_accountant_name: self.assigned_accountant_name.clone(),
            sri_username: self.sri_username.clone(),
            notes: self.notes.clone(),
            tax_id: self.tax_id.clone(),
            taxpayer_type: self.taxpayer_type,
            legal_name: self.legal_name.clone(),
            delegations: self.delegations.clone(),
            status: self.status,
            expires_at: self.expires_at,
            last_accessed_at: self.last_accessed_at,
            last_accessed_by: self.last_accessed_by,
            graph_depth: self.graph_depth,
            parent_nodes: self.parent_nodes.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Credential as returned to callers: the password and access log are
/// not representable here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SafeCredential {
    pub id: CredentialId,
    pub credential_number: CredentialNumber,
    pub customer_id: CustomerId,
    pub customer_number: CustomerNumber,
    pub customer_name: String,
    pub assigned_accountant: Option<UserId>,
    pub assigned_accountant_name: Option<String>,
    pub sri_username: Option<String>,
    pub notes: Option<String>,
    pub tax_id: Ruc,
    pub taxpayer_type: TaxpayerType,
    pub legal_name: Option<String>,
    pub delegations: Vec<Delegation>,
    pub status: CredentialStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub last_accessed_by: Option<UserId>,
    pub graph_depth: u8,
    pub parent_nodes: Vec<ParentNode>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input to credential creation.
#[derive(Debug, Clone)]
pub struct NewCredential {
    pub customer_number: CustomerNumber,
    pub sri_username: String,
    pub sri_password: String,
    pub tax_id: Ruc,
    pub taxpayer_type: TaxpayerType,
    pub accountant_id: Option<UserId>,
    pub legal_name: Option<String>,
    pub notes: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Partial update of the mutable credential fields. `None` leaves a field
/// untouched; an empty `legal_name` or `notes` clears it.
#[derive(Debug, Clone, Default)]
pub struct CredentialPatch {
    pub sri_username: Option<String>,
    pub sri_password: Option<String>,
    pub taxpayer_type: Option<TaxpayerType>,
    pub legal_name: Option<String>,
    pub notes: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub status: Option<CredentialStatus>,
    pub assigned_accountant: Option<UserId>,
}

impl CredentialPatch {
    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.sri_username.is_none()
            && self.sri_password.is_none()
            && self.taxpayer_type.is_none()
            && self.legal_name.is_none()
            && self.notes.is_none()
            && self.expires_at.is_none()
            && self.status.is_none()
            && self.assigned_accountant.is_none()
    }
}
