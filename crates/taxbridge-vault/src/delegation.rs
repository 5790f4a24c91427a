//! # Delegation Ledger
//!
//! Time-boxed grants of `view`/`edit` on one credential to one user,
//! embedded in the credential document.
//!
//! At most one *active* entry exists per delegatee: granting again updates
//! that entry in place. Revocation is a soft delete (`is_active = false`)
//! so history is retained.
//!
//! Expiry is lazy. Nothing sweeps expired entries; they keep
//! `is_active = true` in storage and every access decision compares
//! `expires_at` against the current instant instead.
//!
//! The ledger does not authorize. Callers check `edit` access first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taxbridge_core::{AccessType, Permission, UserId, ValidationError};

use crate::model::CredentialDocument;

/// One delegation entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    pub delegated_to: UserId,
    pub delegated_to_name: String,
    pub delegated_by: UserId,
    pub delegated_by_name: String,
    pub permissions: Vec<Permission>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Delegation {
    /// Active and not yet expired at `now`.
    pub fn is_effective(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at > now
    }

    /// Whether this entry lets `user` perform `access` at `now`.
    pub fn grants(&self, user: UserId, access: AccessType, now: DateTime<Utc>) -> bool {
        self.delegated_to == user
            && self.is_effective(now)
            && self.permissions.iter().any(|p| p.covers(access))
    }
}

/// A validated request to add or refresh a delegation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegationGrant {
    pub delegated_to: UserId,
    pub delegated_to_name: String,
    pub delegated_by: UserId,
    pub delegated_by_name: String,
    pub permissions: Vec<Permission>,
    pub expires_at: DateTime<Utc>,
}

impl DelegationGrant {
    /// Validate a grant. Permissions are de-duplicated and sorted; they must
    /// be non-empty and the expiry must lie after `now`.
    pub fn new(
        delegated_to: (UserId, String),
        delegated_by: (UserId, String),
        mut permissions: Vec<Permission>,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        permissions.sort();
        permissions.dedup();
        if permissions.is_empty() {
            return Err(ValidationError::MissingField("permissions"));
        }
        if expires_at <= now {
            return Err(ValidationError::ExpiryNotInFuture);
        }
        Ok(Self {
            delegated_to: delegated_to.0,
            delegated_to_name: delegated_to.1,
            delegated_by: delegated_by.0,
            delegated_by_name: delegated_by.1,
            permissions,
            expires_at,
        })
    }
}

/// What [`CredentialDocument::add_delegation`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DelegationChange {
    /// A new entry was appended.
    Created,
    /// The delegatee's active entry was overwritten.
    Updated,
}

impl CredentialDocument {
    /// Add a delegation, or refresh the delegatee's active one.
    pub fn add_delegation(&mut self, grant: DelegationGrant, now: DateTime<Utc>) -> DelegationChange {
        if let Some(existing) = self
            .delegations
            .iter_mut()
            .find(|d| d.is_active && d.delegated_to == grant.delegated_to)
        {
            existing.permissions = grant.permissions;
            existing.expires_at = grant.expires_at;
            return DelegationChange::Updated;
        }
        self.delegations.push(Delegation {
            delegated_to: grant.delegated_to,
            delegated_to_name: grant.delegated_to_name,
            delegated_by: grant.delegated_by,
            delegated_by_name: grant.delegated_by_name,
            permissions: grant.permissions,
            expires_at: grant.expires_at,
            is_active: true,
            created_at: now,
        });
        DelegationChange::Created
    }

    /// Deactivate the delegatee's active entry. Returns `false` when there
    /// was none, leaving the ledger untouched.
    pub fn revoke_delegation(&mut self, delegated_to: UserId) -> bool {
        match self
            .delegations
            .iter_mut()
            .find(|d| d.is_active && d.delegated_to == delegated_to)
        {
            Some(entry) => {
                entry.is_active = false;
                true
            }
            None => false,
        }
    }

    /// Entries that currently grant something.
    pub fn effective_delegations(&self, now: DateTime<Utc>) -> impl Iterator<Item = &Delegation> {
        self.delegations.iter().filter(move |d| d.is_effective(now))
    }
}
