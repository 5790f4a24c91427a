//! # Identity Newtypes
//!
//! Identifier newtypes for the registry. Each identifier is a distinct
//! type, so you cannot pass a [`CustomerId`] where a [`UserId`] is expected.
//!
//! ## Validation
//!
//! UUID-based identifiers ([`CredentialId`], [`CustomerId`], [`UserId`])
//! are always valid by construction. String-based identifiers
//! ([`CredentialNumber`], [`CustomerNumber`]) validate format at
//! construction time.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

// ---------------------------------------------------------------------------
// UUID-based identifiers (always valid by construction)
// ---------------------------------------------------------------------------

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Access the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Storage key of a credential record.
    CredentialId
);

uuid_id!(
    /// Identifier of a customer in the customer directory.
    CustomerId
);

uuid_id!(
    /// Identifier of an authenticated principal (admin, accountant, or the
    /// account a customer logs in with).
    UserId
);

// ---------------------------------------------------------------------------
// String-based identifiers (validated at construction)
// ---------------------------------------------------------------------------

/// Prefix of every credential number.
pub const CREDENTIAL_NUMBER_PREFIX: &str = "SRI-";

/// Minimum digit width of the numeric part of a credential number.
const CREDENTIAL_NUMBER_WIDTH: usize = 6;

/// Human-readable sequential credential identifier, e.g. `SRI-000001`.
///
/// Sequences beyond 999999 widen naturally (`SRI-1000000`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CredentialNumber(String);

impl CredentialNumber {
    /// Format the credential number for the given sequence value.
    pub fn from_sequence(sequence: u64) -> Self {
        Self(format!(
            "{CREDENTIAL_NUMBER_PREFIX}{sequence:0width$}",
            width = CREDENTIAL_NUMBER_WIDTH
        ))
    }

    /// Parse and validate a credential number.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidCredentialNumber`] unless the value
    /// is `SRI-` followed by at least one digit.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        match s.strip_prefix(CREDENTIAL_NUMBER_PREFIX) {
            Some(digits) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
                Ok(Self(s))
            }
            _ => Err(ValidationError::InvalidCredentialNumber(s)),
        }
    }

    /// The numeric sequence encoded in this credential number.
    pub fn sequence(&self) -> Option<u64> {
        self.0
            .strip_prefix(CREDENTIAL_NUMBER_PREFIX)
            .and_then(|digits| digits.parse().ok())
    }

    /// Access the credential number string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CredentialNumber {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CredentialNumber> for String {
    fn from(value: CredentialNumber) -> Self {
        value.0
    }
}

impl std::fmt::Display for CredentialNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Customer number claim (e.g. `TB-000042`), the key customers are
/// resolved by. Trimmed and required to be non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CustomerNumber(String);

impl CustomerNumber {
    /// Create a customer number, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyCustomerNumber`] for blank input.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let trimmed = value.into().trim().to_string();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyCustomerNumber);
        }
        Ok(Self(trimmed))
    }

    /// Access the customer number string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for CustomerNumber {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CustomerNumber {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CustomerNumber> for String {
    fn from(value: CustomerNumber) -> Self {
        value.0
    }
}

impl std::fmt::Display for CustomerNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
