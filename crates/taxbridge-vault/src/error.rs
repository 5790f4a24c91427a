//! # Vault Error Types
//!
//! The error taxonomy every credential operation reports through. The HTTP
//! layer maps each variant to one status code.

use taxbridge_core::ValidationError;
use taxbridge_crypto::CryptoError;
use thiserror::Error;

/// Errors from credential registry operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    /// Malformed or missing input. The operation was not attempted.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A uniqueness constraint would be violated (RUC or credential number).
    #[error("{0}")]
    Conflict(String),

    /// Unknown credential, customer, accountant, or delegatee.
    #[error("{0}")]
    NotFound(String),

    /// The caller is authenticated but not allowed to perform the operation.
    #[error("{0}")]
    Forbidden(String),

    /// No usable identity was presented.
    #[error("{0}")]
    Unauthorized(String),

    /// Unexpected failure. The message is for logs, not for callers.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<CryptoError> for VaultError {
    fn from(err: CryptoError) -> Self {
        Self::Internal(format!("field encryption: {err}"))
    }
}

/// Result alias for vault operations.
pub type VaultResult<T> = Result<T, VaultError>;
