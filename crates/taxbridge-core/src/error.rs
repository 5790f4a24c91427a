//! # Validation Errors
//!
//! Structured errors for the domain-primitive constructors, built with
//! `thiserror`. Each variant carries the rejected input so operators can
//! diagnose bad requests without guesswork.

use thiserror::Error;

/// Validation errors for domain primitive newtypes and enums.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// RUC is not exactly 13 ASCII digits.
    #[error("tax_id: invalid RUC \"{0}\" (expected exactly 13 digits)")]
    InvalidRuc(String),

    /// Taxpayer type is not one of the supported categories.
    #[error("taxpayer_type: unknown value \"{0}\" (expected individual, corporate, or simplified_regime)")]
    InvalidTaxpayerType(String),

    /// Customer number claim is empty.
    #[error("customer_number: must be non-empty")]
    EmptyCustomerNumber,

    /// Credential number does not match `SRI-<digits>`.
    #[error("credential_number: invalid value \"{0}\" (expected SRI-<digits>)")]
    InvalidCredentialNumber(String),

    /// Role string is not one of admin, accountant, customer.
    #[error("role: unknown value \"{0}\"")]
    InvalidRole(String),

    /// Permission string is not one of view, edit.
    #[error("permissions: unknown value \"{0}\" (expected view or edit)")]
    InvalidPermission(String),

    /// Credential status is not one of active, inactive, expired, revoked.
    #[error("status: unknown value \"{0}\" (expected active, inactive, expired, or revoked)")]
    InvalidStatus(String),

    /// An expiry instant is not in the future.
    #[error("expires_at: must be in the future")]
    ExpiryNotInFuture,

    /// A required field was missing or blank.
    #[error("{0}: is required")]
    MissingField(&'static str),
}

impl ValidationError {
    /// The request field this error refers to.
    pub fn field(&self) -> &'static str {
        match self {
            Self::InvalidRuc(_) => "tax_id",
            Self::InvalidTaxpayerType(_) => "taxpayer_type",
            Self::EmptyCustomerNumber => "customer_number",
            Self::InvalidCredentialNumber(_) => "credential_number",
            Self::InvalidRole(_) => "role",
            Self::InvalidPermission(_) => "permissions",
            Self::InvalidStatus(_) => "status",
            Self::ExpiryNotInFuture => "expires_at",
            Self::MissingField(field) => field,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_ruc_display_names_field_and_input() {
        let msg = ValidationError::InvalidRuc("12ab".to_string()).to_string();
        assert!(msg.starts_with("tax_id:"));
        assert!(msg.contains("12ab"));
        assert!(msg.contains("13 digits"));
    }

    #[test]
    fn missing_field_reports_field_name() {
        let err = ValidationError::MissingField("sri_password");
        assert_eq!(err.field(), "sri_password");
        assert_eq!(err.to_string(), "sri_password: is required");
    }

    #[test]
    fn field_accessor_matches_display_prefix() {
        let cases = [
            ValidationError::InvalidRuc("x".into()),
            ValidationError::InvalidTaxpayerType("x".into()),
            ValidationError::EmptyCustomerNumber,
            ValidationError::InvalidCredentialNumber("x".into()),
            ValidationError::InvalidRole("x".into()),
            ValidationError::InvalidPermission("x".into()),
            ValidationError::InvalidStatus("x".into()),
            ValidationError::ExpiryNotInFuture,
        ];
        for err in cases {
            assert!(
                err.to_string().starts_with(err.field()),
                "display of {err:?} should start with its field"
            );
        }
    }
}
