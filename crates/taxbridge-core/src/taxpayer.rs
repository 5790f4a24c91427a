//! # Taxpayer Identification
//!
//! The Ecuadorian SRI taxpayer registry number ([`Ruc`]) and the taxpayer
//! category a credential belongs to ([`TaxpayerType`]).

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Length of a RUC in digits.
pub const RUC_LENGTH: usize = 13;

/// Registro Único de Contribuyentes: the 13-digit SRI taxpayer number.
///
/// Surrounding whitespace is trimmed before validation; no check-digit
/// verification is performed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ruc(String);

impl Ruc {
    /// Create a RUC, validating the 13-digit format.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidRuc`] if the trimmed string is not
    /// exactly 13 ASCII digits.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        let trimmed = s.trim();
        if trimmed.len() != RUC_LENGTH || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::InvalidRuc(s));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Access the RUC digits.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Ruc {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Ruc {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Ruc> for String {
    fn from(value: Ruc) -> Self {
        value.0
    }
}

impl std::fmt::Display for Ruc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// SRI taxpayer category.
///
/// Accepts the legacy Spanish labels (`persona_natural`, `sociedad`, `rise`)
/// on input; always serializes with the English names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxpayerType {
    /// Natural person.
    #[serde(alias = "persona_natural")]
    Individual,
    /// Company or other legal entity.
    #[serde(alias = "sociedad")]
    Corporate,
    /// RISE simplified tax regime.
    #[serde(alias = "rise")]
    SimplifiedRegime,
}

impl TaxpayerType {
    /// All taxpayer categories.
    pub const ALL: [TaxpayerType; 3] = [
        TaxpayerType::Individual,
        TaxpayerType::Corporate,
        TaxpayerType::SimplifiedRegime,
    ];

    /// Canonical snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Individual => "individual",
            Self::Corporate => "corporate",
            Self::SimplifiedRegime => "simplified_regime",
        }
    }
}

impl FromStr for TaxpayerType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "individual" | "persona_natural" => Ok(Self::Individual),
            "corporate" | "sociedad" => Ok(Self::Corporate),
            "simplified_regime" | "rise" => Ok(Self::SimplifiedRegime),
            other => Err(ValidationError::InvalidTaxpayerType(other.to_string())),
        }
    }
}

impl std::fmt::Display for TaxpayerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ruc_accepts_thirteen_digits() {
        let ruc = Ruc::new("1790012345001").unwrap();
        assert_eq!(ruc.as_str(), "1790012345001");
    }

    #[test]
    fn ruc_trims_whitespace() {
        let ruc = Ruc::new(" 0991234567001\n").unwrap();
        assert_eq!(ruc.as_str(), "0991234567001");
    }

    #[test]
    fn ruc_rejects_wrong_length_and_non_digits() {
        for bad in ["", "179001234500", "17900123450011", "17900123450a1", "1790-12345001"] {
            assert!(Ruc::new(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn ruc_deserialize_validates() {
        let bad: Result<Ruc, _> = serde_json::from_str("\"123\"");
        assert!(bad.is_err());
    }

    #[test]
    fn taxpayer_type_parses_english_and_legacy_labels() {
        assert_eq!("individual".parse::<TaxpayerType>(), Ok(TaxpayerType::Individual));
        assert_eq!("persona_natural".parse::<TaxpayerType>(), Ok(TaxpayerType::Individual));
        assert_eq!("sociedad".parse::<TaxpayerType>(), Ok(TaxpayerType::Corporate));
        assert_eq!("rise".parse::<TaxpayerType>(), Ok(TaxpayerType::SimplifiedRegime));
        assert!("company".parse::<TaxpayerType>().is_err());
    }

    #[test]
    fn taxpayer_type_serde_uses_english_names() {
        let legacy: TaxpayerType = serde_json::from_str("\"sociedad\"").unwrap();
        assert_eq!(legacy, TaxpayerType::Corporate);
        assert_eq!(
            serde_json::to_string(&TaxpayerType::SimplifiedRegime).unwrap(),
            "\"simplified_regime\""
        );
    }

    #[test]
    fn taxpayer_type_display_matches_serde() {
        for t in TaxpayerType::ALL {
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, format!("\"{t}\""));
        }
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Any 13-digit string is a valid RUC.
        #[test]
        fn any_thirteen_digits_is_valid(s in "[0-9]{13}") {
            prop_assert!(Ruc::new(s).is_ok());
        }

        /// Digit strings of any other length are rejected.
        #[test]
        fn other_lengths_rejected(s in "[0-9]{0,12}|[0-9]{14,20}") {
            prop_assert!(Ruc::new(s).is_err());
        }

        /// A non-digit anywhere in a 13-character string is rejected.
        #[test]
        fn non_digit_rejected(prefix in "[0-9]{0,12}", c in "[a-zA-Z\\-]") {
            let mut s = prefix.clone();
            s.push_str(&c);
            while s.len() < RUC_LENGTH {
                s.push('0');
            }
            prop_assert!(Ruc::new(s).is_err());
        }
    }
}
