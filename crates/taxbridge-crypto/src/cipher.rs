//! AES-256-GCM sealing of individual string fields.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;
use crate::key::FieldKey;

/// 12-byte nonce for AES-GCM (96 bits is the standard).
pub const NONCE_SIZE: usize = 12;

/// An encrypted field token as stored at rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SealedField(String);

impl SealedField {
    /// Wrap a stored token without validating it. Validation happens when
    /// the token is opened.
    pub fn from_token(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The token text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn parts(&self) -> Result<([u8; NONCE_SIZE], Vec<u8>), CryptoError> {
        let (nonce_hex, ct_hex) = self
            .0
            .split_once(':')
            .ok_or(CryptoError::MalformedToken("missing ':' separator"))?;
        if ct_hex.is_empty() {
            return Err(CryptoError::MalformedToken("empty ciphertext"));
        }
        let nonce = hex::decode(nonce_hex).map_err(|e| CryptoError::HexDecode(e.to_string()))?;
        let nonce: [u8; NONCE_SIZE] = nonce
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::InvalidNonceLength(nonce.len()))?;
        let ciphertext = hex::decode(ct_hex).map_err(|e| CryptoError::HexDecode(e.to_string()))?;
        Ok((nonce, ciphertext))
    }
}

/// Stateless field codec holding the server-side key.
#[derive(Clone)]
pub struct FieldCipher {
    key: FieldKey,
}

impl FieldCipher {
    /// Create a cipher for the given key.
    pub fn new(key: FieldKey) -> Self {
        Self { key }
    }

    fn aead(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(self.key.as_bytes()))
    }

    /// Seal a plaintext field. Absent or empty input yields `None`.
    pub fn encrypt(&self, plaintext: Option<&str>) -> Result<Option<SealedField>, CryptoError> {
        match plaintext {
            None | Some("") => Ok(None),
            Some(text) => self.seal(text).map(Some),
        }
    }

    /// Seal a non-empty plaintext.
    pub fn seal(&self, plaintext: &str) -> Result<SealedField, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .aead()
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::EncryptionFailed)?;

        Ok(SealedField(format!(
            "{}:{}",
            hex::encode(nonce_bytes),
            hex::encode(ciphertext)
        )))
    }

    /// Open a sealed field, reporting why it could not be opened.
    pub fn try_decrypt(&self, sealed: &SealedField) -> Result<String, CryptoError> {
        let (nonce_bytes, ciphertext) = sealed.parts()?;
        let plaintext = self
            .aead()
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_slice())
            .map_err(|_| CryptoError::DecryptionFailed)?;
        String::from_utf8(plaintext).map_err(|_| CryptoError::InvalidUtf8)
    }

    /// Open a sealed field, yielding `None` and a warning on any failure.
    pub fn decrypt(&self, sealed: &SealedField) -> Option<String> {
        match self.try_decrypt(sealed) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!(error = %e, "field decryption failed, returning empty value");
                None
            }
        }
    }

    /// Open an optional sealed field.
    pub fn decrypt_opt(&self, sealed: Option<&SealedField>) -> Option<String> {
        sealed.and_then(|s| self.decrypt(s))
    }
}

impl std::fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldCipher").field("key", &self.key).finish()
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::key::KEY_SIZE;
    use proptest::prelude::*;

    proptest! {
        /// Any non-empty string survives a seal/open cycle.
        #[test]
        fn roundtrip_non_empty(s in ".{1,200}") {
            let cipher = FieldCipher::new(FieldKey::from_bytes([3u8; KEY_SIZE]));
            let sealed = cipher.encrypt(Some(&s)).unwrap().unwrap();
            prop_assert_eq!(cipher.decrypt(&sealed), Some(s));
        }

        /// Two seals of the same text produce distinct tokens.
        #[test]
        fn repeated_seal_differs(s in ".{1,64}") {
            let cipher = FieldCipher::new(FieldKey::from_bytes([3u8; KEY_SIZE]));
            let a = cipher.seal(&s).unwrap();
            let b = cipher.seal(&s).unwrap();
            prop_assert_ne!(a, b);
        }
    }
}
