//! # Field Encryption Key
//!
//! The fixed-length server-side secret used by [`FieldCipher`](crate::FieldCipher).
//!
//! Operators configure the key as either 64 hex characters (taken verbatim
//! as the 32 key bytes) or an arbitrary passphrase, which is stretched to
//! 32 bytes with SHA-256 so short and long secrets both yield a full-size
//! key. Key bytes are zeroized on drop and never printed.

use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// AES-256 key size in bytes.
pub const KEY_SIZE: usize = 32;

/// A 256-bit field encryption key.
#[derive(Clone)]
pub struct FieldKey {
    bytes: Zeroizing<[u8; KEY_SIZE]>,
}

impl FieldKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self {
            bytes: Zeroizing::new(bytes),
        }
    }

    /// Build a key from a slice, which must be exactly [`KEY_SIZE`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; KEY_SIZE] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength(bytes.len()))?;
        Ok(Self::from_bytes(arr))
    }

    /// Build a key from configured secret material.
    ///
    /// 64 hex characters are decoded verbatim; anything else is treated as a
    /// passphrase and hashed with SHA-256.
    pub fn from_secret(secret: &str) -> Self {
        let trimmed = secret.trim();
        if trimmed.len() == KEY_SIZE * 2 {
            if let Ok(decoded) = hex::decode(trimmed) {
                let decoded = Zeroizing::new(decoded);
                if let Ok(key) = Self::from_slice(&decoded) {
                    return key;
                }
            }
        }
        let digest = Sha256::digest(trimmed.as_bytes());
        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(&digest);
        Self::from_bytes(bytes)
    }

    /// Generate a random key from the OS RNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self::from_bytes(bytes)
    }

    /// Access the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for FieldKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldKey").field("bytes", &"[REDACTED]").finish()
    }
}
