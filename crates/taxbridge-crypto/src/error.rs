//! # Cryptographic Error Types
//!
//! Structured errors for sealing and opening credential fields.

use thiserror::Error;

/// Errors from field encryption and decryption.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// The token is not `<nonce-hex>:<ciphertext-hex>`.
    #[error("malformed sealed field: {0}")]
    MalformedToken(&'static str),

    /// Hex decoding of one token half failed.
    #[error("hex decode error: {0}")]
    HexDecode(String),

    /// The decoded nonce has the wrong length.
    #[error("invalid nonce length: expected 12 bytes, got {0}")]
    InvalidNonceLength(usize),

    /// Key material has the wrong length.
    #[error("invalid key length: expected 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    /// AEAD encryption failed.
    #[error("encryption failed")]
    EncryptionFailed,

    /// AEAD authentication failed (wrong key or tampered ciphertext).
    #[error("decryption failed: authentication tag mismatch")]
    DecryptionFailed,

    /// Decrypted bytes are not valid UTF-8.
    #[error("decrypted field is not valid UTF-8")]
    InvalidUtf8,
}
