//! # taxbridge-crypto: Field-Level Encryption
//!
//! Seals the sensitive string fields of a credential record before they
//! reach storage and opens them again on read.
//!
//! ## Token Format
//!
//! A sealed field is `hex(nonce) ":" hex(ciphertext || tag)` under
//! AES-256-GCM with a fresh 96-bit nonce from the OS RNG on every call, so
//! sealing the same plaintext twice never yields the same token.
//!
//! ## Failure Model
//!
//! [`FieldCipher::decrypt`] fails soft: a token that does not open under the
//! current key yields `None` and a `tracing` warning, so one corrupt record
//! cannot break a listing. [`FieldCipher::try_decrypt`] exposes the
//! underlying [`CryptoError`].

pub mod cipher;
pub mod error;
pub mod key;

pub use cipher::{FieldCipher, SealedField, NONCE_SIZE};
pub use error::CryptoError;
pub use key::{FieldKey, KEY_SIZE};
