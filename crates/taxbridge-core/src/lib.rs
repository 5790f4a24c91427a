#![deny(missing_docs)]

//! # taxbridge-core: Foundational Types for the TaxBridge Credential Registry
//!
//! Every other crate in the workspace depends on the types defined here.
//! It has no internal crate dependencies, only `serde`, `thiserror`, and
//! `uuid` from the external ecosystem.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** You cannot pass a [`CustomerId`]
//!    where a [`UserId`] is expected, and a [`CredentialNumber`] is never
//!    confused with the record key [`CredentialId`].
//!
//! 2. **Validate at construction.** [`Ruc`], [`CustomerNumber`] and
//!    [`CredentialNumber`] reject malformed input in their constructors, so
//!    downstream code never re-checks formats.
//!
//! 3. **One enum per closed vocabulary.** [`Role`], [`AccessType`],
//!    [`Permission`] and [`TaxpayerType`] are matched exhaustively wherever
//!    a decision depends on them.

pub mod access;
pub mod error;
pub mod identity;
pub mod taxpayer;

pub use access::{AccessType, Permission, Role};
pub use error::ValidationError;
pub use identity::{CredentialId, CredentialNumber, CustomerId, CustomerNumber, UserId};
pub use taxpayer::{Ruc, TaxpayerType};
