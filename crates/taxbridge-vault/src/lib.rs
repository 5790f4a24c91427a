//! # taxbridge-vault: Credential Access-Control Graph
//!
//! The domain layer of the TaxBridge registry. It stores SRI portal
//! credentials with their sensitive fields sealed, and decides who may read
//! or change them.
//!
//! ## Hierarchy
//!
//! ```text
//! admin ──manages──▶ accountant ──assigned_to──▶ customer ──owns──▶ credential
//!                                                                      │
//!                                           delegated_to (time-bound) ◀┘
//! ```
//!
//! Access is computed by walking this structure on every request; see
//! [`access`]. The [`registry::CredentialRegistry`] is the operation
//! surface the HTTP layer calls into.
//!
//! ## Modules
//!
//! - [`model`]: the stored aggregate and its plaintext projections.
//! - [`store`]: in-memory record store with uniqueness and atomic numbering.
//! - [`access`]: authorization traversal and role-filtered visibility.
//! - [`delegation`]: the per-credential delegation ledger.
//! - [`audit`]: the capped access log.
//! - [`graph`]: full-graph and neighborhood export.
//! - [`directory`]: customer and user lookups.

pub mod access;
pub mod audit;
pub mod context;
pub mod delegation;
pub mod directory;
pub mod error;
pub mod graph;
pub mod model;
pub mod registry;
pub mod store;

pub use access::{has_access, AccessSubject, Visibility};
pub use audit::{AccessLogEntry, AccessLogPage, ACCESS_LOG_CAPACITY, ACCESS_LOG_PAGE_SIZE};
pub use context::{Identity, RequestContext};
pub use delegation::{Delegation, DelegationChange, DelegationGrant};
pub use directory::{Customer, CustomerDirectory, InMemoryDirectory, User, UserDirectory};
pub use error::{VaultError, VaultResult};
pub use graph::{AccessGraph, CredentialNeighborhood};
pub use model::{
    Credential, CredentialDocument, CredentialPatch, CredentialStatus, NewCredential, ParentNode,
    SafeCredential,
};
pub use registry::{CredentialRegistry, DelegationReceipt, DelegationRequest};
pub use store::{CredentialStore, InsertConflict};
