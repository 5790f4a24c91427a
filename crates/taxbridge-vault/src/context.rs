//! # Request Context
//!
//! The authenticated caller as handed to the registry by the transport
//! layer. Token verification happens upstream; everything here is already
//! trusted.

use serde::{Deserialize, Serialize};
use taxbridge_core::{CustomerNumber, Role, UserId};

/// An authenticated principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Principal identifier.
    pub id: UserId,
    /// Name recorded in audit entries and delegations.
    pub display_name: String,
    /// Role the authorization rules dispatch on.
    pub role: Role,
    /// Customer-number claim; only meaningful for [`Role::Customer`].
    pub customer_number: Option<CustomerNumber>,
}

impl Identity {
    /// An administrator identity.
    pub fn admin(id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            role: Role::Admin,
            customer_number: None,
        }
    }

    /// An accountant identity.
    pub fn accountant(id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            role: Role::Accountant,
            customer_number: None,
        }
    }

    /// A customer identity carrying its customer-number claim.
    pub fn customer(
        id: UserId,
        display_name: impl Into<String>,
        customer_number: CustomerNumber,
    ) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            role: Role::Customer,
            customer_number: Some(customer_number),
        }
    }

    /// Whether this identity is an administrator.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Per-request caller information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// The authenticated caller.
    pub identity: Identity,
    /// Client address, when known.
    pub ip_address: Option<String>,
    /// Client user agent, when known.
    pub user_agent: Option<String>,
}

impl RequestContext {
    /// Context with no network metadata.
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            ip_address: None,
            user_agent: None,
        }
    }

    /// Attach network metadata.
    pub fn with_client(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }
}
