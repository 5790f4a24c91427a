//! # Customer and User Directories
//!
//! The registry resolves customers and accountants through these traits.
//! Customer onboarding and user management live elsewhere; the in-memory
//! implementation backs the service binary and the tests.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use taxbridge_core::{CustomerId, CustomerNumber, Role, UserId};

/// A customer owning credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub customer_number: CustomerNumber,
    pub full_name: String,
    pub email: Option<String>,
    pub active: bool,
}

/// A back-office user (admin or accountant) or a customer login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub display_name: String,
    pub role: Role,
    pub active: bool,
}

/// Customer lookups.
pub trait CustomerDirectory: Send + Sync {
    /// Find a customer by its customer number.
    fn find_customer_by_number(&self, number: &CustomerNumber) -> Option<Customer>;
    /// Find a customer by id.
    fn find_customer_by_id(&self, id: CustomerId) -> Option<Customer>;
}

/// User lookups.
pub trait UserDirectory: Send + Sync {
    /// Find a user by id.
    fn find_user_by_id(&self, id: UserId) -> Option<User>;
    /// All active users with the accountant role.
    fn list_accountants(&self) -> Vec<User>;

    /// Find a user by id, requiring the accountant role.
    fn find_accountant(&self, id: UserId) -> Option<User> {
        self.find_user_by_id(id).filter(|u| u.role == Role::Accountant)
    }
}

/// Thread-safe in-memory directory of customers and users.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    customers: Arc<RwLock<HashMap<CustomerId, Customer>>>,
    users: Arc<RwLock<HashMap<UserId, User>>>,
}

impl InMemoryDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a customer.
    pub fn add_customer(&self, customer: Customer) {
        self.customers.write().insert(customer.id, customer);
    }

    /// Register or replace a user.
    pub fn add_user(&self, user: User) {
        self.users.write().insert(user.id, user);
    }
}

impl CustomerDirectory for InMemoryDirectory {
    fn find_customer_by_number(&self, number: &CustomerNumber) -> Option<Customer> {
        self.customers
            .read()
            .values()
            .find(|c| &c.customer_number == number)
            .cloned()
    }

    fn find_customer_by_id(&self, id: CustomerId) -> Option<Customer> {
        self.customers.read().get(&id).cloned()
    }
}

impl UserDirectory for InMemoryDirectory {
    fn find_user_by_id(&self, id: UserId) -> Option<User> {
        self.users.read().get(&id).cloned()
    }

    fn list_accountants(&self) -> Vec<User> {
        let mut accountants: Vec<User> = self
            .users
            .read()
            .values()
            .filter(|u| u.role == Role::Accountant && u.active)
            .cloned()
            .collect();
        accountants.sort_by_key(|u| u.id);
        accountants
    }
}
