//! # Authorization Traversal
//!
//! Decides whether an identity may perform an access type on a credential,
//! and which credentials a role may list. Every decision is derived afresh
//! from the record's assignment and delegation ledger; nothing is cached.
//!
//! ## Decision rules
//!
//! 1. Admins may do anything.
//! 2. An accountant may do anything on credentials assigned to them.
//! 3. Anyone holding an active, unexpired delegation whose permissions
//!    cover the access type may perform it.
//! 4. Nobody else.
//!
//! A missing credential grants nothing.

use chrono::{DateTime, Utc};
use taxbridge_core::{AccessType, CustomerId, Role, UserId};

use crate::context::Identity;
use crate::delegation::Delegation;
use crate::model::{Credential, CredentialDocument, CredentialStatus};

/// The fields of a credential the access rules read.
pub trait AccessSubject {
    /// Owning customer.
    fn customer_id(&self) -> CustomerId;
    /// Owning customer's number.
    fn customer_number(&self) -> &str;
    /// Assigned accountant, if any.
    fn assigned_accountant(&self) -> Option<UserId>;
    /// Delegation ledger.
    fn delegations(&self) -> &[Delegation];
    /// Lifecycle status.
    fn status(&self) -> CredentialStatus;
}

impl AccessSubject for CredentialDocument {
    fn customer_id(&self) -> CustomerId {
        self.customer_id
    }
    fn customer_number(&self) -> &str {
        self.customer_number.as_str()
    }
    fn assigned_accountant(&self) -> Option<UserId> {
        self.assigned_accountant
    }
    fn delegations(&self) -> &[Delegation] {
        &self.delegations
    }
    fn status(&self) -> CredentialStatus {
        self.status
    }
}

impl AccessSubject for Credential {
    fn customer_id(&self) -> CustomerId {
        self.customer_id
    }
    fn customer_number(&self) -> &str {
        self.customer_number.as_str()
    }
    fn assigned_accountant(&self) -> Option<UserId> {
        self.assigned_accountant
    }
    fn delegations(&self) -> &[Delegation] {
        &self.delegations
    }
    fn status(&self) -> CredentialStatus {
        self.status
    }
}

/// Apply the decision rules at the current instant.
pub fn has_access<S: AccessSubject + ?Sized>(
    subject: Option<&S>,
    user: UserId,
    role: Role,
    access: AccessType,
) -> bool {
    has_access_at(subject, user, role, access, Utc::now())
}

/// Apply the decision rules at `now`.
pub fn has_access_at<S: AccessSubject + ?Sized>(
    subject: Option<&S>,
    user: UserId,
    role: Role,
    access: AccessType,
    now: DateTime<Utc>,
) -> bool {
    let Some(credential) = subject else {
        return false;
    };
    match role {
        Role::Admin => true,
        Role::Accountant if credential.assigned_accountant() == Some(user) => true,
        Role::Accountant | Role::Customer => credential
            .delegations()
            .iter()
            .any(|d| d.grants(user, access, now)),
    }
}

/// Whether `identity` may read `subject`: the decision rules for `view`,
/// plus a customer reading their own credential.
pub fn can_view_at<S: AccessSubject + ?Sized>(
    subject: &S,
    identity: &Identity,
    now: DateTime<Utc>,
) -> bool {
    if has_access_at(Some(subject), identity.id, identity.role, AccessType::View, now) {
        return true;
    }
    identity.role == Role::Customer
        && identity
            .customer_number
            .as_ref()
            .is_some_and(|n| n.as_str() == subject.customer_number())
}

/// The listing filter for one role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Every credential, any status.
    All,
    /// Active credentials assigned to the accountant or delegated to them.
    Accountant(UserId),
    /// Active credentials owned by the customer.
    Customer(CustomerId),
    /// Nothing. A customer identity with no matching customer record.
    Nothing,
}

impl Visibility {
    /// The filter for `identity`, given its resolved customer record.
    pub fn for_identity(identity: &Identity, customer: Option<CustomerId>) -> Self {
        match identity.role {
            Role::Admin => Self::All,
            Role::Accountant => Self::Accountant(identity.id),
            Role::Customer => customer.map_or(Self::Nothing, Self::Customer),
        }
    }

    /// Whether `subject` passes this filter at `now`.
    pub fn admits<S: AccessSubject + ?Sized>(&self, subject: &S, now: DateTime<Utc>) -> bool {
        let active = subject.status() == CredentialStatus::Active;
        match *self {
            Self::All => true,
            Self::Accountant(user) => {
                active
                    && (subject.assigned_accountant() == Some(user)
                        || subject
                            .delegations()
                            .iter()
                            .any(|d| d.delegated_to == user && d.is_effective(now)))
            }
            Self::Customer(customer) => active && subject.customer_id() == customer,
            Self::Nothing => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delegation::DelegationGrant;
    use crate::model::fixtures::*;
    use chrono::Duration;
    use taxbridge_core::{CustomerNumber, Permission};

    struct Scenario {
        credential: CredentialDocument,
        admin: UserId,
        a1: UserId,
        d: UserId,
        other: UserId,
    }

    /// Credential C assigned to A1, with a `{view}` delegation to D expiring tomorrow.
    fn scenario() -> Scenario {
        let a1 = accountant("A1");
        let d = UserId::new();
        let now = Utc::now();
        let mut credential = document(
            &cipher(),
            1,
            "1790012345001",
            &customer("TB-000001"),
            Some(&a1),
        );
        credential.add_delegation(
            DelegationGrant::new(
                (d, "D".into()),
                (a1.id, "A1".into()),
                vec![Permission::View],
                now + Duration::days(1),
                now,
            )
            .unwrap(),
            now,
        );
        Scenario {
            credential,
            admin: UserId::new(),
            a1: a1.id,
            d,
            other: UserId::new(),
        }
    }

    #[test]
    fn decision_table() {
        let s = scenario();
        let c = Some(&s.credential);
        assert!(has_access(c, s.admin, Role::Admin, AccessType::Edit));
        assert!(has_access(c, s.a1, Role::Accountant, AccessType::Edit));
        assert!(has_access(c, s.d, Role::Accountant, AccessType::View));
        assert!(!has_access(c, s.d, Role::Accountant, AccessType::Edit));
        assert!(!has_access(c, s.other, Role::Accountant, AccessType::View));
    }

    #[test]
    fn missing_credential_grants_nothing() {
        let none: Option<&CredentialDocument> = None;
        assert!(!has_access(none, UserId::new(), Role::Admin, AccessType::View));
    }

    #[test]
    fn assigned_accountant_has_every_access_type() {
        let s = scenario();
        for access in [AccessType::View, AccessType::Edit, AccessType::Export] {
            assert!(has_access(Some(&s.credential), s.a1, Role::Accountant, access));
        }
    }

    #[test]
    fn assignment_only_counts_for_accountant_role() {
        let s = scenario();
        assert!(!has_access(Some(&s.credential), s.a1, Role::Customer, AccessType::View));
    }

    #[test]
    fn expired_delegation_is_ignored_although_flag_is_active() {
        let s = scenario();
        let later = Utc::now() + Duration::days(2);
        assert!(s.credential.delegations[0].is_active);
        assert!(!has_access_at(Some(&s.credential), s.d, Role::Accountant, AccessType::View, later));
    }

    #[test]
    fn revoked_delegation_no_longer_grants() {
        let mut s = scenario();
        assert!(s.credential.revoke_delegation(s.d));
        assert!(!has_access(Some(&s.credential), s.d, Role::Accountant, AccessType::View));
    }

    #[test]
    fn customer_can_view_own_credential_only() {
        let s = scenario();
        let now = Utc::now();
        let owner = Identity::customer(UserId::new(), "Owner", CustomerNumber::new("TB-000001").unwrap());
        let stranger = Identity::customer(UserId::new(), "Other", CustomerNumber::new("TB-000002").unwrap());
        assert!(can_view_at(&s.credential, &owner, now));
        assert!(!can_view_at(&s.credential, &stranger, now));
    }

    #[test]
    fn visibility_per_role() {
        let s = scenario();
        let now = Utc::now();
        let c = &s.credential;

        assert!(Visibility::All.admits(c, now));
        assert!(Visibility::Accountant(s.a1).admits(c, now));
        assert!(Visibility::Accountant(s.d).admits(c, now), "delegated");
        assert!(!Visibility::Accountant(s.other).admits(c, now));
        assert!(!Visibility::Accountant(s.d).admits(c, now + Duration::days(2)), "expired");
        assert!(Visibility::Customer(c.customer_id).admits(c, now));
        assert!(!Visibility::Customer(CustomerId::new()).admits(c, now));
        assert!(!Visibility::Nothing.admits(c, now));
    }

    #[test]
    fn non_admin_visibility_excludes_inactive() {
        let mut s = scenario();
        s.credential.status = CredentialStatus::Revoked;
        let now = Utc::now();
        assert!(Visibility::All.admits(&s.credential, now));
        assert!(!Visibility::Accountant(s.a1).admits(&s.credential, now));
        assert!(!Visibility::Customer(s.credential.customer_id).admits(&s.credential, now));
    }

    #[test]
    fn visibility_for_customer_without_record_is_nothing() {
        let identity = Identity::customer(UserId::new(), "C", CustomerNumber::new("TB-1").unwrap());
        assert_eq!(Visibility::for_identity(&identity, None), Visibility::Nothing);
    }
}
