//! # Credential Registry
//!
//! The operation surface over the store: every call takes the caller's
//! [`RequestContext`], enforces authorization, and appends to the access
//! log where the operation touches a specific credential.
//!
//! Audit appends are best effort. A failed append is logged at `warn` and
//! never fails the operation it accompanies.
//!
//! Unknown ids are reported as `NotFound` before authorization is checked,
//! so callers can tell a missing credential from a denied one.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use taxbridge_core::{
    AccessType, CredentialId, CustomerNumber, Permission, Role, UserId, ValidationError,
};

use crate::access::{self, Visibility};
use crate::audit::{AccessLogEntry, AccessLogPage};
use crate::context::{Identity, RequestContext};
use crate::delegation::{DelegationChange, DelegationGrant};
use crate::directory::{Customer, CustomerDirectory, UserDirectory};
use crate::error::{VaultError, VaultResult};
use crate::graph::{self, AccessGraph, CredentialNeighborhood};
use crate::model::{
    Credential, CredentialDocument, CredentialPatch, CredentialStatus, NewCredential,
    SafeCredential,
};
use crate::store::{CredentialStore, InsertConflict};

/// Attempts at reserving a free credential number before giving up.
const NUMBER_ATTEMPTS: usize = 3;

/// Request to add or refresh a delegation.
#[derive(Debug, Clone)]
pub struct DelegationRequest {
    pub delegated_to: UserId,
    /// Defaults to `[view]` when absent.
    pub permissions: Option<Vec<Permission>>,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of a delegation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DelegationReceipt {
    pub credential_id: CredentialId,
    pub delegated_to: UserId,
    pub delegated_to_name: String,
    pub permissions: Vec<Permission>,
    pub expires_at: DateTime<Utc>,
    pub change: DelegationChange,
}

fn credential_not_found(id: &CredentialId) -> VaultError {
    VaultError::NotFound(format!("credential {id} not found"))
}

/// Credential registry facade.
#[derive(Clone)]
pub struct CredentialRegistry {
    store: CredentialStore,
    customers: Arc<dyn CustomerDirectory>,
    users: Arc<dyn UserDirectory>,
}

impl std::fmt::Debug for CredentialRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRegistry")
            .field("credentials", &self.store.len())
            .finish_non_exhaustive()
    }
}

impl CredentialRegistry {
    /// Wire a store to its directories.
    pub fn new(
        store: CredentialStore,
        customers: Arc<dyn CustomerDirectory>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            store,
            customers,
            users,
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    fn document(&self, id: &CredentialId) -> VaultResult<CredentialDocument> {
        self.store.document(id).ok_or_else(|| credential_not_found(id))
    }

    fn require_edit(&self, doc: &CredentialDocument, who: &Identity) -> VaultResult<()> {
        if access::has_access(Some(doc), who.id, who.role, AccessType::Edit) {
            return Ok(());
        }
        tracing::warn!(
            credential_id = %doc.id,
            user_id = %who.id,
            role = %who.role,
            "edit access denied"
        );
        Err(VaultError::Forbidden(
            "not allowed to modify this credential".into(),
        ))
    }

    fn require_view(&self, doc: &CredentialDocument, who: &Identity) -> VaultResult<()> {
        if access::can_view_at(doc, who, Utc::now()) {
            return Ok(());
        }
        tracing::warn!(
            credential_id = %doc.id,
            user_id = %who.id,
            role = %who.role,
            "view access denied"
        );
        Err(VaultError::Forbidden("not allowed to view this credential".into()))
    }

    fn resolve_customer(&self, identity: &Identity) -> Option<Customer> {
        identity
            .customer_number
            .as_ref()
            .and_then(|n| self.customers.find_customer_by_number(n))
    }

    /// Append an access log entry, logging instead of failing on error.
    fn audit(&self, id: &CredentialId, ctx: &RequestContext, access: AccessType) {
        let entry = AccessLogEntry::from_context(ctx, access, Utc::now());
        if let Err(e) = self.store.try_update(id, |doc| {
            doc.log_access(entry);
            Ok(())
        }) {
            tracing::warn!(credential_id = %id, access = %access, error = %e, "access log append failed");
        }
    }

    fn reread(&self, id: &CredentialId, fallback: Credential) -> SafeCredential {
        self.store
            .find_by_id(id)
            .unwrap_or(fallback)
            .to_safe_view()
    }

    // -- Creation -------------------------------------------------------------

    /// Create a credential for an existing customer.
    ///
    /// Admins and accountants may create for any customer; a customer only
    /// for their own customer number.
    pub fn create(&self, ctx: &RequestContext, input: NewCredential) -> VaultResult<Credential> {
        let who = &ctx.identity;
        if input.sri_username.trim().is_empty() {
            return Err(ValidationError::MissingField("sri_username").into());
        }
        if input.sri_password.is_empty() {
            return Err(ValidationError::MissingField("sri_password").into());
        }
        if who.role == Role::Customer && who.customer_number.as_ref() != Some(&input.customer_number) {
            tracing::warn!(user_id = %who.id, customer_number = %input.customer_number, "customer tried to create credential for another customer");
            return Err(VaultError::Forbidden(
                "customers may only register their own credentials".into(),
            ));
        }

        let customer = self
            .customers
            .find_customer_by_number(&input.customer_number)
            .ok_or_else(|| {
                VaultError::NotFound(format!("customer {} not found", input.customer_number))
            })?;

        if self
            .store
            .find_by_tax_id(&input.tax_id)
            .is_some_and(|c| c.status == CredentialStatus::Active)
        {
            return Err(InsertConflict::DuplicateTaxId(input.tax_id).into());
        }

        let accountant = match input.accountant_id {
            Some(id) => Some(self.users.find_accountant(id).ok_or_else(|| {
                VaultError::NotFound(format!("accountant {id} not found"))
            })?),
            None => None,
        };

        let cipher = self.store.cipher();
        let sri_username = cipher.encrypt(Some(input.sri_username.as_str()))?;
        let sri_password = cipher.encrypt(Some(input.sri_password.as_str()))?;
        let notes = cipher.encrypt(input.notes.as_deref())?;
        let legal_name = input
            .legal_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let mut conflict = None;
        for _ in 0..NUMBER_ATTEMPTS {
            let now = Utc::now();
            let mut doc = CredentialDocument {
                id: CredentialId::new(),
                credential_number: self.store.next_number(),
                customer_id: customer.id,
                customer_number: customer.customer_number.clone(),
                customer_name: customer.full_name.clone(),
                assigned_accountant: None,
                assigned_accountant_name: None,
                sri_username: sri_username.clone(),
                sri_password: sri_password.clone(),
                notes: notes.clone(),
                tax_id: input.tax_id.clone(),
                taxpayer_type: input.taxpayer_type,
                legal_name: legal_name.clone(),
                delegations: Vec::new(),
                access_log: Vec::new(),
                status: CredentialStatus::Active,
                expires_at: input.expires_at,
                last_accessed_at: None,
                last_accessed_by: None,
                graph_depth: 0,
                parent_nodes: Vec::new(),
                created_at: now,
                updated_at: now,
            };
            doc.place(&customer, accountant.as_ref());
            let id = doc.id;
            let number = doc.credential_number.clone();

            match self.store.insert(doc) {
                Ok(()) => {
                    tracing::info!(
                        credential_id = %id,
                        credential_number = %number,
                        customer_number = %customer.customer_number,
                        created_by = %who.id,
                        "credential created"
                    );
                    self.audit(&id, ctx, AccessType::Create);
                    return self.store.find_by_id(&id).ok_or_else(|| credential_not_found(&id));
                }
                Err(InsertConflict::DuplicateNumber(taken)) => {
                    tracing::warn!(credential_number = %taken, "credential number collision, retrying");
                    conflict = Some(InsertConflict::DuplicateNumber(taken));
                }
                Err(other) => return Err(other.into()),
            }
        }
        Err(conflict
            .map(VaultError::from)
            .unwrap_or_else(|| VaultError::Conflict("could not reserve a credential number".into())))
    }

    // -- Reads ----------------------------------------------------------------

    /// Whether `user` acting as `role` may perform `access` on credential `id`.
    /// Unknown credentials grant nothing.
    pub fn has_access(&self, id: &CredentialId, user: UserId, role: Role, access: AccessType) -> bool {
        access::has_access(self.store.document(id).as_ref(), user, role, access)
    }

    /// Credentials visible to `identity` in safe form: everything for an
    /// admin; assigned or delegated active credentials for an accountant;
    /// the customer's own active credentials for a customer.
    pub fn accessible_credentials(&self, identity: &Identity) -> Vec<SafeCredential> {
        let customer = match identity.role {
            Role::Customer => self.resolve_customer(identity).map(|c| c.id),
            Role::Admin | Role::Accountant => None,
        };
        let visibility = Visibility::for_identity(identity, customer);
        let now = Utc::now();
        self.store
            .find_where(|d| visibility.admits(d, now))
            .iter()
            .map(Credential::to_safe_view)
            .collect()
    }

    /// Role-filtered listing, optionally narrowed to one status.
    pub fn list(
        &self,
        ctx: &RequestContext,
        status: Option<CredentialStatus>,
    ) -> Vec<SafeCredential> {
        let mut items = self.accessible_credentials(&ctx.identity);
        if let Some(status) = status {
            items.retain(|c| c.status == status);
        }
        items
    }

    /// Single credential detail. Audited as `view`.
    pub fn get(&self, ctx: &RequestContext, id: &CredentialId) -> VaultResult<SafeCredential> {
        let doc = self.document(id)?;
        self.require_view(&doc, &ctx.identity)?;
        self.audit(id, ctx, AccessType::View);
        Ok(self.reread(id, doc.open(self.store.cipher())))
    }

    /// Credentials of one customer that the caller may view. Each returned
    /// credential is audited as `view`.
    ///
    /// `NotFound` is decided before visibility: a customer number with no
    /// credentials is 404 for every caller, one whose credentials are all
    /// hidden is 403. Callers can therefore learn whether a customer has
    /// credentials, matching the 404-before-403 rule of the single-record
    /// reads.
    pub fn find_by_customer_number(
        &self,
        ctx: &RequestContext,
        number: &CustomerNumber,
    ) -> VaultResult<Vec<SafeCredential>> {
        let found = self.store.find_by_customer_number(number);
        if found.is_empty() {
            return Err(VaultError::NotFound(format!(
                "no credential found for customer {number}"
            )));
        }
        let now = Utc::now();
        let total = found.len();
        let visible: Vec<Credential> = found
            .into_iter()
            .filter(|c| access::can_view_at(c, &ctx.identity, now))
            .collect();
        if visible.is_empty() {
            tracing::warn!(user_id = %ctx.identity.id, customer_number = %number, total, "customer credentials denied");
            return Err(VaultError::Forbidden(
                "not allowed to view this customer's credentials".into(),
            ));
        }
        Ok(visible
            .into_iter()
            .map(|c| {
                let id = c.id;
                self.audit(&id, ctx, AccessType::View);
                self.reread(&id, c)
            })
            .collect())
    }

    /// Active credentials assigned to an accountant. Admins may list any
    /// accountant; an accountant only themself.
    pub fn list_by_accountant(
        &self,
        ctx: &RequestContext,
        accountant: UserId,
    ) -> VaultResult<Vec<SafeCredential>> {
        let who = &ctx.identity;
        let allowed = match who.role {
            Role::Admin => true,
            Role::Accountant => who.id == accountant,
            Role::Customer => false,
        };
        if !allowed {
            return Err(VaultError::Forbidden(
                "not allowed to list another accountant's credentials".into(),
            ));
        }
        Ok(self
            .store
            .find_where(|d| d.assigned_accountant == Some(accountant) && d.is_active())
            .iter()
            .map(Credential::to_safe_view)
            .collect())
    }

    // -- Mutation -------------------------------------------------------------

    /// Apply a partial update. Requires `edit` access. Audited as `edit`.
    pub fn update(
        &self,
        ctx: &RequestContext,
        id: &CredentialId,
        patch: CredentialPatch,
    ) -> VaultResult<SafeCredential> {
        let who = ctx.identity.clone();
        let doc = self.document(id)?;
        self.require_edit(&doc, &who)?;

        let accountant = match patch.assigned_accountant {
            Some(acc) => Some(self.users.find_accountant(acc).ok_or_else(|| {
                VaultError::NotFound(format!("accountant {acc} not found"))
            })?),
            None => None,
        };

        let cipher = self.store.cipher();
        let seal_required = |field: &'static str, value: Option<String>| -> VaultResult<_> {
            match value {
                Some(v) if v.trim().is_empty() => Err(ValidationError::MissingField(field).into()),
                Some(v) => Ok(Some(cipher.seal(&v)?)),
                None => Ok(None),
            }
        };
        let sri_username = seal_required("sri_username", patch.sri_username)?;
        let sri_password = seal_required("sri_password", patch.sri_password)?;
        let notes = match patch.notes {
            Some(n) => Some(cipher.encrypt(Some(n.as_str()))?),
            None => None,
        };
        let legal_name = patch
            .legal_name
            .map(|n| Some(n.trim().to_string()).filter(|n| !n.is_empty()));

        let ((), updated) = self.store.try_update(id, |doc| {
            self.require_edit(doc, &who)?;
            if let Some(u) = sri_username {
                doc.sri_username = Some(u);
            }
            if let Some(p) = sri_password {
                doc.sri_password = Some(p);
            }
            if let Some(t) = patch.taxpayer_type {
                doc.taxpayer_type = t;
            }
            if let Some(n) = legal_name {
                doc.legal_name = n;
            }
            if let Some(n) = notes {
                doc.notes = n;
            }
            if let Some(e) = patch.expires_at {
                doc.expires_at = Some(e);
            }
            if let Some(s) = patch.status {
                doc.status = s;
            }
            if let Some(acc) = &accountant {
                doc.assign_accountant(acc);
            }
            Ok(())
        })?;

        tracing::info!(credential_id = %id, updated_by = %who.id, "credential updated");
        self.audit(id, ctx, AccessType::Edit);
        Ok(self.reread(id, updated))
    }

    /// Hard-delete a credential. Admin only.
    pub fn delete(&self, ctx: &RequestContext, id: &CredentialId) -> VaultResult<()> {
        if !ctx.identity.is_admin() {
            tracing::warn!(user_id = %ctx.identity.id, credential_id = %id, "non-admin delete refused");
            return Err(VaultError::Forbidden(
                "only administrators may delete credentials".into(),
            ));
        }
        let removed = self.store.remove(id).ok_or_else(|| credential_not_found(id))?;
        tracing::info!(
            credential_id = %id,
            credential_number = %removed.credential_number,
            deleted_by = %ctx.identity.id,
            "credential deleted"
        );
        Ok(())
    }

    // -- Delegations ----------------------------------------------------------

    /// Grant or refresh a delegation. Requires `edit` access.
    pub fn add_delegation(
        &self,
        ctx: &RequestContext,
        id: &CredentialId,
        request: DelegationRequest,
    ) -> VaultResult<DelegationReceipt> {
        let who = ctx.identity.clone();
        let doc = self.document(id)?;
        self.require_edit(&doc, &who)?;

        let delegatee = self
            .users
            .find_user_by_id(request.delegated_to)
            .ok_or_else(|| VaultError::NotFound(format!("user {} not found", request.delegated_to)))?;

        let now = Utc::now();
        let grant = DelegationGrant::new(
            (delegatee.id, delegatee.display_name.clone()),
            (who.id, who.display_name.clone()),
            request.permissions.unwrap_or_else(|| vec![Permission::View]),
            request.expires_at,
            now,
        )?;
        let permissions = grant.permissions.clone();
        let expires_at = grant.expires_at;

        let (change, _) = self.store.try_update(id, |doc| {
            self.require_edit(doc, &who)?;
            Ok(doc.add_delegation(grant, now))
        })?;

        tracing::info!(
            credential_id = %id,
            delegated_to = %delegatee.id,
            delegated_by = %who.id,
            change = ?change,
            "delegation recorded"
        );
        self.audit(id, ctx, AccessType::Edit);

        Ok(DelegationReceipt {
            credential_id: *id,
            delegated_to: delegatee.id,
            delegated_to_name: delegatee.display_name,
            permissions,
            expires_at,
            change,
        })
    }

    /// Revoke the active delegation held by `delegated_to`. Requires `edit`
    /// access. A missing active delegation is `NotFound` and changes nothing.
    pub fn revoke_delegation(
        &self,
        ctx: &RequestContext,
        id: &CredentialId,
        delegated_to: UserId,
    ) -> VaultResult<()> {
        let who = ctx.identity.clone();
        let doc = self.document(id)?;
        self.require_edit(&doc, &who)?;

        self.store.try_update(id, |doc| {
            self.require_edit(doc, &who)?;
            if doc.revoke_delegation(delegated_to) {
                Ok(())
            } else {
                Err(VaultError::NotFound(format!(
                    "no active delegation for user {delegated_to}"
                )))
            }
        })?;

        tracing::info!(credential_id = %id, delegated_to = %delegated_to, revoked_by = %who.id, "delegation revoked");
        self.audit(id, ctx, AccessType::Edit);
        Ok(())
    }

    // -- Audit ----------------------------------------------------------------

    /// The last 50 access log entries, newest first. Admins, or accountants
    /// with `view` access.
    pub fn access_logs(&self, ctx: &RequestContext, id: &CredentialId) -> VaultResult<AccessLogPage> {
        let who = &ctx.identity;
        let doc = self.document(id)?;
        let allowed = match who.role {
            Role::Admin => true,
            Role::Accountant => access::has_access(Some(&doc), who.id, who.role, AccessType::View),
            Role::Customer => false,
        };
        if !allowed {
            tracing::warn!(credential_id = %id, user_id = %who.id, "access log read denied");
            return Err(VaultError::Forbidden(
                "not allowed to read this credential's access log".into(),
            ));
        }
        Ok(doc.access_log_page())
    }

    // -- Graph ----------------------------------------------------------------

    /// The hierarchy as seen by the caller.
    pub fn full_graph(&self, ctx: &RequestContext) -> AccessGraph {
        let identity = &ctx.identity;
        let (accountants, customer) = match identity.role {
            Role::Admin => (self.users.list_accountants(), None),
            Role::Accountant => (Vec::new(), None),
            Role::Customer => (Vec::new(), self.resolve_customer(identity)),
        };
        graph::export_full_graph(
            identity,
            &self.store.documents(),
            &accountants,
            customer.as_ref(),
            Utc::now(),
        )
    }

    /// One credential with its owner, manager and effective delegations.
    /// Requires view visibility; audited as `view` after the export.
    pub fn neighborhood(
        &self,
        ctx: &RequestContext,
        id: &CredentialId,
    ) -> VaultResult<CredentialNeighborhood> {
        let doc = self.document(id)?;
        self.require_view(&doc, &ctx.identity)?;
        let owner = self.customers.find_customer_by_id(doc.customer_id);
        let view = graph::export_neighborhood(&doc, owner.as_ref(), Utc::now());
        self.audit(id, ctx, AccessType::View);
        Ok(view)
    }
}
