//! # Credential Record Store
//!
//! Thread-safe, cloneable in-memory store of [`CredentialDocument`]s.
//!
//! All operations are synchronous: the `RwLock` is `parking_lot` and is
//! never held across an `.await`. Reads decrypt through the store's
//! [`FieldCipher`]; [`CredentialStore::document`] returns the sealed form
//! for persistence.
//!
//! ## Uniqueness
//!
//! Credential numbers come from an atomic sequence seeded from the highest
//! number seen at [`CredentialStore::load`]. [`CredentialStore::insert`]
//! re-checks credential-number and active-RUC uniqueness under the write
//! lock, so two concurrent creations cannot both succeed with the same
//! number or the same RUC.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use taxbridge_core::{CredentialId, CredentialNumber, CustomerNumber, Ruc, UserId};
use taxbridge_crypto::FieldCipher;

use crate::error::{VaultError, VaultResult};
use crate::model::{Credential, CredentialDocument};

/// Why an insert was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertConflict {
    /// Another active credential holds this RUC.
    DuplicateTaxId(Ruc),
    /// Another credential holds this number.
    DuplicateNumber(CredentialNumber),
    /// The record key is already taken.
    DuplicateId(CredentialId),
}

impl From<InsertConflict> for VaultError {
    fn from(conflict: InsertConflict) -> Self {
        match conflict {
            InsertConflict::DuplicateTaxId(ruc) => {
                VaultError::Conflict(format!("an active credential already exists for RUC {ruc}"))
            }
            InsertConflict::DuplicateNumber(number) => {
                VaultError::Conflict(format!("credential number {number} is already taken"))
            }
            InsertConflict::DuplicateId(id) => {
                VaultError::Conflict(format!("credential {id} already exists"))
            }
        }
    }
}

/// In-memory credential store.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    docs: Arc<RwLock<HashMap<CredentialId, CredentialDocument>>>,
    sequence: Arc<AtomicU64>,
    cipher: FieldCipher,
}

impl CredentialStore {
    /// Create an empty store sealing fields with `cipher`.
    pub fn new(cipher: FieldCipher) -> Self {
        Self {
            docs: Arc::new(RwLock::new(HashMap::new())),
            sequence: Arc::new(AtomicU64::new(0)),
            cipher,
        }
    }

    /// The field codec.
    pub fn cipher(&self) -> &FieldCipher {
        &self.cipher
    }

    /// Reserve the next credential number.
    pub fn next_number(&self) -> CredentialNumber {
        CredentialNumber::from_sequence(self.sequence.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Bulk-load documents (startup hydration). Existing entries with the
    /// same id are replaced. The number sequence is advanced past the
    /// highest loaded number.
    pub fn load(&self, documents: impl IntoIterator<Item = CredentialDocument>) -> usize {
        let mut guard = self.docs.write();
        let mut count = 0;
        for doc in documents {
            if let Some(seq) = doc.credential_number.sequence() {
                self.sequence.fetch_max(seq, Ordering::SeqCst);
            }
            guard.insert(doc.id, doc);
            count += 1;
        }
        count
    }

    /// Insert a new document, enforcing uniqueness under one write lock.
    pub fn insert(&self, doc: CredentialDocument) -> Result<(), InsertConflict> {
        let mut guard = self.docs.write();
        if guard.contains_key(&doc.id) {
            return Err(InsertConflict::DuplicateId(doc.id));
        }
        if doc.is_active()
            && guard
                .values()
                .any(|d| d.is_active() && d.tax_id == doc.tax_id)
        {
            return Err(InsertConflict::DuplicateTaxId(doc.tax_id));
        }
        if guard
            .values()
            .any(|d| d.credential_number == doc.credential_number)
        {
            return Err(InsertConflict::DuplicateNumber(doc.credential_number));
        }
        guard.insert(doc.id, doc);
        Ok(())
    }

    /// The sealed document, for persistence.
    pub fn document(&self, id: &CredentialId) -> Option<CredentialDocument> {
        self.docs.read().get(id).cloned()
    }

    /// All sealed documents ordered by credential number.
    pub fn documents(&self) -> Vec<CredentialDocument> {
        let mut docs: Vec<_> = self.docs.read().values().cloned().collect();
        docs.sort_by(|a, b| a.credential_number.cmp(&b.credential_number));
        docs
    }

    fn open_where(&self, pred: impl Fn(&CredentialDocument) -> bool) -> Vec<Credential> {
        let mut found: Vec<Credential> = self
            .docs
            .read()
            .values()
            .filter(|d| pred(d))
            .map(|d| d.open(&self.cipher))
            .collect();
        found.sort_by(|a, b| a.credential_number.cmp(&b.credential_number));
        found
    }

    /// Find a credential by record key.
    pub fn find_by_id(&self, id: &CredentialId) -> Option<Credential> {
        self.docs.read().get(id).map(|d| d.open(&self.cipher))
    }

    /// Find the credential for a RUC, preferring the active one.
    pub fn find_by_tax_id(&self, tax_id: &Ruc) -> Option<Credential> {
        let guard = self.docs.read();
        let mut matching = guard.values().filter(|d| &d.tax_id == tax_id);
        let first = matching.next()?;
        let chosen = if first.is_active() {
            first
        } else {
            matching.find(|d| d.is_active()).unwrap_or(first)
        };
        Some(chosen.open(&self.cipher))
    }

    /// Credentials owned by the customer with this number.
    pub fn find_by_customer_number(&self, number: &CustomerNumber) -> Vec<Credential> {
        self.open_where(|d| &d.customer_number == number)
    }

    /// Credentials assigned to an accountant.
    pub fn find_by_accountant(&self, accountant: UserId) -> Vec<Credential> {
        self.open_where(|d| d.assigned_accountant == Some(accountant))
    }

    /// Every credential.
    pub fn find_all(&self) -> Vec<Credential> {
        self.open_where(|_| true)
    }

    /// Credentials matching an arbitrary predicate over the sealed form.
    pub fn find_where(&self, pred: impl Fn(&CredentialDocument) -> bool) -> Vec<Credential> {
        self.open_where(pred)
    }

    /// Atomically read-validate-update a document.
    ///
    /// The closure works on a copy. If it returns `Ok` and the result still
    /// satisfies the one-active-per-RUC rule, the copy replaces the stored
    /// document with a fresh `updated_at`; otherwise the stored document is
    /// left untouched. The entire operation runs under a single write lock.
    pub fn try_update<R>(
        &self,
        id: &CredentialId,
        f: impl FnOnce(&mut CredentialDocument) -> VaultResult<R>,
    ) -> VaultResult<(R, Credential)> {
        let mut guard = self.docs.write();
        let current = guard
            .get(id)
            .ok_or_else(|| VaultError::NotFound(format!("credential {id} not found")))?;
        let mut next = current.clone();
        let out = f(&mut next)?;

        if next.is_active()
            && guard
                .values()
                .any(|d| d.id != next.id && d.is_active() && d.tax_id == next.tax_id)
        {
            return Err(InsertConflict::DuplicateTaxId(next.tax_id).into());
        }

        next.updated_at = Utc::now();
        let opened = next.open(&self.cipher);
        guard.insert(*id, next);
        Ok((out, opened))
    }

    /// Hard-delete a document.
    pub fn remove(&self, id: &CredentialId) -> Option<CredentialDocument> {
        self.docs.write().remove(id)
    }

    /// Put back a snapshot taken before a mutation. `None` means the
    /// credential did not exist and is removed again.
    pub fn restore(&self, id: &CredentialId, snapshot: Option<CredentialDocument>) {
        let mut guard = self.docs.write();
        match snapshot {
            Some(doc) => {
                guard.insert(*id, doc);
            }
            None => {
                guard.remove(id);
            }
        }
    }

    /// Number of stored credentials.
    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::*;
    use crate::model::CredentialStatus;
    use std::collections::HashSet;

    fn store() -> CredentialStore {
        CredentialStore::new(cipher())
    }

    #[test]
    fn numbers_are_sequential() {
        let store = store();
        assert_eq!(store.next_number().as_str(), "SRI-000001");
        assert_eq!(store.next_number().as_str(), "SRI-000002");
    }

    #[test]
    fn restore_undoes_insert_and_removal() {
        let store = store();
        let owner = customer("TB-000001");
        let doc = document(&cipher(), 1, "1790012345001", &owner, None);
        let id = doc.id;

        store.insert(doc.clone()).unwrap();
        store.restore(&id, None);
        assert!(store.document(&id).is_none());

        store.insert(doc.clone()).unwrap();
        let before = store.document(&id);
        store.remove(&id);
        store.restore(&id, before);
        assert_eq!(store.document(&id), Some(doc));
    }

    #[test]
    fn load_seeds_sequence_from_highest_number() {
        let store = store();
        let owner = customer("TB-000001");
        let c = cipher();
        store.load(vec![
            document(&c, 4, "1790012345001", &owner, None),
            document(&c, 17, "1790012345002", &owner, None),
        ]);
        assert_eq!(store.len(), 2);
        assert_eq!(store.next_number().as_str(), "SRI-000018");
    }

    #[test]
    fn duplicate_active_ruc_is_rejected() {
        let store = store();
        let owner = customer("TB-000001");
        let c = cipher();
        store.insert(document(&c, 1, "1790012345001", &owner, None)).unwrap();
        let err = store
            .insert(document(&c, 2, "1790012345001", &owner, None))
            .unwrap_err();
        assert!(matches!(err, InsertConflict::DuplicateTaxId(_)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn inactive_ruc_does_not_block_new_active() {
        let store = store();
        let owner = customer("TB-000001");
        let c = cipher();
        let mut old = document(&c, 1, "1790012345001", &owner, None);
        old.status = CredentialStatus::Revoked;
        store.insert(old).unwrap();
        store.insert(document(&c, 2, "1790012345001", &owner, None)).unwrap();
        let found = store.find_by_tax_id(&Ruc::new("1790012345001").unwrap()).unwrap();
        assert_eq!(found.status, CredentialStatus::Active);
    }

    #[test]
    fn duplicate_number_is_rejected() {
        let store = store();
        let owner = customer("TB-000001");
        let c = cipher();
        store.insert(document(&c, 1, "1790012345001", &owner, None)).unwrap();
        let err = store
            .insert(document(&c, 1, "1790012345002", &owner, None))
            .unwrap_err();
        assert!(matches!(err, InsertConflict::DuplicateNumber(_)));
    }

    #[test]
    fn reads_decrypt_and_document_stays_sealed() {
        let store = store();
        let owner = customer("TB-000001");
        let doc = document(&cipher(), 1, "1790012345001", &owner, None);
        let id = doc.id;
        store.insert(doc).unwrap();

        let cred = store.find_by_id(&id).unwrap();
        assert_eq!(cred.sri_password.as_deref(), Some("portal-pass"));
        let sealed = store.document(&id).unwrap();
        assert!(!sealed.sri_password.unwrap().as_str().contains("portal-pass"));
    }

    #[test]
    fn lookups_by_customer_and_accountant() {
        let store = store();
        let c = cipher();
        let first = customer("TB-000001");
        let second = customer("TB-000002");
        let acc = accountant("Ana");
        store.insert(document(&c, 1, "1790012345001", &first, Some(&acc))).unwrap();
        store.insert(document(&c, 2, "1790012345002", &first, None)).unwrap();
        store.insert(document(&c, 3, "1790012345003", &second, Some(&acc))).unwrap();

        assert_eq!(store.find_by_customer_number(&first.customer_number).len(), 2);
        let assigned = store.find_by_accountant(acc.id);
        let numbers: Vec<_> = assigned.iter().map(|c| c.credential_number.as_str()).collect();
        assert_eq!(numbers, vec!["SRI-000001", "SRI-000003"]);
        assert_eq!(store.find_all().len(), 3);
    }

    #[test]
    fn try_update_missing_is_not_found() {
        let err = store()
            .try_update(&CredentialId::new(), |_| Ok(()))
            .unwrap_err();
        assert!(matches!(err, VaultError::NotFound(_)));
    }

    #[test]
    fn try_update_error_leaves_document_untouched() {
        let store = store();
        let owner = customer("TB-000001");
        let doc = document(&cipher(), 1, "1790012345001", &owner, None);
        let id = doc.id;
        store.insert(doc.clone()).unwrap();

        let result: VaultResult<((), Credential)> = store.try_update(&id, |d| {
            d.legal_name = Some("changed".into());
            Err(VaultError::Forbidden("no".into()))
        });
        assert!(result.is_err());
        assert_eq!(store.document(&id), Some(doc));
    }

    #[test]
    fn reactivation_cannot_duplicate_active_ruc() {
        let store = store();
        let owner = customer("TB-000001");
        let c = cipher();
        let mut old = document(&c, 1, "1790012345001", &owner, None);
        old.status = CredentialStatus::Inactive;
        let old_id = old.id;
        store.insert(old).unwrap();
        store.insert(document(&c, 2, "1790012345001", &owner, None)).unwrap();

        let err = store
            .try_update(&old_id, |d| {
                d.status = CredentialStatus::Active;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, VaultError::Conflict(_)));
        assert_eq!(store.document(&old_id).unwrap().status, CredentialStatus::Inactive);
    }

    #[test]
    fn try_update_bumps_updated_at() {
        let store = store();
        let owner = customer("TB-000001");
        let doc = document(&cipher(), 1, "1790012345001", &owner, None);
        let id = doc.id;
        let before = doc.updated_at;
        store.insert(doc).unwrap();
        let (_, cred) = store
            .try_update(&id, |d| {
                d.legal_name = Some("ACME S.A.".into());
                Ok(())
            })
            .unwrap();
        assert!(cred.updated_at >= before);
        assert_eq!(cred.legal_name.as_deref(), Some("ACME S.A."));
    }

    #[test]
    fn remove_is_hard_delete() {
        let store = store();
        let owner = customer("TB-000001");
        let doc = document(&cipher(), 1, "1790012345001", &owner, None);
        let id = doc.id;
        store.insert(doc).unwrap();
        assert!(store.remove(&id).is_some());
        assert!(store.find_by_id(&id).is_none());
        assert!(store.remove(&id).is_none());
    }

    #[test]
    fn concurrent_number_reservation_is_unique() {
        let store = store();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || (0..100).map(|_| store.next_number()).collect::<Vec<_>>())
            })
            .collect();
        let mut seen = HashSet::new();
        for h in handles {
            for number in h.join().unwrap() {
                assert!(seen.insert(number), "duplicate credential number");
            }
        }
        assert_eq!(seen.len(), 800);
    }
}
