//! In-memory contact store.

use crate::{ContactStore, StoreOperation};
use async_trait::async_trait;
use linkage_core::{ContactId, ContactRecord, NewContact, StoreError, StoreResult};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::RwLock;

/// In-memory contact store for testing and local runs.
///
/// Ids are assigned from a counter starting at 1. Individual operations can
/// be made to fail with [`MockContactStore::fail_on`] to exercise error
/// propagation.
#[derive(Debug)]
pub struct MockContactStore {
    contacts: RwLock<BTreeMap<ContactId, ContactRecord>>,
    failing: RwLock<HashSet<StoreOperation>>,
    next_id: AtomicI64,
    writes: AtomicUsize,
}

impl Default for MockContactStore {
    fn default() -> Self {
        Self {
            contacts: RwLock::new(BTreeMap::new()),
            failing: RwLock::new(HashSet::new()),
            next_id: AtomicI64::new(1),
            writes: AtomicUsize::new(0),
        }
    }
}

impl MockContactStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a fully-formed record in the store, bypassing the write counter.
    ///
    /// Later inserts are assigned ids above every seeded id.
    pub fn seed(&self, record: ContactRecord) -> StoreResult<ContactRecord> {
        let mut contacts = self.contacts.write().map_err(|_| StoreError::LockPoisoned)?;
        self.next_id
            .fetch_max(record.id.get() + 1, Ordering::SeqCst);
        contacts.insert(record.id, record.clone());
        Ok(record)
    }

    /// Make every subsequent call of `operation` fail.
    pub fn fail_on(&self, operation: StoreOperation) -> StoreResult<()> {
        self.failing
            .write()
            .map_err(|_| StoreError::LockPoisoned)?
            .insert(operation);
        Ok(())
    }

    /// Stop injecting failures.
    pub fn clear_failures(&self) -> StoreResult<()> {
        self.failing
            .write()
            .map_err(|_| StoreError::LockPoisoned)?
            .clear();
        Ok(())
    }

    /// Number of successful inserts and updates so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Get a record by id without going through the async contract.
    pub fn get(&self, id: ContactId) -> StoreResult<Option<ContactRecord>> {
        let contacts = self.contacts.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(contacts.get(&id).cloned())
    }

    /// All records, ordered by id.
    pub fn all(&self) -> StoreResult<Vec<ContactRecord>> {
        let contacts = self.contacts.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(contacts.values().cloned().collect())
    }

    /// Count of stored records, soft-deleted ones included.
    pub fn len(&self) -> StoreResult<usize> {
        let contacts = self.contacts.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(contacts.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    fn check(&self, operation: StoreOperation) -> StoreResult<()> {
        let failing = self.failing.read().map_err(|_| StoreError::LockPoisoned)?;
        if failing.contains(&operation) {
            return Err(StoreError::QueryFailed {
                operation: operation.as_str(),
                reason: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn find_ordered<F>(&self, operation: StoreOperation, matches: F) -> StoreResult<Vec<ContactRecord>>
    where
        F: Fn(&ContactRecord) -> bool,
    {
        self.check(operation)?;
        let contacts = self.contacts.read().map_err(|_| StoreError::LockPoisoned)?;
        // Soft-deleted rows never take part in matching.
        let mut found: Vec<ContactRecord> = contacts
            .values()
            .filter(|c| c.deleted_at.is_none() && matches(c))
            .cloned()
            .collect();
        found.sort_by_key(|c| (c.created_at, c.id));
        Ok(found)
    }
}

#[async_trait]
impl ContactStore for MockContactStore {
    async fn find_by_phone(&self, phone_number: &str) -> StoreResult<Vec<ContactRecord>> {
        self.find_ordered(StoreOperation::FindByPhone, |c| {
            c.phone_number.as_deref() == Some(phone_number)
        })
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Vec<ContactRecord>> {
        self.find_ordered(StoreOperation::FindByEmail, |c| c.email.as_deref() == Some(email))
    }

    async fn find_by_linked_id(&self, id: ContactId) -> StoreResult<Vec<ContactRecord>> {
        self.check(StoreOperation::FindByLinkedId)?;
        let contacts = self.contacts.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(contacts
            .values()
            .filter(|c| c.deleted_at.is_none() && c.linked_id == Some(id))
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: ContactId) -> StoreResult<Option<ContactRecord>> {
        self.check(StoreOperation::FindById)?;
        let contacts = self.contacts.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(contacts.get(&id).filter(|c| c.deleted_at.is_none()).cloned())
    }

    async fn insert(&self, contact: &NewContact) -> StoreResult<ContactRecord> {
        self.check(StoreOperation::Insert)?;
        contact
            .validate()
            .map_err(|reason| StoreError::InsertFailed { reason })?;

        let mut contacts = self.contacts.write().map_err(|_| StoreError::LockPoisoned)?;
        if let Some(linked) = contact.linked_id {
            if !contacts.contains_key(&linked) {
                return Err(StoreError::InsertFailed {
                    reason: format!("linked contact {} does not exist", linked),
                });
            }
        }

        let id = ContactId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let record = contact.clone().into_record(id);
        contacts.insert(id, record.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(record)
    }

    async fn update(&self, contact: &ContactRecord) -> StoreResult<ContactRecord> {
        self.check(StoreOperation::Update)?;
        let mut contacts = self.contacts.write().map_err(|_| StoreError::LockPoisoned)?;
        let stored = contacts
            .get_mut(&contact.id)
            .ok_or(StoreError::NotFound { id: contact.id })?;

        stored.phone_number = contact.phone_number.clone();
        stored.email = contact.email.clone();
        stored.linked_id = contact.linked_id;
        stored.link_precedence = contact.link_precedence;
        stored.updated_at = contact.updated_at.max(chrono::Utc::now());

        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(stored.clone())
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.check(StoreOperation::HealthCheck)?;
        let _contacts = self.contacts.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
