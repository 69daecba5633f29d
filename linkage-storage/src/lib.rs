//! Linkage Storage - Contact Store Trait and Mock Implementation
//!
//! Defines the storage contract the reconciliation engine consumes. The
//! PostgreSQL implementation lives in linkage-api; `MockContactStore` is an
//! in-memory implementation used by tests and local runs.

pub mod mock;

pub use mock::MockContactStore;

use async_trait::async_trait;
use linkage_core::{ContactId, ContactRecord, NewContact, StoreResult};
use std::fmt;

// ============================================================================
// STORE OPERATIONS
// ============================================================================

/// Discriminator for contact store operations (metrics labels, failure
/// injection).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StoreOperation {
    FindByPhone,
    FindByEmail,
    FindByLinkedId,
    FindById,
    Insert,
    Update,
    HealthCheck,
}

impl StoreOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreOperation::FindByPhone => "find_by_phone",
            StoreOperation::FindByEmail => "find_by_email",
            StoreOperation::FindByLinkedId => "find_by_linked_id",
            StoreOperation::FindById => "find_by_id",
            StoreOperation::Insert => "insert",
            StoreOperation::Update => "update",
            StoreOperation::HealthCheck => "health_check",
        }
    }
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// CONTACT STORE TRAIT
// ============================================================================

/// Async persistence contract for contact records.
///
/// Implementations must give read-after-write consistency within a request.
/// Lookups never return soft-deleted records.
#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Records with exactly this phone number, oldest `created_at` first.
    async fn find_by_phone(&self, phone_number: &str) -> StoreResult<Vec<ContactRecord>>;

    /// Records with exactly this email, oldest `created_at` first.
    async fn find_by_email(&self, email: &str) -> StoreResult<Vec<ContactRecord>>;

    /// Records whose `linked_id` is `id`, in store order.
    async fn find_by_linked_id(&self, id: ContactId) -> StoreResult<Vec<ContactRecord>>;

    /// Get a record by id.
    async fn find_by_id(&self, id: ContactId) -> StoreResult<Option<ContactRecord>>;

    /// Persist a new record, returning it with its assigned id.
    async fn insert(&self, contact: &NewContact) -> StoreResult<ContactRecord>;

    /// Overwrite the mutable fields of an existing record.
    ///
    /// `created_at` is never changed; `updated_at` is refreshed.
    async fn update(&self, contact: &ContactRecord) -> StoreResult<ContactRecord>;

    /// Check that the backend is reachable.
    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    /// Short backend name reported by readiness checks.
    fn backend(&self) -> &'static str {
        "unknown"
    }
}
