//! Error types for contact reconciliation

use crate::ContactId;
use thiserror::Error;

/// Contact store errors.
///
/// Reasons are opaque strings; stores log the underlying driver error and
/// hand back a message that is safe to surface.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Query {operation} failed: {reason}")]
    QueryFailed {
        operation: &'static str,
        reason: String,
    },

    #[error("Insert failed for contact: {reason}")]
    InsertFailed { reason: String },

    #[error("Update failed for contact {id}: {reason}")]
    UpdateFailed { id: ContactId, reason: String },

    #[error("Contact not found: {id}")]
    NotFound { id: ContactId },

    #[error("Store connection failed: {reason}")]
    Connection { reason: String },

    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Coarse failure category reported to callers of `Reconcile`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReconcileErrorKind {
    InvalidInput,
    NotFound,
    Store,
    PreconditionViolation,
}

/// Master error type for reconciliation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("No contacts found for provided {subject}")]
    NotFound { subject: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Precondition violated: {reason}")]
    PreconditionViolation { reason: String },
}

impl ReconcileError {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    pub fn not_found(subject: impl Into<String>) -> Self {
        Self::NotFound {
            subject: subject.into(),
        }
    }

    pub fn precondition(reason: impl Into<String>) -> Self {
        Self::PreconditionViolation {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ReconcileErrorKind {
        match self {
            ReconcileError::InvalidInput { .. } => ReconcileErrorKind::InvalidInput,
            ReconcileError::NotFound { .. } => ReconcileErrorKind::NotFound,
            ReconcileError::Store(_) => ReconcileErrorKind::Store,
            ReconcileError::PreconditionViolation { .. } => {
                ReconcileErrorKind::PreconditionViolation
            }
        }
    }
}

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type alias for reconciliation.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

// =============================================================================
// TESTS
// =============================================================================
