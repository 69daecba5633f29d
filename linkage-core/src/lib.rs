//! Linkage Core - Contact Data Model
//!
//! Pure data structures shared by every other crate: contact identifiers,
//! the persisted contact record, inbound observations, the consolidated
//! identity view and the error taxonomy. The reconciliation decision logic
//! lives in linkage-engine.

pub mod entities;
pub mod enums;
pub mod error;
pub mod identity;
pub mod view;

pub use entities::{ContactRecord, NewContact, Observation, ObservationShape};
pub use enums::{LinkPrecedence, LinkPrecedenceParseError};
pub use error::{ReconcileError, ReconcileErrorKind, ReconcileResult, StoreError, StoreResult};
pub use identity::{ContactId, Timestamp};
pub use view::ConsolidatedView;
