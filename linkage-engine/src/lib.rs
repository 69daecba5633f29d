//! Linkage Engine - Contact Reconciliation
//!
//! Turns an inbound observation into a consolidated identity view, creating,
//! attaching or merging contact records in the injected store as needed.

mod engine;

pub use engine::{ReconcileOutcome, Reconciliation, ReconciliationEngine};
