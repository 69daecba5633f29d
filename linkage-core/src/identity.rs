//! Identity types for contact records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Store-assigned identifier of a contact record.
///
/// Opaque to the reconciliation logic: ids are only ever compared for
/// equality, never used to infer creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(transparent)]
pub struct ContactId(i64);

impl ContactId {
    /// Wrap a raw store identifier.
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// The raw store identifier.
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for ContactId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
