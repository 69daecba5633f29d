//! Enum types for contact records

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Position of a record inside its identity cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum LinkPrecedence {
    /// Canonical representative of the cluster; never carries a link.
    Primary,
    /// Subsumed record pointing at a primary through `linked_id`.
    Secondary,
}

impl LinkPrecedence {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            LinkPrecedence::Primary => "primary",
            LinkPrecedence::Secondary => "secondary",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, LinkPrecedenceParseError> {
        match s.trim().to_lowercase().as_str() {
            "primary" => Ok(LinkPrecedence::Primary),
            "secondary" => Ok(LinkPrecedence::Secondary),
            _ => Err(LinkPrecedenceParseError(s.to_string())),
        }
    }
}

impl fmt::Display for LinkPrecedence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_db_str())
    }
}

impl FromStr for LinkPrecedence {
    type Err = LinkPrecedenceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Error when parsing an invalid link precedence string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkPrecedenceParseError(pub String);

impl fmt::Display for LinkPrecedenceParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid link precedence: {}", self.0)
    }
}

impl std::error::Error for LinkPrecedenceParseError {}
