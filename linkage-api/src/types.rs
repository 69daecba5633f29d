//! Request types for the linkage API

use linkage_core::Observation;
use serde::{Deserialize, Serialize};

/// Body of `POST /identify`.
///
/// Both fields may be omitted, null or empty; empty strings count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct IdentifyRequest {
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(example = "mcfly@hillvalley.edu"))]
    pub email: Option<String>,

    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(example = "123456"))]
    pub phone_number: Option<String>,
}

impl IdentifyRequest {
    pub fn into_observation(self) -> Observation {
        Observation::new(self.email, self.phone_number)
    }
}
