//! OpenAPI Specification for the linkage API
//!
//! Generated with utoipa from the request/response types and route
//! annotations.

use utoipa::OpenApi;

use crate::error::{ApiError, ErrorCode};
use crate::routes::{health, identify};
use crate::telemetry::metrics;
use crate::types::IdentifyRequest;
use linkage_core::{ContactId, ConsolidatedView};

/// OpenAPI document for the linkage API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Linkage API",
        version = "0.1.0",
        description = "Contact identity reconciliation: links records that share an email or phone number into one consolidated identity",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local Development")
    ),
    tags(
        (name = "Identity", description = "Contact identity reconciliation"),
        (name = "Health", description = "Liveness and contact store readiness"),
        (name = "Observability", description = "Prometheus metrics")
    ),
    paths(
        identify::identify,
        health::ping,
        health::liveness,
        health::readiness,
        metrics::metrics_handler,
    ),
    components(schemas(
        IdentifyRequest,
        ConsolidatedView,
        ContactId,
        ApiError,
        ErrorCode,
        health::ReadinessReport,
        health::Readiness,
        health::StoreReport,
        health::LivenessReport,
    ))
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Generate OpenAPI spec as JSON string.
    pub fn to_json() -> Result<String, serde_json::Error> {
        let openapi = Self::openapi();
        serde_json::to_string_pretty(&openapi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_json_lists_identify() -> Result<(), String> {
        let json = ApiDoc::to_json().map_err(|e| format!("Failed to serialize OpenAPI: {}", e))?;

        let value: serde_json::Value =
            serde_json::from_str(&json).map_err(|e| format!("Generated JSON invalid: {}", e))?;

        assert!(json.contains("Linkage API"));
        assert!(value["paths"]["/identify"]["post"].is_object());
        assert!(value["paths"]["/health/ready"]["get"].is_object());
        assert!(value["components"]["schemas"]["ConsolidatedView"].is_object());
        assert!(value["components"]["schemas"]["ReadinessReport"].is_object());
        Ok(())
    }
}
