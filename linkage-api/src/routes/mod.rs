//! REST API Routes Module
//!
//! Includes:
//! - Contact identity reconciliation (`POST /identify`)
//! - Health check endpoints (Kubernetes-compatible)
//! - Prometheus metrics and the OpenAPI document
//! - CORS support for browser-based clients

pub mod health;
pub mod identify;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    error_handling::HandleErrorLayer,
    http::{header, HeaderValue, Method},
    middleware::from_fn,
    response::IntoResponse,
    routing::get,
    BoxError, Json, Router,
};
use linkage_storage::ContactStore;
use tower::{timeout::error::Elapsed, ServiceBuilder};
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::openapi::ApiDoc;
use crate::telemetry::{metrics_handler, observability_middleware};

pub use health::create_router as health_router;
pub use identify::create_router as identify_router;

// ============================================================================
// OPENAPI ENDPOINTS
// ============================================================================

/// Handler for /openapi.json endpoint.
async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

// ============================================================================
// TIMEOUTS
// ============================================================================

/// Convert errors from the timeout layer into API errors.
async fn handle_middleware_error(err: BoxError) -> ApiError {
    if err.is::<Elapsed>() {
        tracing::warn!("Request timed out");
        ApiError::timeout("request")
    } else {
        tracing::error!(error = %err, "Unhandled middleware error");
        ApiError::internal_error("Unhandled middleware error")
    }
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the complete API router.
///
/// Layer execution order: CORS -> Observability -> Timeout -> Handler.
pub fn create_api_router(store: Arc<dyn ContactStore>, config: &ApiConfig) -> Router {
    #[allow(unused_mut)]
    let mut router = Router::new()
        .merge(identify::create_router(Arc::clone(&store)))
        .nest("/health", health::create_router(store))
        .route("/metrics", get(metrics_handler))
        .route("/openapi.json", get(openapi_json));

    #[cfg(feature = "swagger-ui")]
    {
        use utoipa_swagger_ui::SwaggerUi;
        router = router.merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()),
        );
    }

    let timeout = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(handle_middleware_error))
        .timeout(config.request_timeout);

    router
        .layer(timeout)
        .layer(from_fn(observability_middleware))
        .layer(build_cors_layer(config))
}

// ============================================================================
// CORS LAYER
// ============================================================================

/// Build the CORS layer from ApiConfig.
///
/// In development mode (empty origins), allows all origins.
/// In production mode, only allows configured origins.
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: Development mode - allowing all origins");
        cors.allow_origin(Any)
    } else {
        tracing::info!(
            "CORS: Production mode - allowing origins: {:?}",
            config.cors_origins
        );
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors.allow_origin(origins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[tokio::test]
    async fn test_elapsed_maps_to_timeout() {
        let err = handle_middleware_error(Box::new(Elapsed::new())).await;
        assert_eq!(err.code, ErrorCode::Timeout);

        let err = handle_middleware_error("boom".into()).await;
        assert_eq!(err.code, ErrorCode::InternalError);
    }
}
