//! Liveness and readiness endpoints.
//!
//! `/health/live` answers as long as the process can serve requests.
//! `/health/ready` additionally requires the contact store to answer its
//! health check, since reconciliation is impossible without it.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use linkage_storage::ContactStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// REPORTS
// ============================================================================

/// Whether the service can take reconciliation traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Ready,
    NotReady,
}

impl Readiness {
    fn status_code(self) -> StatusCode {
        match self {
            Readiness::Ready => StatusCode::OK,
            Readiness::NotReady => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Result of one contact store health check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StoreReport {
    /// Backend name, e.g. `postgres` or `memory`.
    pub backend: String,
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StoreReport {
    /// Run the store's health check and time it.
    pub async fn check(store: &dyn ContactStore) -> Self {
        let start = Instant::now();
        let backend = store.backend().to_string();

        match store.health_check().await {
            Ok(()) => Self {
                backend,
                reachable: true,
                latency_ms: Some(start.elapsed().as_millis() as u64),
                error: None,
            },
            Err(e) => {
                tracing::warn!(error = %e, backend = %backend, "Contact store health check failed");
                Self {
                    backend,
                    reachable: false,
                    latency_ms: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

/// Body of `/health/ready`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ReadinessReport {
    pub status: Readiness,
    pub store: StoreReport,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Body of `/health/live`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct LivenessReport {
    pub alive: bool,
    pub version: String,
}

// ============================================================================
// STATE
// ============================================================================

#[derive(Clone)]
pub struct HealthState {
    store: Arc<dyn ContactStore>,
    started: Instant,
}

impl HealthState {
    pub fn new(store: Arc<dyn ContactStore>) -> Self {
        Self {
            store,
            started: Instant::now(),
        }
    }

    async fn readiness_report(&self) -> ReadinessReport {
        let store = StoreReport::check(self.store.as_ref()).await;
        let status = if store.reachable {
            Readiness::Ready
        } else {
            Readiness::NotReady
        };
        ReadinessReport {
            status,
            store,
            version: VERSION.to_string(),
            uptime_seconds: self.started.elapsed().as_secs(),
        }
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /health/ping
#[utoipa::path(
    get,
    path = "/health/ping",
    tag = "Health",
    responses(
        (status = 200, description = "Service is responding", body = String),
    ),
)]
pub async fn ping() -> impl IntoResponse {
    (StatusCode::OK, "pong")
}

/// GET /health/live
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses(
        (status = 200, description = "Process is alive", body = LivenessReport),
    ),
)]
pub async fn liveness() -> Json<LivenessReport> {
    Json(LivenessReport {
        alive: true,
        version: VERSION.to_string(),
    })
}

/// GET /health/ready
///
/// 503 while the contact store is unreachable.
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Contact store reachable", body = ReadinessReport),
        (status = 503, description = "Contact store unreachable", body = ReadinessReport),
    ),
)]
pub async fn readiness(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let report = state.readiness_report().await;
    (report.status.status_code(), Json(report))
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router(store: Arc<dyn ContactStore>) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
        .with_state(Arc::new(HealthState::new(store)))
}
