//! Identify Endpoint
//!
//! `POST /identify` reconciles an observed email and/or phone number against
//! stored contacts and returns the consolidated identity.

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use linkage_core::{ConsolidatedView, ReconcileError, ReconcileErrorKind};
use linkage_engine::ReconciliationEngine;
use linkage_storage::ContactStore;
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::telemetry::METRICS;
use crate::types::IdentifyRequest;

// ============================================================================
// STATE
// ============================================================================

#[derive(Clone)]
pub struct IdentifyState {
    pub engine: ReconciliationEngine<dyn ContactStore>,
}

impl IdentifyState {
    pub fn new(store: Arc<dyn ContactStore>) -> Self {
        Self {
            engine: ReconciliationEngine::new(store),
        }
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// POST /identify - Reconcile a contact observation
#[utoipa::path(
    post,
    path = "/identify",
    tag = "Identity",
    request_body = IdentifyRequest,
    responses(
        (status = 200, description = "Consolidated contact identity", body = ConsolidatedView),
        (status = 400, description = "Neither email nor phone number supplied, or malformed body", body = ApiError),
        (status = 404, description = "No contact matches the single supplied value", body = ApiError),
        (status = 500, description = "Contact store failure", body = ApiError),
        (status = 503, description = "Contact store unavailable", body = ApiError),
    ),
)]
pub async fn identify(
    State(state): State<Arc<IdentifyState>>,
    payload: Result<Json<IdentifyRequest>, JsonRejection>,
) -> ApiResult<Json<ConsolidatedView>> {
    let Json(request) = payload?;
    let observation = request.into_observation();

    match state.engine.reconcile(&observation).await {
        Ok(reconciliation) => {
            if let Ok(metrics) = METRICS.as_ref() {
                metrics.record_outcome(reconciliation.outcome);
            }
            Ok(Json(reconciliation.view))
        }
        Err(err) => {
            if let Ok(metrics) = METRICS.as_ref() {
                metrics.record_outcome_label(failure_label(&err));
            }
            Err(ApiError::from(err))
        }
    }
}

/// Outcome label for a failed reconciliation.
fn failure_label(err: &ReconcileError) -> &'static str {
    match err.kind() {
        ReconcileErrorKind::InvalidInput | ReconcileErrorKind::NotFound => "rejected",
        ReconcileErrorKind::Store | ReconcileErrorKind::PreconditionViolation => "failed",
    }
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router(store: Arc<dyn ContactStore>) -> Router {
    let state = Arc::new(IdentifyState::new(store));

    Router::new()
        .route("/identify", post(identify))
        .with_state(state)
}
