//! Linkage API Server Entry Point
//!
//! Bootstraps configuration, prepares the contact store and starts the Axum
//! HTTP server.

use std::sync::Arc;

use axum::Router;
use linkage_api::telemetry::{init_tracer, TelemetryConfig, METRICS};
use linkage_api::{create_api_router, ApiConfig, ApiError, ApiResult, DbClient, DbConfig};
use linkage_storage::ContactStore;

#[tokio::main]
async fn main() -> ApiResult<()> {
    let dotenv = dotenvy::dotenv();

    let telemetry_config = TelemetryConfig::default();
    init_tracer(&telemetry_config)?;

    match dotenv {
        Ok(path) => tracing::info!(path = %path.display(), "Loaded environment file"),
        Err(e) if e.not_found() => tracing::debug!("No .env file found"),
        Err(e) => tracing::warn!(error = %e, "Failed to load .env file"),
    }

    if telemetry_config.metrics_enabled {
        METRICS.as_ref().map_err(Clone::clone)?;
    } else {
        tracing::info!("Metrics will register on first use");
    }

    let db_config = DbConfig::from_env()?;
    let db = DbClient::from_config(&db_config)?;
    if db_config.migrate {
        db.migrate().await?;
    }
    tracing::info!(
        schema = %db_config.schema,
        max_size = db_config.max_size,
        "Contact store ready"
    );

    let api_config = ApiConfig::from_env()?;
    let store: Arc<dyn ContactStore> = Arc::new(db);
    let app: Router = create_api_router(store, &api_config);

    let addr = api_config.bind_addr()?;
    tracing::info!(%addr, "Starting linkage API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
