//! Linkage API - HTTP Service for Contact Reconciliation
//!
//! Exposes the reconciliation engine over REST (Axum) and provides the
//! PostgreSQL-backed contact store, configuration, error mapping and
//! telemetry for the service binary.

pub mod config;
pub mod db;
pub mod error;
pub mod migrations;
pub mod openapi;
pub mod routes;
pub mod telemetry;
pub mod types;

// Re-export commonly used types
pub use config::ApiConfig;
pub use db::{DbClient, DbConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use openapi::ApiDoc;
pub use routes::create_api_router;
pub use types::IdentifyRequest;
