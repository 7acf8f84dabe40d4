//! Orgdir API - REST layer for the organization directory
//!
//! Axum handlers over the `orgdir-query` engine, a PostgreSQL storage
//! gateway, environment configuration and Prometheus/tracing telemetry.

pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
#[cfg(feature = "openapi")]
pub mod openapi;
pub mod params;
pub mod routes;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use config::{ApiConfig, CacheBackendKind, CacheSettings};
pub use db::{DbConfig, PgGateway};
pub use error::{ApiError, ApiResult, ErrorCode};
#[cfg(feature = "openapi")]
pub use openapi::ApiDoc;
pub use routes::create_api_router;
pub use state::AppState;
