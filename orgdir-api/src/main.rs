//! Orgdir API Server Entry Point
//!
//! Loads configuration, wires the storage gateway, cache and query engine,
//! and starts the Axum HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use orgdir_api::telemetry::{init_tracing, TelemetryConfig};
use orgdir_api::{
    create_api_router, ApiConfig, ApiError, ApiResult, AppState, CacheSettings, DbConfig,
    PgGateway,
};
use orgdir_query::DirectoryEngine;

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::from_env()?;
    init_tracing(&telemetry_config)?;

    let api_config = ApiConfig::from_env()?;
    let cache_settings = CacheSettings::from_env()?;
    let db_config = DbConfig::from_env()?;

    let gateway = PgGateway::from_config(&db_config)?;
    let backend = cache_settings.open_backend()?;
    let engine = DirectoryEngine::new(
        Arc::new(gateway),
        backend,
        cache_settings.cache_config(),
        api_config.planner_config(),
    );

    let sweeper = cache_settings
        .sweep_every()
        .map(|every| engine.spawn_cache_sweeper(every));

    if let Err(e) = engine.ping_storage().await {
        // Readiness reports this too; the server still starts
        tracing::warn!(error = %e, "Storage not reachable at startup");
    }

    let addr: SocketAddr = api_config.bind_addr().parse().map_err(|e| {
        ApiError::internal_error(format!("Invalid bind address {}: {}", api_config.bind_addr(), e))
    })?;
    tracing::info!(
        %addr,
        environment = %api_config.environment,
        cache_backend = ?cache_settings.backend,
        "Starting orgdir API server"
    );

    let state = AppState::new(engine, api_config).with_metrics(telemetry_config.metrics_enabled);
    let app = create_api_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;

    if let Some(sweeper) = sweeper {
        let snapshot = sweeper.stop().await;
        tracing::info!(reclaimed = snapshot.reclaimed, "Cache sweeper stopped");
    }

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
