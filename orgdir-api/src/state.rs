//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::FromRef;
use orgdir_query::DirectoryEngine;

use crate::config::ApiConfig;

/// Application-wide state shared across all routes.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Query engine: planner, hierarchy index and result cache.
    pub engine: DirectoryEngine,
    pub config: Arc<ApiConfig>,
    /// Serve `/metrics`.
    pub metrics_enabled: bool,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(engine: DirectoryEngine, config: ApiConfig) -> Self {
        Self {
            engine,
            config: Arc::new(config),
            metrics_enabled: true,
            start_time: Instant::now(),
        }
    }

    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.metrics_enabled = enabled;
        self
    }
}

impl FromRef<AppState> for DirectoryEngine {
    fn from_ref(state: &AppState) -> Self {
        state.engine.clone()
    }
}
