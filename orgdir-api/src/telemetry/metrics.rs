//! Prometheus Metrics Definitions
//!
//! HTTP, database and cache metrics, exposed on `/metrics` for scraping.
//! Cache figures are copied from the engine's counters at scrape time.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use orgdir_storage::CacheStats;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, register_histogram_vec, CounterVec,
    Encoder, Gauge, GaugeVec, HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// HTTP request latency buckets (seconds)
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Database query latency buckets (seconds)
const DB_LATENCY_BUCKETS: &[f64] =
    &[0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0];

/// Global metrics instance, registered on first use
pub static METRICS: Lazy<ApiResult<OrgdirMetrics>> = Lazy::new(OrgdirMetrics::new);

/// Container for all orgdir metrics.
#[derive(Clone)]
pub struct OrgdirMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Database query counter - labels: operation, status
    pub db_operations_total: CounterVec,

    /// Database query duration histogram - labels: operation
    pub db_operation_duration_seconds: HistogramVec,

    /// Result cache counters as of the last scrape - labels: event
    pub cache_events: GaugeVec,

    /// Entries held by the cache backend
    pub cache_entries: Gauge,
}

fn registration_error(name: &str, err: prometheus::Error) -> ApiError {
    ApiError::internal_error(format!("Failed to register {}: {}", name, err))
}

impl OrgdirMetrics {
    /// Create and register all metrics with the default registry.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "orgdir_http_requests_total",
                "HTTP requests served by the directory API",
                &["method", "path", "status"]
            )
            .map_err(|e| registration_error("http_requests_total", e))?,

            http_request_duration_seconds: register_histogram_vec!(
                "orgdir_http_request_duration_seconds",
                "Directory API request latency in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_error("http_request_duration_seconds", e))?,

            db_operations_total: register_counter_vec!(
                "orgdir_db_operations_total",
                "Total number of database queries",
                &["operation", "status"]
            )
            .map_err(|e| registration_error("db_operations_total", e))?,

            db_operation_duration_seconds: register_histogram_vec!(
                "orgdir_db_operation_duration_seconds",
                "Database query duration in seconds",
                &["operation"],
                DB_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_error("db_operation_duration_seconds", e))?,

            cache_events: register_gauge_vec!(
                "orgdir_cache_events",
                "Result cache hits, misses, shared waits, computations and backend errors",
                &["event"]
            )
            .map_err(|e| registration_error("cache_events", e))?,

            cache_entries: register_gauge!(
                "orgdir_cache_entries",
                "Entries currently held by the cache backend"
            )
            .map_err(|e| registration_error("cache_entries", e))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    /// Record a database query.
    pub fn record_db_operation(&self, operation: &str, success: bool, duration_secs: f64) {
        let status = if success { "success" } else { "error" };
        self.db_operations_total
            .with_label_values(&[operation, status])
            .inc();
        self.db_operation_duration_seconds
            .with_label_values(&[operation])
            .observe(duration_secs);
    }

    /// Copy result cache counters into the gauges.
    pub fn observe_cache(&self, stats: &CacheStats, entries: Option<u64>) {
        for (event, value) in [
            ("hit", stats.hits),
            ("miss", stats.misses),
            ("shared", stats.shared),
            ("computation", stats.computations),
            ("backend_error", stats.backend_errors),
        ] {
            self.cache_events.with_label_values(&[event]).set(value as f64);
        }
        if let Some(entries) = entries {
            self.cache_entries.set(entries as f64);
        }
    }
}

/// Handler for GET /metrics.
///
/// Returns Prometheus text format metrics.
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics"),
    ),
))]
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let metrics = match METRICS.as_ref() {
        Ok(metrics) => metrics,
        Err(e) => {
            tracing::error!(error = %e, "Metrics registry unavailable");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                e.message.clone().into_bytes(),
            );
        }
    };

    // Backend stats are best effort; a failing backend keeps the last value
    let entries = state.engine.backend_stats().await.ok().map(|s| s.entry_count);
    metrics.observe_cache(&state.engine.cache_stats(), entries);

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("metrics encoding failed: {}", e).into_bytes(),
            )
        }
    }
}
