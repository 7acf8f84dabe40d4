//! Axum middleware for HTTP request tracing and metrics.

use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info_span, Instrument};

use super::metrics::METRICS;

static ID_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/\d+(/|$)").expect("numeric id pattern is valid"));

/// Normalize a request path for metric labels and span names.
///
/// Numeric path segments become `{id}` so Prometheus label cardinality stays
/// bounded.
pub fn normalize_path(path: &str) -> String {
    // Replace twice: adjacent ids share a slash, so one pass skips every other one
    let once = ID_SEGMENT.replace_all(path, "/{id}$1");
    ID_SEGMENT.replace_all(&once, "/{id}$1").into_owned()
}

/// Label used for paths carrying user text.
fn route_label(path: &str) -> String {
    if let Some(idx) = path.find("/search/by_name/") {
        return format!("{}/search/by_name/{{name}}", &path[..idx]);
    }
    normalize_path(path)
}

/// Observability middleware.
///
/// Wraps every request in an `http_request` span, records Prometheus
/// request metrics and logs completion.
pub async fn observability_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let route = route_label(&path);

    let span = info_span!(
        "http_request",
        http.method = %method,
        http.target = %path,
        http.route = %route,
    );

    let response = next.run(request).instrument(span).await;

    let duration = start.elapsed();
    let status = response.status();

    if let Ok(metrics) = METRICS.as_ref() {
        metrics.record_http_request(method.as_str(), &route, status.as_u16(), duration.as_secs_f64());
    }

    if status.is_server_error() {
        tracing::warn!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            duration_ms = duration.as_millis() as u64,
            "Request failed"
        );
    } else {
        tracing::info!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            duration_ms = duration.as_millis() as u64,
            "Request completed"
        );
    }

    response
}
