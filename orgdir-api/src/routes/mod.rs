//! REST API Route Modules
//!
//! Builds the complete Axum router: directory endpoints under `/api`, health
//! checks, metrics and the OpenAPI document, wrapped in CORS, timeout,
//! HTTP tracing and observability layers.

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn,
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{
    config::ApiConfig,
    state::AppState,
    telemetry::{metrics_handler, observability_middleware},
};

pub mod activities;
pub mod buildings;
pub mod health;
pub mod organizations;

#[cfg(feature = "openapi")]
use crate::openapi::ApiDoc;
#[cfg(feature = "openapi")]
use utoipa::OpenApi;

/// Handler for /openapi.json.
#[cfg(all(feature = "openapi", not(feature = "swagger-ui")))]
async fn openapi_json() -> axum::Json<utoipa::openapi::OpenApi> {
    axum::Json(ApiDoc::openapi())
}

/// Build the CORS layer from configuration.
///
/// An empty origin list allows any origin.
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(3600));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: allowing all origins");
        cors.allow_origin(Any).allow_headers(Any)
    } else {
        tracing::info!(origins = ?config.cors_origins, "CORS: restricted origins");
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors.allow_origin(AllowOrigin::list(origins))
    }
}

/// Create the complete API router.
pub fn create_api_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .nest("/organizations", organizations::create_router())
        .nest("/buildings", buildings::create_router())
        .nest("/activities", activities::create_router());

    let mut router = Router::new()
        .nest("/api", api_routes)
        .nest("/health", health::create_router());

    if state.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    #[cfg(all(feature = "openapi", not(feature = "swagger-ui")))]
    {
        router = router.route("/openapi.json", get(openapi_json));
    }

    #[cfg(feature = "swagger-ui")]
    {
        use utoipa_swagger_ui::SwaggerUi;
        router = router.merge(SwaggerUi::new("/swagger-ui").url("/openapi.json", ApiDoc::openapi()));
    }

    let layers = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(&state.config))
        .layer(TimeoutLayer::new(state.config.request_timeout))
        .layer(from_fn(observability_middleware));

    router.layer(layers).with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_builds_for_both_modes() {
        let mut config = ApiConfig::default();
        let _ = build_cors_layer(&config);
        config.cors_origins = vec!["https://maps.example".to_string(), "not a header\n".to_string()];
        let _ = build_cors_layer(&config);
    }
}
