//! OpenAPI Specification for the Orgdir API
//!
//! Generated with utoipa from the route annotations and the core entity
//! schemas.

use utoipa::OpenApi;

use orgdir_core::{Activity, ActivityNode, Building, Organization, Phone};

use crate::error::{ApiError, ErrorCode};
use crate::routes::{activities, buildings, health, organizations};
use crate::telemetry::metrics;

/// OpenAPI document for the directory API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Organization Directory API",
        description = "Read-only lookup of organizations by building, activity subtree, area and name"
    ),
    tags(
        (name = "Organizations", description = "Organization lookups and searches"),
        (name = "Buildings", description = "Buildings and their coordinates"),
        (name = "Activities", description = "Hierarchical activity classifier"),
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Observability", description = "Prometheus metrics")
    ),
    paths(
        // === Organization Routes ===
        organizations::in_building,
        organizations::by_activity,
        organizations::in_rect,
        organizations::in_radius,
        organizations::get_organization,
        organizations::search_by_name,
        organizations::search_by_activity_name,

        // === Building Routes ===
        buildings::list_buildings,
        buildings::get_building,

        // === Activity Routes ===
        activities::list_activities,
        activities::get_activity,
        activities::activity_tree,

        // === Health Routes ===
        health::summary,
        health::ping,
        health::liveness,
        health::readiness,

        metrics::metrics_handler,
    ),
    components(
        schemas(
            // === Error Types ===
            ApiError, ErrorCode,

            // === Directory Types ===
            Organization, Building, Activity, ActivityNode, Phone,

            // === Health Types ===
            health::HealthResponse, health::HealthStatus, health::HealthDetails,
            health::ComponentHealth, health::ServiceSummary, health::CacheSummary,
        )
    )
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Generate the OpenAPI specification as a JSON string.
    pub fn to_json() -> Result<String, serde_json::Error> {
        Self::openapi().to_pretty_json()
    }
}
