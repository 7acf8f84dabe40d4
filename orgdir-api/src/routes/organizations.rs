//! Organization REST API Routes
//!
//! Lookups by building, activity subtree, area, name and activity name.

use axum::{extract::State, routing::get, Json, Router};
use orgdir_core::Organization;

use crate::{
    error::ApiResult,
    extractors::{ApiPath, ApiQuery},
    params::{ActivityNameParams, PageParams, RadiusParams, RectParams},
    state::AppState,
};

#[cfg(feature = "openapi")]
use crate::error::ApiError;

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /api/organizations/in_building/{building_id}
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/organizations/in_building/{building_id}",
    tag = "Organizations",
    params(
        ("building_id" = i64, Path, description = "Building ID"),
        PageParams,
    ),
    responses(
        (status = 200, description = "Organizations in the building", body = Vec<Organization>),
        (status = 400, description = "Invalid request", body = ApiError),
    ),
))]
pub async fn in_building(
    State(state): State<AppState>,
    ApiPath(building_id): ApiPath<i64>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> ApiResult<Json<Vec<Organization>>> {
    let page = params.page()?;
    let orgs = state
        .engine
        .planner()
        .organizations_by_building(building_id, page)
        .await?;
    Ok(Json(orgs))
}

/// GET /api/organizations/by_activity/{activity_id}
///
/// Includes organizations tagged with descendant activities up to three
/// levels below.
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/organizations/by_activity/{activity_id}",
    tag = "Organizations",
    params(
        ("activity_id" = i64, Path, description = "Root activity ID"),
        PageParams,
    ),
    responses(
        (status = 200, description = "Organizations under the activity", body = Vec<Organization>),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "Activity not found", body = ApiError),
    ),
))]
pub async fn by_activity(
    State(state): State<AppState>,
    ApiPath(activity_id): ApiPath<i64>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> ApiResult<Json<Vec<Organization>>> {
    let page = params.page()?;
    let orgs = state
        .engine
        .planner()
        .organizations_by_activity(activity_id, page)
        .await?;
    Ok(Json(orgs))
}

/// GET /api/organizations/in_rect
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/organizations/in_rect",
    tag = "Organizations",
    params(RectParams),
    responses(
        (status = 200, description = "Organizations inside the rectangle", body = Vec<Organization>),
        (status = 400, description = "Invalid coordinates", body = ApiError),
    ),
))]
pub async fn in_rect(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<RectParams>,
) -> ApiResult<Json<Vec<Organization>>> {
    let (lat1, lon1, lat2, lon2) = params.corners()?;
    let page = params.page()?;
    let orgs = state
        .engine
        .planner()
        .organizations_in_rect(lat1, lon1, lat2, lon2, page)
        .await?;
    Ok(Json(orgs))
}

/// GET /api/organizations/in_radius
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/organizations/in_radius",
    tag = "Organizations",
    params(RadiusParams),
    responses(
        (status = 200, description = "Organizations inside the circle", body = Vec<Organization>),
        (status = 400, description = "Invalid center or radius", body = ApiError),
    ),
))]
pub async fn in_radius(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<RadiusParams>,
) -> ApiResult<Json<Vec<Organization>>> {
    let (lat, lon, radius_km) = params.circle()?;
    let page = params.page()?;
    let orgs = state
        .engine
        .planner()
        .organizations_in_radius(lat, lon, radius_km, page)
        .await?;
    Ok(Json(orgs))
}

/// GET /api/organizations/{org_id}
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/organizations/{org_id}",
    tag = "Organizations",
    params(("org_id" = i64, Path, description = "Organization ID")),
    responses(
        (status = 200, description = "Organization with building, phones and activities", body = Organization),
        (status = 400, description = "Invalid ID", body = ApiError),
        (status = 404, description = "Organization not found", body = ApiError),
    ),
))]
pub async fn get_organization(
    State(state): State<AppState>,
    ApiPath(org_id): ApiPath<i64>,
) -> ApiResult<Json<Organization>> {
    let org = state.engine.planner().organization(org_id).await?;
    Ok(Json(org))
}

/// GET /api/organizations/search/by_name/{org_name}
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/organizations/search/by_name/{org_name}",
    tag = "Organizations",
    params(
        ("org_name" = String, Path, description = "Case-insensitive name fragment"),
        PageParams,
    ),
    responses(
        (status = 200, description = "Matching organizations", body = Vec<Organization>),
        (status = 400, description = "Invalid name", body = ApiError),
    ),
))]
pub async fn search_by_name(
    State(state): State<AppState>,
    ApiPath(org_name): ApiPath<String>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> ApiResult<Json<Vec<Organization>>> {
    let page = params.page()?;
    let orgs = state.engine.planner().search_by_name(&org_name, page).await?;
    Ok(Json(orgs))
}

/// GET /api/organizations/search/by_activity_name
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/organizations/search/by_activity_name",
    tag = "Organizations",
    params(ActivityNameParams),
    responses(
        (status = 200, description = "Organizations under the best matching activity", body = Vec<Organization>),
        (status = 400, description = "Invalid activity name", body = ApiError),
    ),
))]
pub async fn search_by_activity_name(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ActivityNameParams>,
) -> ApiResult<Json<Vec<Organization>>> {
    let page = params.page()?;
    let orgs = state
        .engine
        .planner()
        .search_by_activity_name(params.name()?, page)
        .await?;
    Ok(Json(orgs))
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/in_building/:building_id", get(in_building))
        .route("/by_activity/:activity_id", get(by_activity))
        .route("/in_rect", get(in_rect))
        .route("/in_radius", get(in_radius))
        .route("/search/by_name/:org_name", get(search_by_name))
        .route("/search/by_activity_name", get(search_by_activity_name))
        .route("/:org_id", get(get_organization))
}
