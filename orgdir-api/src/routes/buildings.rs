//! Building REST API Routes

use axum::{extract::State, routing::get, Json, Router};
use orgdir_core::Building;

use crate::{
    error::ApiResult,
    extractors::{ApiPath, ApiQuery},
    params::PageParams,
    state::AppState,
};

#[cfg(feature = "openapi")]
use crate::error::ApiError;

/// GET /api/buildings
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/buildings",
    tag = "Buildings",
    params(PageParams),
    responses(
        (status = 200, description = "Buildings ordered by ID", body = Vec<Building>),
        (status = 400, description = "Invalid pagination", body = ApiError),
    ),
))]
pub async fn list_buildings(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> ApiResult<Json<Vec<Building>>> {
    let buildings = state.engine.planner().list_buildings(params.page()?).await?;
    Ok(Json(buildings))
}

/// GET /api/buildings/{building_id}
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/buildings/{building_id}",
    tag = "Buildings",
    params(("building_id" = i64, Path, description = "Building ID")),
    responses(
        (status = 200, description = "Building details", body = Building),
        (status = 404, description = "Building not found", body = ApiError),
    ),
))]
pub async fn get_building(
    State(state): State<AppState>,
    ApiPath(building_id): ApiPath<i64>,
) -> ApiResult<Json<Building>> {
    let building = state.engine.planner().building(building_id).await?;
    Ok(Json(building))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_buildings))
        .route("/:building_id", get(get_building))
}
