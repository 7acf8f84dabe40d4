//! Activity REST API Routes
//!
//! Flat listing, single lookups and nested subtrees of the activity
//! classifier.

use axum::{extract::State, routing::get, Json, Router};
use orgdir_core::{Activity, ActivityNode};

use crate::{
    error::ApiResult,
    extractors::{ApiPath, ApiQuery},
    params::{PageParams, TreeParams},
    state::AppState,
};

#[cfg(feature = "openapi")]
use crate::error::ApiError;

/// GET /api/activities
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/activities",
    tag = "Activities",
    params(PageParams),
    responses(
        (status = 200, description = "Activities ordered by ID", body = Vec<Activity>),
        (status = 400, description = "Invalid pagination", body = ApiError),
    ),
))]
pub async fn list_activities(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> ApiResult<Json<Vec<Activity>>> {
    let activities = state.engine.planner().list_activities(params.page()?).await?;
    Ok(Json(activities))
}

/// GET /api/activities/{activity_id}
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/activities/{activity_id}",
    tag = "Activities",
    params(("activity_id" = i64, Path, description = "Activity ID")),
    responses(
        (status = 200, description = "Activity details", body = Activity),
        (status = 404, description = "Activity not found", body = ApiError),
    ),
))]
pub async fn get_activity(
    State(state): State<AppState>,
    ApiPath(activity_id): ApiPath<i64>,
) -> ApiResult<Json<Activity>> {
    let activity = state.engine.planner().activity(activity_id).await?;
    Ok(Json(activity))
}

/// GET /api/activities/{activity_id}/tree
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/activities/{activity_id}/tree",
    tag = "Activities",
    params(
        ("activity_id" = i64, Path, description = "Root activity ID"),
        TreeParams,
    ),
    responses(
        (status = 200, description = "Nested activity subtree", body = ActivityNode),
        (status = 400, description = "Invalid depth", body = ApiError),
        (status = 404, description = "Activity not found", body = ApiError),
    ),
))]
pub async fn activity_tree(
    State(state): State<AppState>,
    ApiPath(activity_id): ApiPath<i64>,
    ApiQuery(params): ApiQuery<TreeParams>,
) -> ApiResult<Json<ActivityNode>> {
    let tree = state
        .engine
        .planner()
        .activity_tree(activity_id, params.depth)
        .await?;
    Ok(Json(tree))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_activities))
        .route("/:activity_id", get(get_activity))
        .route("/:activity_id/tree", get(activity_tree))
}
