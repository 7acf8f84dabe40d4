//! Path and query extractors that reject with [`ApiError`] bodies.
//!
//! The stock `Path`/`Query` rejections are plain text; these wrappers keep
//! every 400 in the same JSON shape as the rest of the API.

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query},
    http::request::Parts,
};
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// `Path<T>` with an `INVALID_FORMAT` rejection.
#[derive(Debug, Clone, Copy)]
pub struct ApiPath<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(ApiPath(value)),
            Err(rejection) => {
                tracing::debug!(error = %rejection, path = %parts.uri.path(), "Path rejected");
                Err(ApiError::invalid_format("path", "a valid path parameter")
                    .with_details(serde_json::json!({ "reason": rejection.body_text() })))
            }
        }
    }
}

/// `Query<T>` with an `INVALID_FORMAT` rejection.
#[derive(Debug, Clone, Default)]
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(ApiQuery(value)),
            Err(rejection) => Err(ApiError::invalid_format("query", "valid query parameters")
                .with_details(serde_json::json!({ "reason": rejection.body_text() }))),
        }
    }
}
