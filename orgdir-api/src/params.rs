//! Query parameter types for the directory endpoints.
//!
//! Every field is optional at the deserialization layer so a missing value
//! surfaces as `MISSING_FIELD` naming the parameter, and range checks stay in
//! the query engine.

use orgdir_core::{Page, ValidationError};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};

fn required<T>(value: Option<T>, field: &str) -> ApiResult<T> {
    value.ok_or_else(|| ApiError::missing_field(field))
}

fn page(skip: Option<i64>, limit: Option<i64>) -> ApiResult<Page> {
    Page::from_params(skip, limit).map_err(ApiError::from)
}

/// `skip`/`limit` pagination.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct PageParams {
    /// Rows to skip (default 0)
    pub skip: Option<i64>,
    /// Page size, 1..=500 (default 100)
    pub limit: Option<i64>,
}

impl PageParams {
    pub fn page(&self) -> ApiResult<Page> {
        page(self.skip, self.limit)
    }
}

impl TryFrom<PageParams> for Page {
    type Error = ValidationError;

    fn try_from(params: PageParams) -> Result<Self, Self::Error> {
        Page::from_params(params.skip, params.limit)
    }
}

/// Rectangle given by two opposite corners, in any order.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct RectParams {
    pub lat1: Option<f64>,
    pub lon1: Option<f64>,
    pub lat2: Option<f64>,
    pub lon2: Option<f64>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl RectParams {
    /// `(lat1, lon1, lat2, lon2)`
    pub fn corners(&self) -> ApiResult<(f64, f64, f64, f64)> {
        Ok((
            required(self.lat1, "lat1")?,
            required(self.lon1, "lon1")?,
            required(self.lat2, "lat2")?,
            required(self.lon2, "lon2")?,
        ))
    }

    pub fn page(&self) -> ApiResult<Page> {
        page(self.skip, self.limit)
    }
}

/// Circle around a center point.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct RadiusParams {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// Radius in kilometres, 0..=max (default max 100)
    pub radius_km: Option<f64>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl RadiusParams {
    /// `(lat, lon, radius_km)`
    pub fn circle(&self) -> ApiResult<(f64, f64, f64)> {
        Ok((
            required(self.lat, "lat")?,
            required(self.lon, "lon")?,
            required(self.radius_km, "radius_km")?,
        ))
    }

    pub fn page(&self) -> ApiResult<Page> {
        page(self.skip, self.limit)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct ActivityNameParams {
    /// Activity name fragment, 2..=100 characters
    pub activity_name: Option<String>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl ActivityNameParams {
    pub fn name(&self) -> ApiResult<&str> {
        self.activity_name
            .as_deref()
            .ok_or_else(|| ApiError::missing_field("activity_name"))
    }

    pub fn page(&self) -> ApiResult<Page> {
        page(self.skip, self.limit)
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct TreeParams {
    /// Levels below the root, 1..=3 (default 3)
    pub depth: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_page_defaults() {
        let page = PageParams::default().page().unwrap();
        assert_eq!((page.skip(), page.limit()), (0, 100));
    }

    #[test]
    fn test_page_rejects_out_of_range() {
        let err = PageParams {
            skip: None,
            limit: Some(0),
        }
        .page()
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidRange);

        let err = Page::try_from(PageParams {
            skip: Some(-1),
            limit: None,
        })
        .unwrap_err();
        assert_eq!(err.field(), "skip");
    }

    #[test]
    fn test_missing_corner_names_field() {
        let params = RectParams {
            lat1: Some(55.0),
            lon1: Some(37.0),
            lat2: Some(56.0),
            ..RectParams::default()
        };
        let err = params.corners().unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingField);
        assert_eq!(err.details.unwrap()["field"], "lon2");
    }

    #[test]
    fn test_missing_activity_name() {
        let err = ActivityNameParams::default().name().unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingField);
    }
}
