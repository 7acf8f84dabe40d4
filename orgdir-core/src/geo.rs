//! Geographic value types

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// A validated latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Build a point, rejecting non-finite or out-of-range coordinates.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ValidationError> {
        check_coordinate("latitude", latitude, 90.0)?;
        check_coordinate("longitude", longitude, 180.0)?;
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

fn check_coordinate(field: &str, value: f64, bound: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            reason: "must be a finite number".to_string(),
        });
    }
    if !(-bound..=bound).contains(&value) {
        return Err(ValidationError::out_of_range(field, value, -bound, bound));
    }
    Ok(())
}

/// Validate a search radius in kilometres against a configured ceiling.
pub fn validate_radius_km(radius_km: f64, max_km: f64) -> Result<f64, ValidationError> {
    if !radius_km.is_finite() {
        return Err(ValidationError::InvalidValue {
            field: "radius_km".to_string(),
            reason: "must be a finite number".to_string(),
        });
    }
    if !(0.0..=max_km).contains(&radius_km) {
        return Err(ValidationError::out_of_range("radius_km", radius_km, 0, max_km));
    }
    Ok(radius_km)
}

/// An inclusive latitude/longitude rectangle with normalized corners.
///
/// Corners may be supplied in any order; `min_* <= max_*` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// Normalize two arbitrary corners into a rectangle.
    pub fn from_corners(a: GeoPoint, b: GeoPoint) -> Self {
        Self {
            min_lat: a.latitude.min(b.latitude),
            max_lat: a.latitude.max(b.latitude),
            min_lon: a.longitude.min(b.longitude),
            max_lon: a.longitude.max(b.longitude),
        }
    }

    /// Validate raw corner coordinates and normalize them.
    pub fn from_coords(
        lat1: f64,
        lon1: f64,
        lat2: f64,
        lon2: f64,
    ) -> Result<Self, ValidationError> {
        let a = GeoPoint::new(lat1, lon1)?;
        let b = GeoPoint::new(lat2, lon2)?;
        Ok(Self::from_corners(a, b))
    }

    /// Inclusive containment test.
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        latitude >= self.min_lat
            && latitude <= self.max_lat
            && longitude >= self.min_lon
            && longitude <= self.max_lon
    }

    /// Inclusive containment test for a point.
    pub fn contains_point(&self, point: &GeoPoint) -> bool {
        self.contains(point.latitude, point.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_geo_point_rejects_out_of_range() {
        assert!(GeoPoint::new(90.0, 180.0).is_ok());
        assert!(GeoPoint::new(-90.0, -180.0).is_ok());
        assert!(matches!(
            GeoPoint::new(90.5, 0.0),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert!(matches!(
            GeoPoint::new(0.0, -181.0),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_geo_point_rejects_non_finite() {
        assert!(matches!(
            GeoPoint::new(f64::NAN, 0.0),
            Err(ValidationError::InvalidValue { .. })
        ));
        assert!(GeoPoint::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_bounding_box_normalizes_corners() {
        let a = BoundingBox::from_coords(55.9, 37.9, 55.5, 37.3).expect("valid corners");
        let b = BoundingBox::from_coords(55.5, 37.3, 55.9, 37.9).expect("valid corners");
        assert_eq!(a, b);
        assert_eq!(a.min_lat, 55.5);
        assert_eq!(a.max_lon, 37.9);
    }

    #[test]
    fn test_bounding_box_mixed_corners() {
        let bbox = BoundingBox::from_coords(55.5, 37.9, 55.9, 37.3).expect("valid corners");
        assert!(bbox.contains(55.7558, 37.6173));
    }

    #[test]
    fn test_bounding_box_inclusive_edges() {
        let bbox = BoundingBox::from_coords(10.0, 20.0, 11.0, 21.0).expect("valid corners");
        assert!(bbox.contains(10.0, 20.0));
        assert!(bbox.contains(11.0, 21.0));
        assert!(!bbox.contains(11.000001, 20.5));
    }

    #[test]
    fn test_validate_radius() {
        assert_eq!(validate_radius_km(0.0, 100.0), Ok(0.0));
        assert_eq!(validate_radius_km(100.0, 100.0), Ok(100.0));
        assert!(validate_radius_km(-1.0, 100.0).is_err());
        assert!(validate_radius_km(100.5, 100.0).is_err());
        assert!(validate_radius_km(f64::NAN, 100.0).is_err());
    }

    proptest! {
        #[test]
        fn bounding_box_contains_both_corners(
            lat1 in -90.0f64..=90.0,
            lon1 in -180.0f64..=180.0,
            lat2 in -90.0f64..=90.0,
            lon2 in -180.0f64..=180.0,
        ) {
            let bbox = BoundingBox::from_coords(lat1, lon1, lat2, lon2).unwrap();
            prop_assert!(bbox.contains(lat1, lon1));
            prop_assert!(bbox.contains(lat2, lon2));
            prop_assert_eq!(bbox, BoundingBox::from_coords(lat2, lon2, lat1, lon1).unwrap());
        }
    }
}
