//! Geospatial membership tests over building coordinates.
//!
//! Pure and stateless. Rectangles are inclusive on every edge; radius
//! membership is inclusive at exactly `radius_km`.

use orgdir_core::{BoundingBox, Building, GeoPoint};

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Rectangle and great-circle radius filters.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoFilter;

impl GeoFilter {
    /// Great-circle distance in kilometres (haversine).
    ///
    /// Symmetric: `distance_km(a, b) == distance_km(b, a)` bit for bit.
    pub fn distance_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
        let lat1 = a.latitude.to_radians();
        let lat2 = b.latitude.to_radians();
        let dlat = (b.latitude - a.latitude).abs().to_radians();
        let dlon = (b.longitude - a.longitude).abs().to_radians();

        let h = (dlat / 2.0).sin().powi(2) + cos_product(lat1, lat2) * (dlon / 2.0).sin().powi(2);
        // rounding can push h just outside [0, 1] for antipodal points
        let h = h.clamp(0.0, 1.0);
        let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
        EARTH_RADIUS_KM * c
    }

    /// Inclusive rectangle membership.
    pub fn within_rect(building: &Building, bbox: &BoundingBox) -> bool {
        bbox.contains(building.latitude, building.longitude)
    }

    /// Inclusive radius membership.
    pub fn within_radius(building: &Building, center: &GeoPoint, radius_km: f64) -> bool {
        Self::distance_km(&location(building), center) <= radius_km
    }

    /// Keep the buildings inside `bbox`.
    pub fn filter_rect(buildings: Vec<Building>, bbox: &BoundingBox) -> Vec<Building> {
        buildings
            .into_iter()
            .filter(|b| Self::within_rect(b, bbox))
            .collect()
    }

    /// Keep the buildings within `radius_km` of `center`.
    pub fn filter_radius(buildings: Vec<Building>, center: &GeoPoint, radius_km: f64) -> Vec<Building> {
        buildings
            .into_iter()
            .filter(|b| Self::within_radius(b, center, radius_km))
            .collect()
    }
}

/// `cos(lat1) * cos(lat2)`, evaluated in a fixed operand order.
fn cos_product(lat1: f64, lat2: f64) -> f64 {
    let (lo, hi) = if lat1 <= lat2 { (lat1, lat2) } else { (lat2, lat1) };
    lo.cos() * hi.cos()
}

/// A building's coordinates as a point.
pub fn location(building: &Building) -> GeoPoint {
    GeoPoint {
        latitude: building.latitude,
        longitude: building.longitude,
    }
}
