//! Geographic utilities: distance, tile bucketing, bounds resolution
//!
//! Tile keys intentionally use coarse rounding so that nearby queries share
//! one cache partition instead of creating a cache row per exact coordinate.

use crate::Result;
use crate::error::PlaceScoutError;
use crate::models::{BoundingBox, Coordinates, DiscoveryQuery};

/// Meters per degree of latitude (and of longitude at the equator)
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Tile precision in decimal places (~1.1 km of latitude per step)
const TILE_PRECISION: u32 = 2;

/// Great-circle distance between two points in meters
#[must_use]
pub fn haversine_meters(a: &Coordinates, b: &Coordinates) -> f64 {
    haversine::distance(
        haversine::Location {
            latitude: a.lat,
            longitude: a.lng,
        },
        haversine::Location {
            latitude: b.lat,
            longitude: b.lng,
        },
        haversine::Units::Kilometers,
    ) * 1000.0
}

/// Round a coordinate component to a fixed number of decimal places
#[must_use]
pub fn round_coord(value: f64, precision: u32) -> f64 {
    let multiplier = 10_f64.powi(i32::try_from(precision).unwrap_or(4));
    (value * multiplier).round() / multiplier
}

/// Coarse bucket key for a center point, used to partition the tile cache
#[must_use]
pub fn tile_key(center: &Coordinates) -> String {
    let lat = round_coord(center.lat, TILE_PRECISION);
    let lng = round_coord(center.lng, TILE_PRECISION);
    format!("t:{lat:.2}:{lng:.2}")
}

/// Validate a query center, rejecting non-finite or out-of-range coordinates
pub fn sanitize_center(center: &Coordinates) -> Result<Coordinates> {
    if !center.is_valid() {
        return Err(PlaceScoutError::validation(format!(
            "center coordinates out of range: ({}, {})",
            center.lat, center.lng
        )));
    }
    Ok(*center)
}

/// Resolve the search area for a query
///
/// An explicit `bounds` wins; otherwise a box is derived from the center and
/// radius with an equirectangular approximation. The longitude delta grows
/// with latitude; the cosine is clamped so polar queries stay finite.
#[must_use]
pub fn resolve_bounds(query: &DiscoveryQuery) -> BoundingBox {
    if let Some(bounds) = query.bounds {
        return bounds;
    }
    bounds_from_radius(&query.center, query.radius_meters)
}

/// Bounding box around a center from a radius in meters
#[must_use]
pub fn bounds_from_radius(center: &Coordinates, radius_meters: f64) -> BoundingBox {
    let dlat = radius_meters / METERS_PER_DEGREE;
    let cos_lat = center.lat.to_radians().cos().abs().max(0.01);
    let dlng = radius_meters / (METERS_PER_DEGREE * cos_lat);

    BoundingBox {
        sw: Coordinates::new((center.lat - dlat).max(-90.0), center.lng - dlng),
        ne: Coordinates::new((center.lat + dlat).min(90.0), center.lng + dlng),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_known_distance() {
        // One degree of latitude is roughly 111 km
        let a = Coordinates::new(40.0, -73.0);
        let b = Coordinates::new(41.0, -73.0);
        let d = haversine_meters(&a, &b);
        assert!(d > 110_000.0 && d < 112_000.0, "got {d}");
    }

    #[test]
    fn test_haversine_zero_distance() {
        let a = Coordinates::new(40.0, -73.0);
        assert_eq!(haversine_meters(&a, &a), 0.0);
    }

    #[test]
    fn test_tile_key_buckets_nearby_points() {
        let a = Coordinates::new(40.001, -73.002);
        let b = Coordinates::new(40.004, -73.003);
        assert_eq!(tile_key(&a), tile_key(&b));
        assert_eq!(tile_key(&a), "t:40.00:-73.00");

        let far = Coordinates::new(40.30, -73.00);
        assert_ne!(tile_key(&a), tile_key(&far));
    }

    #[test]
    fn test_bounds_from_radius_contains_center() {
        let center = Coordinates::new(40.0, -73.0);
        let bounds = bounds_from_radius(&center, 2000.0);
        assert!(bounds.contains(&center));
        // ~2km is about 0.018 degrees of latitude
        assert!((bounds.ne.lat - center.lat) > 0.017 && (bounds.ne.lat - center.lat) < 0.019);
        // longitude delta widens away from the equator
        assert!((bounds.ne.lng - center.lng) > (bounds.ne.lat - center.lat));
    }

    #[test]
    fn test_resolve_bounds_prefers_explicit() {
        let explicit = BoundingBox {
            sw: Coordinates::new(10.0, 10.0),
            ne: Coordinates::new(11.0, 11.0),
        };
        let query = DiscoveryQuery {
            bounds: Some(explicit),
            ..DiscoveryQuery::around(Coordinates::new(40.0, -73.0), 2000.0, 20)
        };
        assert_eq!(resolve_bounds(&query), explicit);
    }

    #[test]
    fn test_sanitize_center_rejects_non_finite() {
        let err = sanitize_center(&Coordinates::new(f64::NAN, 0.0));
        assert!(err.is_err());
        let err = sanitize_center(&Coordinates::new(40.0, f64::INFINITY));
        assert!(err.is_err());
    }
}
