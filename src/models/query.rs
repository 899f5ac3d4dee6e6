//! Inbound query types

use serde::{Deserialize, Serialize};

use crate::filters::RawFilters;

/// Geographic point in decimal degrees (WGS84)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    #[must_use]
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Both components are finite and within WGS84 bounds
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Axis-aligned bounding box; `sw` is the minimum corner, `ne` the maximum
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub sw: Coordinates,
    pub ne: Coordinates,
}

impl BoundingBox {
    #[must_use]
    pub fn contains(&self, point: &Coordinates) -> bool {
        point.lat >= self.sw.lat
            && point.lat <= self.ne.lat
            && point.lng >= self.sw.lng
            && point.lng <= self.ne.lng
    }
}

/// One discovery request before normalization
///
/// When `bounds` is present it is the authoritative search area; otherwise a
/// box is derived from `center` and `radius_meters`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryQuery {
    pub center: Coordinates,
    pub radius_meters: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<BoundingBox>,
    pub limit: usize,
    #[serde(default)]
    pub filters: RawFilters,
}

impl DiscoveryQuery {
    /// Convenience constructor for a radius search with no filters
    #[must_use]
    pub fn around(center: Coordinates, radius_meters: f64, limit: usize) -> Self {
        Self {
            center,
            radius_meters,
            bounds: None,
            limit,
            filters: RawFilters::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinates_validity() {
        assert!(Coordinates::new(40.0, -73.0).is_valid());
        assert!(!Coordinates::new(f64::NAN, -73.0).is_valid());
        assert!(!Coordinates::new(91.0, 0.0).is_valid());
        assert!(!Coordinates::new(0.0, 181.0).is_valid());
    }

    #[test]
    fn test_bounding_box_contains() {
        let bounds = BoundingBox {
            sw: Coordinates::new(39.0, -74.0),
            ne: Coordinates::new(41.0, -72.0),
        };
        assert!(bounds.contains(&Coordinates::new(40.0, -73.0)));
        assert!(!bounds.contains(&Coordinates::new(42.0, -73.0)));
    }
}
