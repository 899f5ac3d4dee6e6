//! Unified result item and response envelope types
//!
//! Every source adapter converts its own row shape into [`DiscoveryItem`] at
//! the adapter boundary; nothing downstream of the adapters ever sees a raw
//! backend row.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::facets::Facets;
use crate::filters::{CapacityKey, TimeWindow};
use crate::models::Coordinates;

/// Count of final items contributed per source name
pub type SourceBreakdown = BTreeMap<String, usize>;

/// One discovered activity or venue, normalized across sources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub venue_label: Option<String>,
    #[serde(default)]
    pub place_id: Option<String>,
    #[serde(default)]
    pub place_label: Option<String>,
    pub lat: f64,
    pub lng: f64,
    pub distance_meters: f64,
    #[serde(default)]
    pub activity_types: Option<Vec<String>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub traits: Option<Vec<String>>,
    #[serde(default)]
    pub taxonomy_categories: Option<Vec<String>>,
    #[serde(default)]
    pub price_levels: Option<Vec<u8>>,
    #[serde(default)]
    pub capacity_key: Option<CapacityKey>,
    #[serde(default)]
    pub time_window: Option<TimeWindow>,
    #[serde(default)]
    pub open_now: bool,
    /// Which adapter produced this item ("postgis", "activities", ...)
    pub source: String,
}

impl DiscoveryItem {
    #[must_use]
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lng)
    }

    /// Records with non-finite coordinates are dropped before merge
    #[must_use]
    pub fn has_finite_coordinates(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

/// Per-dimension trust flags for the current result set
///
/// A dimension is `true` only when every contributing source carried the
/// data needed to honor a filter on it. Callers must not treat "no matches"
/// as conclusive for an unsupported dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSupport {
    pub activity_types: bool,
    pub tags: bool,
    pub traits: bool,
    pub taxonomy_categories: bool,
    pub price_levels: bool,
    pub capacity: bool,
    pub time_window: bool,
}

impl FilterSupport {
    /// Every dimension trusted
    #[must_use]
    pub fn full() -> Self {
        Self {
            activity_types: true,
            tags: true,
            traits: true,
            taxonomy_categories: true,
            price_levels: true,
            capacity: true,
            time_window: true,
        }
    }

    /// Logical AND per dimension
    #[must_use]
    pub fn and(&self, other: &Self) -> Self {
        Self {
            activity_types: self.activity_types && other.activity_types,
            tags: self.tags && other.tags,
            traits: self.traits && other.traits,
            taxonomy_categories: self.taxonomy_categories && other.taxonomy_categories,
            price_levels: self.price_levels && other.price_levels,
            capacity: self.capacity && other.capacity,
            time_window: self.time_window && other.time_window,
        }
    }
}

impl Default for FilterSupport {
    fn default() -> Self {
        Self::full()
    }
}

/// Cache outcome attached to a response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheInfo {
    pub key: String,
    pub hit: bool,
}

/// Full discovery response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryResult {
    pub center: Coordinates,
    pub radius_meters: f64,
    pub count: usize,
    pub items: Vec<DiscoveryItem>,
    pub filter_support: FilterSupport,
    pub facets: Facets,
    pub source_breakdown: SourceBreakdown,
    pub cache: CacheInfo,
    /// Highest-priority source that contributed, or "cache" on a hit
    pub source: String,
    #[serde(default)]
    pub degraded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_error: Option<String>,
}

/// Compact venue row for the venue discovery response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueSummary {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue_label: Option<String>,
    pub lat: f64,
    pub lng: f64,
    pub distance_meters: f64,
    pub source: String,
}

impl From<&DiscoveryItem> for VenueSummary {
    fn from(item: &DiscoveryItem) -> Self {
        Self {
            id: item.id.clone(),
            name: item.name.clone(),
            venue_label: item.venue_label.clone(),
            lat: item.lat,
            lng: item.lng,
            distance_meters: item.distance_meters,
            source: item.source.clone(),
        }
    }
}

/// Extra observability payload for venue discovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueDebug {
    pub cache_key: String,
    pub per_source: SourceBreakdown,
}

/// Venue discovery response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueDiscovery {
    pub result: DiscoveryResult,
    pub venues: Vec<VenueSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<VenueDebug>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_support_and() {
        let mut narrowed = FilterSupport::full();
        narrowed.price_levels = false;

        let combined = FilterSupport::full().and(&narrowed);
        assert!(!combined.price_levels);
        assert!(combined.tags);
    }

    #[test]
    fn test_finite_coordinate_check() {
        let item = DiscoveryItem {
            id: "a".into(),
            name: "A".into(),
            venue_label: None,
            place_id: None,
            place_label: None,
            lat: f64::NAN,
            lng: 0.0,
            distance_meters: 0.0,
            activity_types: None,
            tags: None,
            traits: None,
            taxonomy_categories: None,
            price_levels: None,
            capacity_key: None,
            time_window: None,
            open_now: false,
            source: "activities".into(),
        };
        assert!(!item.has_finite_coordinates());
    }
}
