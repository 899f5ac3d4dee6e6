//! Filter normalization, cache-key derivation, and filter application
//!
//! Two semantically equal filter sets must normalize to byte-identical
//! serializations — the serialized form is part of the cache key.

use serde::{Deserialize, Serialize};

use crate::models::{Coordinates, DiscoveryItem, FilterSupport};

/// Group-size tier requested by a query or derived for an item
///
/// Variant order doubles as tier order: a venue at a higher tier also
/// accommodates any smaller group.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CapacityKey {
    #[default]
    Any,
    Couple,
    Small,
    Medium,
    Large,
}

impl CapacityKey {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CapacityKey::Any => "any",
            CapacityKey::Couple => "couple",
            CapacityKey::Small => "small",
            CapacityKey::Medium => "medium",
            CapacityKey::Large => "large",
        }
    }

    /// Parse a request parameter; unknown values fall back to `Any`
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "couple" => CapacityKey::Couple,
            "small" => CapacityKey::Small,
            "medium" => CapacityKey::Medium,
            "large" => CapacityKey::Large,
            _ => CapacityKey::Any,
        }
    }
}

/// Time-of-day bucket requested by a query or derived for an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeWindow {
    #[default]
    Any,
    Morning,
    Afternoon,
    Evening,
    Late,
    OpenNow,
}

impl TimeWindow {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeWindow::Any => "any",
            TimeWindow::Morning => "morning",
            TimeWindow::Afternoon => "afternoon",
            TimeWindow::Evening => "evening",
            TimeWindow::Late => "late",
            TimeWindow::OpenNow => "open_now",
        }
    }

    /// Parse a request parameter; unknown values fall back to `Any`
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "morning" => TimeWindow::Morning,
            "afternoon" => TimeWindow::Afternoon,
            "evening" => TimeWindow::Evening,
            "late" => TimeWindow::Late,
            "open_now" => TimeWindow::OpenNow,
            _ => TimeWindow::Any,
        }
    }
}

/// Raw filter request as it arrives from a caller
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawFilters {
    #[serde(default)]
    pub activity_types: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub traits: Vec<String>,
    #[serde(default)]
    pub taxonomy_categories: Vec<String>,
    #[serde(default)]
    pub price_levels: Vec<u8>,
    #[serde(default)]
    pub capacity: Option<CapacityKey>,
    #[serde(default)]
    pub time_window: Option<TimeWindow>,
}

impl RawFilters {
    /// Canonicalize into a sorted, deduplicated, comparable form
    ///
    /// String values are trimmed but case is preserved; only order and
    /// duplicates are collapsed. Idempotent by construction.
    #[must_use]
    pub fn normalize(&self) -> NormalizedFilters {
        NormalizedFilters {
            activity_types: normalize_list(&self.activity_types),
            tags: normalize_list(&self.tags),
            traits: normalize_list(&self.traits),
            taxonomy_categories: normalize_list(&self.taxonomy_categories),
            price_levels: normalize_price_levels(&self.price_levels),
            capacity: self.capacity.unwrap_or_default(),
            time_window: self.time_window.unwrap_or_default(),
        }
    }
}

fn normalize_list(values: &[String]) -> Vec<String> {
    let mut out: Vec<String> = values
        .iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}

fn normalize_price_levels(values: &[u8]) -> Vec<u8> {
    let mut out: Vec<u8> = values
        .iter()
        .copied()
        .filter(|v| (1..=4).contains(v))
        .collect();
    out.sort_unstable();
    out.dedup();
    out
}

/// Canonical filter set; the basis of cache-key equality
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedFilters {
    pub activity_types: Vec<String>,
    pub tags: Vec<String>,
    pub traits: Vec<String>,
    pub taxonomy_categories: Vec<String>,
    pub price_levels: Vec<u8>,
    pub capacity: CapacityKey,
    pub time_window: TimeWindow,
}

impl Default for NormalizedFilters {
    fn default() -> Self {
        RawFilters::default().normalize()
    }
}

impl NormalizedFilters {
    /// No dimension constrains the result set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.activity_types.is_empty()
            && self.tags.is_empty()
            && self.traits.is_empty()
            && self.taxonomy_categories.is_empty()
            && self.price_levels.is_empty()
            && self.capacity == CapacityKey::Any
            && self.time_window == TimeWindow::Any
    }

    /// Deterministic serialization used inside cache keys
    #[must_use]
    pub fn serialize_key_part(&self) -> String {
        let price: Vec<String> = self.price_levels.iter().map(u8::to_string).collect();
        format!(
            "at={};tg={};tr={};cat={};pl={};cap={};tw={}",
            self.activity_types.join(","),
            self.tags.join(","),
            self.traits.join(","),
            self.taxonomy_categories.join(","),
            price.join(","),
            self.capacity.as_str(),
            self.time_window.as_str(),
        )
    }

    /// Does `item` satisfy this filter set?
    ///
    /// An empty dimension always passes. A populated dimension requires an
    /// intersection when the item carries data for it; an item missing the
    /// data is excluded only when the dimension is supported — when a
    /// contributing source could not provide the column, items are kept
    /// rather than silently filtered on data that was never read.
    #[must_use]
    pub fn matches(&self, item: &DiscoveryItem, support: &FilterSupport) -> bool {
        if !list_matches(
            &self.activity_types,
            item.activity_types.as_deref(),
            support.activity_types,
        ) {
            return false;
        }
        if !list_matches(&self.tags, item.tags.as_deref(), support.tags) {
            return false;
        }
        if !list_matches(&self.traits, item.traits.as_deref(), support.traits) {
            return false;
        }
        if !list_matches(
            &self.taxonomy_categories,
            item.taxonomy_categories.as_deref(),
            support.taxonomy_categories,
        ) {
            return false;
        }

        if !self.price_levels.is_empty() {
            match item.price_levels.as_deref() {
                Some(levels) if !levels.is_empty() => {
                    if !self.price_levels.iter().any(|p| levels.contains(p)) {
                        return false;
                    }
                }
                _ => {
                    if support.price_levels {
                        return false;
                    }
                }
            }
        }

        if self.capacity != CapacityKey::Any {
            match item.capacity_key {
                Some(cap) => {
                    if cap < self.capacity {
                        return false;
                    }
                }
                None => {
                    if support.capacity {
                        return false;
                    }
                }
            }
        }

        match self.time_window {
            TimeWindow::Any => {}
            TimeWindow::OpenNow => {
                if !item.open_now && support.time_window {
                    return false;
                }
            }
            wanted => match item.time_window {
                Some(window) => {
                    if window != wanted && window != TimeWindow::OpenNow {
                        return false;
                    }
                }
                None => {
                    if support.time_window {
                        return false;
                    }
                }
            },
        }

        true
    }
}

fn list_matches(wanted: &[String], have: Option<&[String]>, supported: bool) -> bool {
    if wanted.is_empty() {
        return true;
    }
    match have {
        Some(values) if !values.is_empty() => wanted.iter().any(|w| values.iter().any(|v| v == w)),
        _ => !supported,
    }
}

/// Deterministic cache key for one semantic query
///
/// Center is rounded to 6 decimal places, radius to whole meters; the
/// normalized filter serialization keeps semantically equal queries on the
/// same key and any differing field on a different one.
#[must_use]
pub fn build_cache_key(
    kind: &str,
    center: &Coordinates,
    radius_meters: f64,
    limit: usize,
    filters: &NormalizedFilters,
) -> String {
    format!(
        "{kind}|{:.6}|{:.6}|{:.0}|{limit}|{}",
        center.lat,
        center.lng,
        radius_meters,
        filters.serialize_key_part(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn raw(types: &[&str], tags: &[&str]) -> RawFilters {
        RawFilters {
            activity_types: types.iter().map(ToString::to_string).collect(),
            tags: tags.iter().map(ToString::to_string).collect(),
            ..RawFilters::default()
        }
    }

    fn item_with(types: Option<Vec<&str>>, tags: Option<Vec<&str>>) -> DiscoveryItem {
        DiscoveryItem {
            id: "x".into(),
            name: "X".into(),
            venue_label: None,
            place_id: None,
            place_label: None,
            lat: 40.0,
            lng: -73.0,
            distance_meters: 100.0,
            activity_types: types.map(|v| v.iter().map(ToString::to_string).collect()),
            tags: tags.map(|v| v.iter().map(ToString::to_string).collect()),
            traits: None,
            taxonomy_categories: None,
            price_levels: None,
            capacity_key: None,
            time_window: None,
            open_now: false,
            source: "activities".into(),
        }
    }

    #[test]
    fn test_normalize_sorts_and_dedupes() {
        let normalized = raw(&["hiking", "climbing", "hiking", "  climbing  "], &[]).normalize();
        assert_eq!(normalized.activity_types, vec!["climbing", "hiking"]);
    }

    #[test]
    fn test_normalize_preserves_case() {
        let normalized = raw(&[], &["Rooftop", "rooftop"]).normalize();
        assert_eq!(normalized.tags, vec!["Rooftop", "rooftop"]);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let first = raw(&["b", "a", "a"], &["z", "y"]).normalize();
        let again = RawFilters {
            activity_types: first.activity_types.clone(),
            tags: first.tags.clone(),
            traits: first.traits.clone(),
            taxonomy_categories: first.taxonomy_categories.clone(),
            price_levels: first.price_levels.clone(),
            capacity: Some(first.capacity),
            time_window: Some(first.time_window),
        }
        .normalize();
        assert_eq!(first, again);
    }

    #[test]
    fn test_normalize_is_order_independent() {
        let a = raw(&["climbing", "hiking", "swimming"], &["indoor"]).normalize();
        let b = raw(&["swimming", "climbing", "hiking"], &["indoor"]).normalize();
        assert_eq!(a, b);
        assert_eq!(a.serialize_key_part(), b.serialize_key_part());
    }

    #[test]
    fn test_price_levels_clamped_and_sorted() {
        let normalized = RawFilters {
            price_levels: vec![4, 2, 9, 2, 0],
            ..RawFilters::default()
        }
        .normalize();
        assert_eq!(normalized.price_levels, vec![2, 4]);
    }

    #[test]
    fn test_cache_key_ignores_input_order() {
        let center = Coordinates::new(40.0, -73.0);
        let a = raw(&["hiking", "climbing"], &[]).normalize();
        let b = raw(&["climbing", "hiking"], &[]).normalize();
        assert_eq!(
            build_cache_key("activities", &center, 2000.0, 20, &a),
            build_cache_key("activities", &center, 2000.0, 20, &b),
        );
    }

    #[rstest]
    #[case(2000.0, 2500.0)]
    #[case(2000.0, 2001.0)]
    fn test_cache_key_differs_by_radius(#[case] r1: f64, #[case] r2: f64) {
        let center = Coordinates::new(40.0, -73.0);
        let filters = NormalizedFilters::default();
        let k1 = build_cache_key("activities", &center, r1, 20, &filters);
        let k2 = build_cache_key("activities", &center, r2, 20, &filters);
        assert_ne!(k1, k2);
    }

    #[test]
    fn test_cache_key_differs_by_kind() {
        let center = Coordinates::new(40.0, -73.0);
        let filters = NormalizedFilters::default();
        assert_ne!(
            build_cache_key("activities", &center, 2000.0, 20, &filters),
            build_cache_key("venues", &center, 2000.0, 20, &filters),
        );
    }

    #[test]
    fn test_matches_requires_intersection() {
        let filters = raw(&["climbing"], &[]).normalize();
        let support = FilterSupport::full();

        assert!(filters.matches(&item_with(Some(vec!["climbing", "bouldering"]), None), &support));
        assert!(!filters.matches(&item_with(Some(vec!["hiking"]), None), &support));
    }

    #[test]
    fn test_matches_missing_data_depends_on_support() {
        let filters = raw(&["climbing"], &[]).normalize();

        // Supported dimension: item without data is excluded
        assert!(!filters.matches(&item_with(None, None), &FilterSupport::full()));

        // Unsupported dimension: item is conservatively kept
        let mut support = FilterSupport::full();
        support.activity_types = false;
        assert!(filters.matches(&item_with(None, None), &support));
    }

    #[test]
    fn test_capacity_matches_equal_or_larger_tier() {
        let filters = RawFilters {
            capacity: Some(CapacityKey::Small),
            ..RawFilters::default()
        }
        .normalize();
        let support = FilterSupport::full();

        let mut item = item_with(None, None);
        item.capacity_key = Some(CapacityKey::Large);
        assert!(filters.matches(&item, &support));

        item.capacity_key = Some(CapacityKey::Couple);
        assert!(!filters.matches(&item, &support));
    }

    #[test]
    fn test_open_now_filter() {
        let filters = RawFilters {
            time_window: Some(TimeWindow::OpenNow),
            ..RawFilters::default()
        }
        .normalize();
        let support = FilterSupport::full();

        let mut item = item_with(None, None);
        assert!(!filters.matches(&item, &support));
        item.open_now = true;
        assert!(filters.matches(&item, &support));
    }
}
