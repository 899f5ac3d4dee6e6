//! Facet histograms over the final result set
//!
//! Facets are always computed fresh per response so they reflect exactly
//! what the caller can select next; they are never cached independently of
//! the item list.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::DiscoveryItem;

/// One value of a filterable dimension and how many final items carry it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetCount {
    pub value: String,
    pub count: usize,
}

/// Value→count histograms per filterable dimension
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Facets {
    pub activity_types: Vec<FacetCount>,
    pub tags: Vec<FacetCount>,
    pub traits: Vec<FacetCount>,
    pub taxonomy_categories: Vec<FacetCount>,
    pub price_levels: Vec<FacetCount>,
    pub capacity: Vec<FacetCount>,
    pub time_windows: Vec<FacetCount>,
}

/// Build facets over an already-filtered item list
#[must_use]
pub fn build_facets(items: &[DiscoveryItem]) -> Facets {
    let mut activity_types: BTreeMap<String, usize> = BTreeMap::new();
    let mut tags: BTreeMap<String, usize> = BTreeMap::new();
    let mut traits: BTreeMap<String, usize> = BTreeMap::new();
    let mut taxonomy: BTreeMap<String, usize> = BTreeMap::new();
    let mut prices: BTreeMap<String, usize> = BTreeMap::new();
    let mut capacity: BTreeMap<String, usize> = BTreeMap::new();
    let mut windows: BTreeMap<String, usize> = BTreeMap::new();

    for item in items {
        count_values(&mut activity_types, item.activity_types.as_deref());
        count_values(&mut tags, item.tags.as_deref());
        count_values(&mut traits, item.traits.as_deref());
        count_values(&mut taxonomy, item.taxonomy_categories.as_deref());

        if let Some(levels) = &item.price_levels {
            for level in levels {
                *prices.entry(level.to_string()).or_default() += 1;
            }
        }
        if let Some(cap) = item.capacity_key {
            *capacity.entry(cap.as_str().to_string()).or_default() += 1;
        }
        if let Some(window) = item.time_window {
            *windows.entry(window.as_str().to_string()).or_default() += 1;
        }
    }

    Facets {
        activity_types: into_sorted(activity_types),
        tags: into_sorted(tags),
        traits: into_sorted(traits),
        taxonomy_categories: into_sorted(taxonomy),
        price_levels: into_sorted(prices),
        capacity: into_sorted(capacity),
        time_windows: into_sorted(windows),
    }
}

fn count_values(histogram: &mut BTreeMap<String, usize>, values: Option<&[String]>) {
    if let Some(values) = values {
        for value in values {
            *histogram.entry(value.clone()).or_default() += 1;
        }
    }
}

/// Count descending, then value ascending
fn into_sorted(histogram: BTreeMap<String, usize>) -> Vec<FacetCount> {
    let mut out: Vec<FacetCount> = histogram
        .into_iter()
        .map(|(value, count)| FacetCount { value, count })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item_with_tags(tags: &[&str]) -> DiscoveryItem {
        DiscoveryItem {
            id: "x".into(),
            name: "X".into(),
            venue_label: None,
            place_id: None,
            place_label: None,
            lat: 40.0,
            lng: -73.0,
            distance_meters: 1.0,
            activity_types: None,
            tags: Some(tags.iter().map(ToString::to_string).collect()),
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
    fn test_facets_count_and_order() {
        let items = vec![
            item_with_tags(&["outdoor", "family"]),
            item_with_tags(&["outdoor"]),
            item_with_tags(&["indoor"]),
        ];
        let facets = build_facets(&items);

        assert_eq!(
            facets.tags,
            vec![
                FacetCount { value: "outdoor".into(), count: 2 },
                FacetCount { value: "family".into(), count: 1 },
                FacetCount { value: "indoor".into(), count: 1 },
            ]
        );
    }

    #[test]
    fn test_facets_empty_input() {
        let facets = build_facets(&[]);
        assert!(facets.tags.is_empty());
        assert!(facets.price_levels.is_empty());
    }
}
