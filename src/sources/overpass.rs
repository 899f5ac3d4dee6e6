//! Third-party POI adapter backed by an Overpass-compatible API
//!
//! Last-but-one fallback, only invoked when the owned sources fall short of
//! the requested limit. Radius and element count are capped before the call
//! goes out, and any failure here degrades the result instead of aborting
//! it: the service is external, rate limited, and strictly best-effort.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::filters::NormalizedFilters;
use crate::geo::haversine_meters;
use crate::models::{Coordinates, DiscoveryItem, FilterSupport};

use super::{AdapterOutcome, PoiElement, PoiQuery, PoiService, StoreError};

pub const SOURCE_NAME: &str = "osm-overpass";

/// Internal activity type → OSM tag selector
const TYPE_SELECTORS: &[(&str, &str)] = &[
    ("park", "leisure=park"),
    ("playground", "leisure=playground"),
    ("climbing", "sport=climbing"),
    ("swimming", "leisure=swimming_pool"),
    ("fitness", "leisure=fitness_centre"),
    ("bowling", "leisure=bowling_alley"),
    ("golf", "leisure=golf_course"),
    ("museum", "tourism=museum"),
    ("gallery", "tourism=gallery"),
    ("cinema", "amenity=cinema"),
    ("theatre", "amenity=theatre"),
    ("cafe", "amenity=cafe"),
    ("restaurant", "amenity=restaurant"),
    ("bar", "amenity=bar"),
];

/// Selectors used when the query carries no activity-type filter
const DEFAULT_SELECTORS: &[&str] = &[
    "leisure=park",
    "leisure=fitness_centre",
    "leisure=swimming_pool",
    "tourism=museum",
    "amenity=cinema",
    "amenity=theatre",
];

/// OSM keys whose values are carried over as internal tags
const TAG_KEYS: &[&str] = &["leisure", "amenity", "sport", "tourism"];

pub struct PoiAdapter {
    service: Arc<dyn PoiService>,
    radius_cap_meters: f64,
    max_elements: usize,
}

impl PoiAdapter {
    #[must_use]
    pub fn new(service: Arc<dyn PoiService>, radius_cap_meters: f64, max_elements: usize) -> Self {
        Self {
            service,
            radius_cap_meters,
            max_elements,
        }
    }

    pub async fn fetch(
        &self,
        center: &Coordinates,
        radius_meters: f64,
        limit: usize,
        filters: &NormalizedFilters,
    ) -> AdapterOutcome {
        let query = PoiQuery {
            center: *center,
            radius_meters: radius_meters.min(self.radius_cap_meters),
            limit: limit.min(self.max_elements),
            selectors: selectors_for(&filters.activity_types),
        };

        match self.service.search(&query).await {
            Ok(elements) => {
                debug!(count = elements.len(), "poi service returned elements");
                let items: Vec<DiscoveryItem> = elements
                    .into_iter()
                    .filter_map(|element| element_to_item(element, center))
                    .collect();
                AdapterOutcome {
                    items,
                    support: poi_support(),
                    source: SOURCE_NAME,
                    fatal: None,
                }
            }
            Err(e) => {
                warn!("poi service failed, continuing without it: {e}");
                AdapterOutcome::failed(SOURCE_NAME, e.to_string())
            }
        }
    }
}

/// POI data carries mappable types and tags but nothing for the
/// schedule-derived dimensions
fn poi_support() -> FilterSupport {
    FilterSupport {
        activity_types: true,
        tags: true,
        traits: false,
        taxonomy_categories: false,
        price_levels: false,
        capacity: false,
        time_window: false,
    }
}

fn selectors_for(activity_types: &[String]) -> Vec<String> {
    let mapped: Vec<String> = activity_types
        .iter()
        .filter_map(|t| {
            TYPE_SELECTORS
                .iter()
                .find(|(internal, _)| internal == t)
                .map(|(_, selector)| (*selector).to_string())
        })
        .collect();

    if mapped.is_empty() {
        DEFAULT_SELECTORS.iter().map(ToString::to_string).collect()
    } else {
        mapped
    }
}

/// Convert one raw element; elements without coordinates are dropped
fn element_to_item(element: PoiElement, center: &Coordinates) -> Option<DiscoveryItem> {
    let lat = element.lat?;
    let lng = element.lng?;
    if !lat.is_finite() || !lng.is_finite() {
        return None;
    }

    let name = element
        .tags
        .get("name")
        .cloned()
        .or_else(|| fallback_name(&element.tags))?;

    let activity_types: Vec<String> = TYPE_SELECTORS
        .iter()
        .filter(|(_, selector)| selector_matches(selector, &element.tags))
        .map(|(internal, _)| (*internal).to_string())
        .collect();

    let mut tags: Vec<String> = TAG_KEYS
        .iter()
        .filter_map(|key| element.tags.get(*key).cloned())
        .collect();
    tags.sort();
    tags.dedup();

    let point = Coordinates::new(lat, lng);
    Some(DiscoveryItem {
        id: format!("osm-{}-{}", element.element_type, element.element_id),
        name,
        venue_label: None,
        place_id: None,
        place_label: None,
        lat,
        lng,
        distance_meters: haversine_meters(center, &point),
        activity_types: (!activity_types.is_empty()).then_some(activity_types),
        tags: (!tags.is_empty()).then_some(tags),
        traits: None,
        taxonomy_categories: None,
        price_levels: None,
        capacity_key: None,
        time_window: None,
        open_now: false,
        source: SOURCE_NAME.to_string(),
    })
}

fn selector_matches(selector: &str, tags: &BTreeMap<String, String>) -> bool {
    selector
        .split_once('=')
        .is_some_and(|(key, value)| tags.get(key).is_some_and(|v| v == value))
}

/// Unnamed elements get a readable label from their feature tag
fn fallback_name(tags: &BTreeMap<String, String>) -> Option<String> {
    TAG_KEYS
        .iter()
        .filter_map(|key| tags.get(*key))
        .next()
        .map(|value| humanize(value))
}

fn humanize(value: &str) -> String {
    value
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// HTTP client for an Overpass-compatible endpoint
pub struct OverpassClient {
    client: Client,
    base_url: String,
    timeout_seconds: u64,
}

impl OverpassClient {
    pub fn new(base_url: &str, timeout_seconds: u64) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .user_agent(concat!("placescout/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StoreError::Unavailable {
                message: format!("failed to build http client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_seconds,
        })
    }

    fn build_query(&self, query: &PoiQuery) -> String {
        let radius = query.radius_meters.round() as i64;
        let mut body = format!("[out:json][timeout:{}];\n(\n", self.timeout_seconds);
        for selector in &query.selectors {
            if let Some((key, value)) = selector.split_once('=') {
                for element in ["node", "way"] {
                    body.push_str(&format!(
                        "  {element}[\"{key}\"=\"{value}\"](around:{radius},{:.6},{:.6});\n",
                        query.center.lat, query.center.lng,
                    ));
                }
            }
        }
        body.push_str(&format!(");\nout center {};\n", query.limit));
        body
    }
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

#[derive(Debug, Deserialize)]
struct OverpassElement {
    #[serde(rename = "type")]
    element_type: String,
    id: i64,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    center: Option<OverpassCenter>,
    #[serde(default)]
    tags: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct OverpassCenter {
    lat: f64,
    lon: f64,
}

#[async_trait]
impl PoiService for OverpassClient {
    async fn search(&self, query: &PoiQuery) -> Result<Vec<PoiElement>, StoreError> {
        let ql = self.build_query(query);
        debug!("querying overpass endpoint {}", self.base_url);

        let response = self
            .client
            .post(&self.base_url)
            .form(&[("data", ql.as_str())])
            .send()
            .await
            .map_err(|e| StoreError::Unavailable {
                message: format!("overpass request failed: {e}"),
            })?;

        if !response.status().is_success() {
            return Err(StoreError::Unavailable {
                message: format!("overpass returned status {}", response.status()),
            });
        }

        let parsed: OverpassResponse = response.json().await.map_err(|e| StoreError::Decode {
            message: format!("failed to parse overpass response: {e}"),
        })?;

        Ok(parsed
            .elements
            .into_iter()
            .map(|element| {
                let (lat, lng) = match (&element.lat, &element.lon, &element.center) {
                    (Some(lat), Some(lon), _) => (Some(*lat), Some(*lon)),
                    (_, _, Some(center)) => (Some(center.lat), Some(center.lon)),
                    _ => (None, None),
                };
                PoiElement {
                    element_type: element.element_type,
                    element_id: element.id,
                    lat,
                    lng,
                    tags: element.tags.unwrap_or_default(),
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(tags: &[(&str, &str)], lat: Option<f64>, lng: Option<f64>) -> PoiElement {
        PoiElement {
            element_type: "node".into(),
            element_id: 42,
            lat,
            lng,
            tags: tags
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_selectors_map_known_types() {
        let selectors = selectors_for(&["climbing".to_string(), "unknown".to_string()]);
        assert_eq!(selectors, vec!["sport=climbing"]);
    }

    #[test]
    fn test_selectors_default_when_unmapped() {
        let selectors = selectors_for(&[]);
        assert_eq!(selectors.len(), DEFAULT_SELECTORS.len());
    }

    #[test]
    fn test_element_mapping_with_name() {
        let center = Coordinates::new(40.0, -73.0);
        let item = element_to_item(
            element(&[("name", "Prospect Park"), ("leisure", "park")], Some(40.01), Some(-73.0)),
            &center,
        )
        .unwrap();

        assert_eq!(item.id, "osm-node-42");
        assert_eq!(item.name, "Prospect Park");
        assert_eq!(item.activity_types.as_deref(), Some(&["park".to_string()][..]));
        assert_eq!(item.tags.as_deref(), Some(&["park".to_string()][..]));
        assert!(item.distance_meters > 0.0);
        assert_eq!(item.source, SOURCE_NAME);
    }

    #[test]
    fn test_element_without_name_uses_feature_tag() {
        let center = Coordinates::new(40.0, -73.0);
        let item = element_to_item(
            element(&[("leisure", "swimming_pool")], Some(40.0), Some(-73.0)),
            &center,
        )
        .unwrap();
        assert_eq!(item.name, "Swimming Pool");
    }

    #[test]
    fn test_element_without_coordinates_is_dropped() {
        let center = Coordinates::new(40.0, -73.0);
        assert!(element_to_item(element(&[("name", "Ghost")], None, None), &center).is_none());
    }

    #[test]
    fn test_build_query_includes_selectors_and_radius() {
        let client = OverpassClient::new("https://overpass.example/api/interpreter", 20).unwrap();
        let ql = client.build_query(&PoiQuery {
            center: Coordinates::new(40.0, -73.0),
            radius_meters: 2000.0,
            limit: 30,
            selectors: vec!["leisure=park".into()],
        });

        assert!(ql.contains("[out:json]"));
        assert!(ql.contains("node[\"leisure\"=\"park\"](around:2000,40.000000,-73.000000);"));
        assert!(ql.contains("way[\"leisure\"=\"park\"]"));
        assert!(ql.contains("out center 30;"));
    }
}
