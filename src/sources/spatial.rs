//! Primary spatial-index adapter
//!
//! First source tried on every call: a nearest-neighbor procedure that takes
//! center/radius/limit and honors activity-type and tag filters natively.
//! On any procedure error the adapter logs and degrades to an empty result
//! with full filter support, so the fallback sources are still trusted.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::filters::NormalizedFilters;
use crate::geo::haversine_meters;
use crate::models::{Coordinates, DiscoveryItem};

use super::{AdapterOutcome, SpatialHit, SpatialIndex, SpatialQuery};

pub const SOURCE_NAME: &str = "postgis";

pub struct SpatialAdapter {
    index: Arc<dyn SpatialIndex>,
}

impl SpatialAdapter {
    #[must_use]
    pub fn new(index: Arc<dyn SpatialIndex>) -> Self {
        Self { index }
    }

    pub async fn fetch(
        &self,
        center: &Coordinates,
        radius_meters: f64,
        limit: usize,
        filters: &NormalizedFilters,
    ) -> AdapterOutcome {
        let query = SpatialQuery {
            center: *center,
            radius_meters,
            limit,
            activity_types: filters.activity_types.clone(),
            tags: filters.tags.clone(),
        };

        match self.index.nearest(&query).await {
            Ok(hits) => {
                debug!(count = hits.len(), "spatial index returned hits");
                let items = hits
                    .into_iter()
                    .map(|hit| hit_to_item(hit, center))
                    .collect();
                AdapterOutcome {
                    items,
                    support: crate::models::FilterSupport::full(),
                    source: SOURCE_NAME,
                    fatal: None,
                }
            }
            Err(e) => {
                warn!("spatial index unavailable, falling back: {e}");
                AdapterOutcome::empty(SOURCE_NAME)
            }
        }
    }
}

fn hit_to_item(hit: SpatialHit, center: &Coordinates) -> DiscoveryItem {
    let point = Coordinates::new(hit.lat, hit.lng);
    let distance_meters = hit
        .distance_meters
        .unwrap_or_else(|| haversine_meters(center, &point));

    DiscoveryItem {
        id: hit.id,
        name: hit.name,
        venue_label: hit.venue_label,
        place_id: hit.place_id,
        place_label: hit.place_label,
        lat: hit.lat,
        lng: hit.lng,
        distance_meters,
        activity_types: hit.activity_types,
        tags: hit.tags,
        traits: hit.traits,
        taxonomy_categories: None,
        price_levels: None,
        capacity_key: None,
        time_window: None,
        open_now: false,
        source: SOURCE_NAME.to_string(),
    }
}
