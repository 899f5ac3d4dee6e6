//! Secondary venue-table adapter
//!
//! Last-resort source: a simpler venue table read within the bounding box,
//! with the same missing-column negotiation as the activities scan. Venues
//! explicitly marked unverified are excluded unless the caller opts in.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::filters::CapacityKey;
use crate::geo::haversine_meters;
use crate::hydrate::capacity_tier;
use crate::models::{BoundingBox, Coordinates, DiscoveryItem, FilterSupport};

use super::{
    AdapterOutcome, SchemaCapabilities, StoreError, VenueColumn, VenueQuery, VenueRow, VenueTable,
};

pub const SOURCE_NAME: &str = "venues";

const MAX_ATTEMPTS: usize = 4;

pub struct VenueAdapter {
    table: Arc<dyn VenueTable>,
    capabilities: Arc<SchemaCapabilities>,
}

impl VenueAdapter {
    #[must_use]
    pub fn new(table: Arc<dyn VenueTable>, capabilities: Arc<SchemaCapabilities>) -> Self {
        Self {
            table,
            capabilities,
        }
    }

    pub async fn fetch(
        &self,
        bounds: &BoundingBox,
        limit: usize,
        center: &Coordinates,
        include_unverified: bool,
    ) -> AdapterOutcome {
        let mut columns = self.capabilities.venue_columns();

        for _attempt in 0..MAX_ATTEMPTS {
            let query = VenueQuery {
                bounds: *bounds,
                limit,
                columns: columns.clone(),
            };

            match self.table.venues_in_bounds(&query).await {
                Ok(rows) => {
                    debug!(count = rows.len(), "venue table returned rows");
                    let items = rows
                        .into_iter()
                        .filter(|row| include_unverified || row.verified != Some(false))
                        .map(|row| row_to_item(row, center))
                        .collect();
                    return AdapterOutcome {
                        items,
                        support: support_for(&columns),
                        source: SOURCE_NAME,
                        fatal: None,
                    };
                }
                Err(StoreError::MissingColumn { column }) => {
                    match VenueColumn::from_column_name(&column) {
                        Some(col) if columns.contains(&col) => {
                            warn!("venue table lacks column '{column}', retrying without it");
                            columns.retain(|c| *c != col);
                            self.capabilities.mark_venue_column_missing(col);
                        }
                        _ => {
                            return AdapterOutcome::failed(
                                SOURCE_NAME,
                                format!("venue table missing required column '{column}'"),
                            );
                        }
                    }
                }
                Err(e) => {
                    warn!("venue table scan failed: {e}");
                    return AdapterOutcome::failed(SOURCE_NAME, e.to_string());
                }
            }
        }

        warn!("venue table scan exhausted its retry budget");
        AdapterOutcome::failed(SOURCE_NAME, "venue table retry budget exhausted".into())
    }
}

/// Venue rows carry tags and a capacity but nothing for the other dimensions
fn support_for(columns: &[VenueColumn]) -> FilterSupport {
    FilterSupport {
        activity_types: false,
        tags: columns.contains(&VenueColumn::Tags),
        traits: false,
        taxonomy_categories: false,
        price_levels: false,
        capacity: columns.contains(&VenueColumn::Capacity),
        time_window: false,
    }
}

fn row_to_item(row: VenueRow, center: &Coordinates) -> DiscoveryItem {
    let point = Coordinates::new(row.lat, row.lng);
    let capacity_key: Option<CapacityKey> = row.capacity.map(capacity_tier);

    DiscoveryItem {
        id: row.id,
        name: row.name,
        venue_label: row.place_label.clone(),
        place_id: row.place_id,
        place_label: row.place_label,
        lat: row.lat,
        lng: row.lng,
        distance_meters: haversine_meters(center, &point),
        activity_types: None,
        tags: row.tags,
        traits: None,
        taxonomy_categories: None,
        price_levels: None,
        capacity_key,
        time_window: None,
        open_now: false,
        source: SOURCE_NAME.to_string(),
    }
}
