//! Relational fallback adapter
//!
//! Scans a bounding box over the general-purpose activities table. The
//! target schema evolves independently of this service, so the select list
//! is negotiated: when the store reports a missing optional column (or a
//! missing traits relation), that column is dropped, the dimension is marked
//! unsupported for the call, and the query is retried within a small fixed
//! attempt budget. Discovered gaps are remembered in [`SchemaCapabilities`]
//! so later calls skip them up front.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::geo::haversine_meters;
use crate::models::{BoundingBox, Coordinates, DiscoveryItem, FilterSupport};

use super::{
    ActivityQuery, ActivityRow, ActivityStore, AdapterOutcome, OptionalColumn, SchemaCapabilities,
    StoreError,
};

pub const SOURCE_NAME: &str = "activities";

/// Bounded retries against a schema that may simply never have the column
const MAX_ATTEMPTS: usize = 4;

pub struct RelationalAdapter {
    store: Arc<dyn ActivityStore>,
    capabilities: Arc<SchemaCapabilities>,
}

impl RelationalAdapter {
    #[must_use]
    pub fn new(store: Arc<dyn ActivityStore>, capabilities: Arc<SchemaCapabilities>) -> Self {
        Self {
            store,
            capabilities,
        }
    }

    pub async fn fetch(
        &self,
        bounds: &BoundingBox,
        limit: usize,
        center: &Coordinates,
    ) -> AdapterOutcome {
        let mut columns = self.capabilities.activity_columns();
        let mut include_traits = self.capabilities.traits_relation_available();

        for _attempt in 0..MAX_ATTEMPTS {
            let query = ActivityQuery {
                bounds: *bounds,
                limit,
                columns: columns.clone(),
                include_traits,
            };

            match self.store.activities_in_bounds(&query).await {
                Ok(rows) => {
                    debug!(count = rows.len(), "activities scan returned rows");
                    let items = rows
                        .into_iter()
                        .map(|row| row_to_item(row, center))
                        .collect();
                    return AdapterOutcome {
                        items,
                        support: support_for(&columns, include_traits),
                        source: SOURCE_NAME,
                        fatal: None,
                    };
                }
                Err(StoreError::MissingColumn { column }) => {
                    match OptionalColumn::from_column_name(&column) {
                        Some(col) if columns.contains(&col) => {
                            warn!("activities table lacks column '{column}', retrying without it");
                            columns.retain(|c| *c != col);
                            self.capabilities.mark_activity_column_missing(col);
                        }
                        _ => {
                            // A required column is gone; nothing to narrow
                            return AdapterOutcome::failed(
                                SOURCE_NAME,
                                format!("activities table missing required column '{column}'"),
                            );
                        }
                    }
                }
                Err(StoreError::MissingRelation { relation }) if include_traits => {
                    warn!("traits relation '{relation}' unavailable, retrying without join");
                    include_traits = false;
                    self.capabilities.mark_traits_relation_missing();
                }
                Err(e) => {
                    warn!("activities scan failed: {e}");
                    return AdapterOutcome::failed(SOURCE_NAME, e.to_string());
                }
            }
        }

        warn!("activities scan exhausted its retry budget");
        AdapterOutcome::failed(SOURCE_NAME, "activities scan retry budget exhausted".into())
    }
}

fn support_for(columns: &[OptionalColumn], include_traits: bool) -> FilterSupport {
    let mut support = FilterSupport::full();
    for column in OptionalColumn::ALL {
        if !columns.contains(&column) {
            match column {
                OptionalColumn::ActivityTypes => support.activity_types = false,
                OptionalColumn::Tags => support.tags = false,
                OptionalColumn::TaxonomyCategories => support.taxonomy_categories = false,
                OptionalColumn::PriceLevels => support.price_levels = false,
            }
        }
    }
    if !include_traits {
        support.traits = false;
    }
    support
}

fn row_to_item(row: ActivityRow, center: &Coordinates) -> DiscoveryItem {
    let point = Coordinates::new(row.lat, row.lng);
    DiscoveryItem {
        id: row.id,
        name: row.name,
        venue_label: row.venue_label,
        place_id: row.place_id,
        place_label: row.place_label,
        lat: row.lat,
        lng: row.lng,
        distance_meters: haversine_meters(center, &point),
        activity_types: row.activity_types,
        tags: row.tags,
        traits: row.traits,
        taxonomy_categories: row.taxonomy_categories,
        price_levels: row.price_levels,
        capacity_key: None,
        time_window: None,
        open_now: false,
        source: SOURCE_NAME.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::models::Coordinates;

    /// Store whose schema lacks a configurable set of columns; records every
    /// query it receives.
    struct PartialSchemaStore {
        missing: Vec<OptionalColumn>,
        traits_relation: bool,
        queries: Mutex<Vec<ActivityQuery>>,
    }

    #[async_trait]
    impl ActivityStore for PartialSchemaStore {
        async fn activities_in_bounds(
            &self,
            query: &ActivityQuery,
        ) -> Result<Vec<ActivityRow>, StoreError> {
            self.queries.lock().unwrap().push(query.clone());

            if query.include_traits && !self.traits_relation {
                return Err(StoreError::MissingRelation {
                    relation: "activity_traits".into(),
                });
            }
            for column in &query.columns {
                if self.missing.contains(column) {
                    return Err(StoreError::MissingColumn {
                        column: column.column_name().into(),
                    });
                }
            }
            Ok(vec![ActivityRow {
                id: "row-1".into(),
                name: "Climbing Gym".into(),
                lat: 40.001,
                lng: -73.001,
                activity_types: Some(vec!["climbing".into()]),
                ..ActivityRow::default()
            }])
        }
    }

    fn bounds() -> BoundingBox {
        BoundingBox {
            sw: Coordinates::new(39.9, -73.1),
            ne: Coordinates::new(40.1, -72.9),
        }
    }

    #[tokio::test]
    async fn test_missing_column_dropped_and_marked_unsupported() {
        let store = Arc::new(PartialSchemaStore {
            missing: vec![OptionalColumn::PriceLevels],
            traits_relation: true,
            queries: Mutex::new(Vec::new()),
        });
        let caps = Arc::new(SchemaCapabilities::new());
        let adapter = RelationalAdapter::new(store.clone(), caps);

        let outcome = adapter
            .fetch(&bounds(), 20, &Coordinates::new(40.0, -73.0))
            .await;

        assert_eq!(outcome.items.len(), 1);
        assert!(!outcome.support.price_levels);
        assert!(outcome.support.tags);
        assert!(outcome.fatal.is_none());
        assert_eq!(store.queries.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_capability_cache_skips_known_missing_columns() {
        let store = Arc::new(PartialSchemaStore {
            missing: vec![OptionalColumn::PriceLevels],
            traits_relation: true,
            queries: Mutex::new(Vec::new()),
        });
        let caps = Arc::new(SchemaCapabilities::new());
        let adapter = RelationalAdapter::new(store.clone(), caps);
        let center = Coordinates::new(40.0, -73.0);

        adapter.fetch(&bounds(), 20, &center).await;
        adapter.fetch(&bounds(), 20, &center).await;

        let queries = store.queries.lock().unwrap();
        // First call probes and retries; second call goes straight through
        assert_eq!(queries.len(), 3);
        assert!(!queries[2].columns.contains(&OptionalColumn::PriceLevels));
    }

    #[tokio::test]
    async fn test_missing_relation_drops_join() {
        let store = Arc::new(PartialSchemaStore {
            missing: vec![],
            traits_relation: false,
            queries: Mutex::new(Vec::new()),
        });
        let caps = Arc::new(SchemaCapabilities::new());
        let adapter = RelationalAdapter::new(store, caps);

        let outcome = adapter
            .fetch(&bounds(), 20, &Coordinates::new(40.0, -73.0))
            .await;
        assert_eq!(outcome.items.len(), 1);
        assert!(!outcome.support.traits);
        assert!(outcome.support.tags);
    }

    #[tokio::test]
    async fn test_unavailable_store_degrades_with_fatal() {
        struct DownStore;

        #[async_trait]
        impl ActivityStore for DownStore {
            async fn activities_in_bounds(
                &self,
                _query: &ActivityQuery,
            ) -> Result<Vec<ActivityRow>, StoreError> {
                Err(StoreError::Unavailable {
                    message: "connection refused".into(),
                })
            }
        }

        let adapter = RelationalAdapter::new(Arc::new(DownStore), Arc::new(SchemaCapabilities::new()));
        let outcome = adapter
            .fetch(&bounds(), 20, &Coordinates::new(40.0, -73.0))
            .await;
        assert!(outcome.items.is_empty());
        assert_eq!(outcome.support, FilterSupport::full());
        assert!(outcome.fatal.is_some());
    }
}
