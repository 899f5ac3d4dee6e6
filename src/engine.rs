//! Discovery orchestration
//!
//! One synchronous pipeline per call: normalize the query, consult the tile
//! cache, and on a miss walk the sources in priority order — spatial index,
//! relational scan, external POI service, venue table — merging each
//! contribution by place identity. Later sources are only invoked while the
//! result is still short of the limit; racing them would waste quota on the
//! paid POI service for no benefit. The cache write is the only operation
//! dispatched without awaiting its completion.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::cache::{CacheEntry, TileCache, TileStore};
use crate::config::PlaceScoutConfig;
use crate::facets::build_facets;
use crate::filters::{NormalizedFilters, build_cache_key};
use crate::geo::{resolve_bounds, sanitize_center, tile_key};
use crate::hydrate::MetadataHydrator;
use crate::merge::{merge_with_fallback, sort_items};
use crate::models::{
    BoundingBox, CacheInfo, Coordinates, DiscoveryItem, DiscoveryQuery, DiscoveryResult,
    FilterSupport, SourceBreakdown, VenueDebug, VenueDiscovery, VenueSummary,
};
use crate::sources::{
    ActivityStore, AdapterOutcome, PoiAdapter, PoiService, RelationalAdapter, ScheduleProvider,
    SchemaCapabilities, SpatialAdapter, SpatialIndex, VenueAdapter, VenueTable, overpass,
    relational, spatial, venues,
};
use crate::{PlaceScoutError, Result};

/// Source names in fallback priority order
const SOURCE_PRIORITY: [&str; 4] = [
    spatial::SOURCE_NAME,
    relational::SOURCE_NAME,
    overpass::SOURCE_NAME,
    venues::SOURCE_NAME,
];

/// Per-call options for activity discovery
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscoveryOptions {
    pub bypass_cache: bool,
}

/// Per-call options for venue discovery
#[derive(Debug, Clone, Copy, Default)]
pub struct VenueOptions {
    pub include_unverified: bool,
    pub bypass_cache: bool,
}

/// A query after clamping and filter normalization
#[derive(Debug, Clone)]
struct NormalizedQuery {
    center: Coordinates,
    radius_meters: f64,
    bounds: BoundingBox,
    limit: usize,
    filters: NormalizedFilters,
}

/// Bookkeeping for one adapter invocation
struct SourceRun {
    source: &'static str,
    support: FilterSupport,
    fatal: Option<String>,
}

impl SourceRun {
    fn record(runs: &mut Vec<SourceRun>, outcome: AdapterOutcome) -> Vec<DiscoveryItem> {
        runs.push(SourceRun {
            source: outcome.source,
            support: outcome.support,
            fatal: outcome.fatal,
        });
        outcome.items
    }
}

pub struct DiscoveryEngine {
    spatial: SpatialAdapter,
    relational: RelationalAdapter,
    poi: PoiAdapter,
    venues: VenueAdapter,
    hydrator: MetadataHydrator,
    cache: TileCache,
    capabilities: Arc<SchemaCapabilities>,
    radius_min_meters: f64,
    radius_max_meters: f64,
    default_limit: usize,
    venue_debug: bool,
}

impl DiscoveryEngine {
    pub fn new(
        config: &PlaceScoutConfig,
        spatial_index: Arc<dyn SpatialIndex>,
        activity_store: Arc<dyn ActivityStore>,
        poi_service: Arc<dyn PoiService>,
        venue_table: Arc<dyn VenueTable>,
        schedules: Arc<dyn ScheduleProvider>,
        tile_store: Arc<dyn TileStore>,
    ) -> Self {
        let capabilities = Arc::new(SchemaCapabilities::new());
        Self {
            spatial: SpatialAdapter::new(spatial_index),
            relational: RelationalAdapter::new(activity_store, capabilities.clone()),
            poi: PoiAdapter::new(
                poi_service,
                config.discovery.poi_radius_cap_meters,
                config.discovery.poi_max_elements,
            ),
            venues: VenueAdapter::new(venue_table, capabilities.clone()),
            hydrator: MetadataHydrator::new(schedules, config.discovery.schedule_lookahead_days),
            cache: TileCache::new(
                tile_store,
                config.cache.ttl_seconds,
                config.cache.max_entries_per_tile,
                config.cache.max_items,
            ),
            capabilities,
            radius_min_meters: config.discovery.radius_min_meters,
            radius_max_meters: config.discovery.radius_max_meters,
            default_limit: config.discovery.default_limit,
            venue_debug: config.discovery.venue_debug,
        }
    }

    /// Capability cache shared by the relational and venue adapters
    #[must_use]
    pub fn capabilities(&self) -> Arc<SchemaCapabilities> {
        self.capabilities.clone()
    }

    /// Discover activities near a point
    ///
    /// Always returns a result once the query normalizes: source failures
    /// degrade the response, they never abort it.
    #[tracing::instrument(name = "discover_activities", level = "debug", skip(self, query, options))]
    pub async fn discover_nearby_activities(
        &self,
        query: &DiscoveryQuery,
        options: &DiscoveryOptions,
    ) -> Result<DiscoveryResult> {
        let nq = self.normalize(query)?;
        let cache_key = build_cache_key(
            "activities",
            &nq.center,
            nq.radius_meters,
            nq.limit,
            &nq.filters,
        );
        let tile = tile_key(&nq.center);
        let now = Utc::now();

        if !options.bypass_cache {
            if let Some(entry) = self.cache.read(&tile, &cache_key, now).await {
                return Ok(result_from_entry(&nq, cache_key, &entry));
            }
        }

        let mut runs: Vec<SourceRun> = Vec::new();

        let outcome = self
            .spatial
            .fetch(&nq.center, nq.radius_meters, nq.limit, &nq.filters)
            .await;
        let mut merged = merge_with_fallback(SourceRun::record(&mut runs, outcome), Vec::new());

        if merged.len() < nq.limit {
            let outcome = self.relational.fetch(&nq.bounds, nq.limit, &nq.center).await;
            merged = merge_with_fallback(merged, SourceRun::record(&mut runs, outcome));
        }
        if merged.len() < nq.limit {
            let outcome = self
                .poi
                .fetch(&nq.center, nq.radius_meters, nq.limit, &nq.filters)
                .await;
            merged = merge_with_fallback(merged, SourceRun::record(&mut runs, outcome));
        }
        if merged.len() < nq.limit {
            let outcome = self
                .venues
                .fetch(&nq.bounds, nq.limit, &nq.center, false)
                .await;
            merged = merge_with_fallback(merged, SourceRun::record(&mut runs, outcome));
        }

        let result = self
            .finalize(&nq, cache_key, &tile, now, merged, runs)
            .await;
        Ok(result)
    }

    /// Discover venues suitable for a named activity near a point
    ///
    /// The activity name is folded into the tag filter; the venue table is
    /// the primary source here, with the POI service as fallback.
    #[tracing::instrument(name = "discover_venues", level = "debug", skip(self, query, options))]
    pub async fn discover_nearby_venues(
        &self,
        query: &DiscoveryQuery,
        activity_name: &str,
        options: &VenueOptions,
    ) -> Result<VenueDiscovery> {
        let mut raw = query.filters.clone();
        let activity_name = activity_name.trim();
        if !activity_name.is_empty() {
            raw.tags.push(activity_name.to_string());
        }
        let query = DiscoveryQuery {
            filters: raw,
            ..query.clone()
        };

        let nq = self.normalize(&query)?;
        // Unverified rows widen the pull, so they get their own key space
        let kind = if options.include_unverified {
            "venues-all"
        } else {
            "venues"
        };
        let cache_key = build_cache_key(kind, &nq.center, nq.radius_meters, nq.limit, &nq.filters);
        let tile = tile_key(&nq.center);
        let now = Utc::now();

        if !options.bypass_cache {
            if let Some(entry) = self.cache.read(&tile, &cache_key, now).await {
                let result = result_from_entry(&nq, cache_key.clone(), &entry);
                return Ok(self.venue_envelope(result, cache_key));
            }
        }

        let mut runs: Vec<SourceRun> = Vec::new();

        let outcome = self
            .venues
            .fetch(&nq.bounds, nq.limit, &nq.center, options.include_unverified)
            .await;
        let mut merged = merge_with_fallback(SourceRun::record(&mut runs, outcome), Vec::new());

        if merged.len() < nq.limit {
            let outcome = self
                .poi
                .fetch(&nq.center, nq.radius_meters, nq.limit, &nq.filters)
                .await;
            merged = merge_with_fallback(merged, SourceRun::record(&mut runs, outcome));
        }

        let result = self
            .finalize(&nq, cache_key.clone(), &tile, now, merged, runs)
            .await;
        Ok(self.venue_envelope(result, cache_key))
    }

    /// Clamp and normalize an incoming query
    fn normalize(&self, query: &DiscoveryQuery) -> Result<NormalizedQuery> {
        let center = sanitize_center(&query.center)?;

        if query.radius_meters.is_nan() {
            return Err(PlaceScoutError::validation(
                "search radius must be a number",
            ));
        }
        let radius_meters = query
            .radius_meters
            .clamp(self.radius_min_meters, self.radius_max_meters);

        let limit = if query.limit == 0 {
            self.default_limit
        } else {
            query.limit.min(self.cache.max_items())
        };

        let clamped = DiscoveryQuery {
            center,
            radius_meters,
            ..query.clone()
        };
        let bounds = resolve_bounds(&clamped);

        Ok(NormalizedQuery {
            center,
            radius_meters,
            bounds,
            limit,
            filters: query.filters.normalize(),
        })
    }

    /// Post-merge pipeline: hydrate, combine support, re-filter, order,
    /// slice, build facets, and dispatch the cache write
    async fn finalize(
        &self,
        nq: &NormalizedQuery,
        cache_key: String,
        tile: &str,
        now: DateTime<Utc>,
        mut merged: Vec<DiscoveryItem>,
        runs: Vec<SourceRun>,
    ) -> DiscoveryResult {
        let hydration_support = self.hydrator.hydrate(&mut merged, now).await;

        // Support is ANDed over sources that actually contributed data used
        // in the response; a source that contributed nothing cannot narrow it
        let sources_present: HashSet<&str> = merged.iter().map(|i| i.source.as_str()).collect();
        let mut support = hydration_support;
        for run in &runs {
            if sources_present.contains(run.source) {
                support = support.and(&run.support);
            }
        }

        let degraded = runs.iter().any(|r| r.fatal.is_some());
        let fallback_error = runs.iter().find_map(|r| r.fatal.clone());

        sort_items(&mut merged);

        let mut items: Vec<DiscoveryItem> = merged
            .iter()
            .filter(|item| nq.filters.matches(item, &support))
            .cloned()
            .collect();
        items.truncate(nq.limit);

        let facets = build_facets(&items);
        let source_breakdown = breakdown_of(&items);
        let source = primary_source(&source_breakdown);

        info!(
            count = items.len(),
            source, degraded, "discovery round-trip complete"
        );

        // Fire-and-forget: a slow or failing cache write must not add
        // latency or failure modes to the caller
        let entry = self.cache.make_entry(
            now,
            merged,
            support,
            source_breakdown.clone(),
            source.to_string(),
        );
        let cache = self.cache.clone();
        let write_tile = tile.to_string();
        let write_key = cache_key.clone();
        tokio::spawn(async move {
            cache.write(&write_tile, &write_key, entry).await;
        });

        DiscoveryResult {
            center: nq.center,
            radius_meters: nq.radius_meters,
            count: items.len(),
            items,
            filter_support: support,
            facets,
            source_breakdown,
            cache: CacheInfo {
                key: cache_key,
                hit: false,
            },
            source: source.to_string(),
            degraded,
            fallback_error,
        }
    }

    fn venue_envelope(&self, result: DiscoveryResult, cache_key: String) -> VenueDiscovery {
        let venues: Vec<VenueSummary> = result.items.iter().map(VenueSummary::from).collect();
        let debug = self.venue_debug.then(|| VenueDebug {
            cache_key,
            per_source: result.source_breakdown.clone(),
        });
        VenueDiscovery {
            result,
            venues,
            debug,
        }
    }
}

/// Serve a response from a cached entry, re-applying the current filters
/// and re-slicing to the current limit
fn result_from_entry(nq: &NormalizedQuery, cache_key: String, entry: &CacheEntry) -> DiscoveryResult {
    let mut items: Vec<DiscoveryItem> = entry
        .items
        .iter()
        .filter(|item| nq.filters.matches(item, &entry.filter_support))
        .cloned()
        .collect();
    sort_items(&mut items);
    items.truncate(nq.limit);

    let facets = build_facets(&items);
    let source_breakdown = breakdown_of(&items);

    debug!(count = items.len(), "serving discovery result from cache");

    DiscoveryResult {
        center: nq.center,
        radius_meters: nq.radius_meters,
        count: items.len(),
        items,
        filter_support: entry.filter_support,
        facets,
        source_breakdown,
        cache: CacheInfo {
            key: cache_key,
            hit: true,
        },
        source: "cache".to_string(),
        degraded: false,
        fallback_error: None,
    }
}

fn breakdown_of(items: &[DiscoveryItem]) -> SourceBreakdown {
    let mut breakdown = SourceBreakdown::new();
    for item in items {
        *breakdown.entry(item.source.clone()).or_default() += 1;
    }
    breakdown
}

/// Highest-priority source that contributed to the final item set
fn primary_source(breakdown: &SourceBreakdown) -> &'static str {
    SOURCE_PRIORITY
        .into_iter()
        .find(|source| breakdown.contains_key(*source))
        .unwrap_or(spatial::SOURCE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_source_follows_priority() {
        let mut breakdown = SourceBreakdown::new();
        breakdown.insert("venues".into(), 3);
        breakdown.insert("activities".into(), 1);
        assert_eq!(primary_source(&breakdown), "activities");

        breakdown.insert("postgis".into(), 5);
        assert_eq!(primary_source(&breakdown), "postgis");

        assert_eq!(primary_source(&SourceBreakdown::new()), "postgis");
    }

    #[test]
    fn test_breakdown_counts_by_source() {
        let item = |source: &str| DiscoveryItem {
            id: "x".into(),
            name: "X".into(),
            venue_label: None,
            place_id: None,
            place_label: None,
            lat: 40.0,
            lng: -73.0,
            distance_meters: 1.0,
            activity_types: None,
            tags: None,
            traits: None,
            taxonomy_categories: None,
            price_levels: None,
            capacity_key: None,
            time_window: None,
            open_now: false,
            source: source.into(),
        };
        let breakdown = breakdown_of(&[item("postgis"), item("postgis"), item("venues")]);
        assert_eq!(breakdown.get("postgis"), Some(&2));
        assert_eq!(breakdown.get("venues"), Some(&1));
    }
}
