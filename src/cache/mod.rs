//! Per-tile result caching with TTL and bounded eviction
//!
//! Results are cached per geographic tile under a normalized-query cache
//! key. Expired entries are treated as absent on read and overwritten
//! lazily; a tile's record is pruned oldest-first whenever it exceeds the
//! configured entry bound. Both paths fail soft: a broken cache never
//! breaks a discovery call.

pub mod store;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{DiscoveryItem, FilterSupport, SourceBreakdown};

pub use store::{FjallTileStore, MemoryTileStore, TileStore};

/// One cached discovery result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Unix seconds
    pub cached_at: i64,
    /// Unix seconds
    pub expires_at: i64,
    pub items: Vec<DiscoveryItem>,
    pub filter_support: FilterSupport,
    pub source_breakdown: SourceBreakdown,
    pub source: String,
}

/// All cached entries for one geographic tile
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TileRecord {
    pub entries: BTreeMap<String, CacheEntry>,
}

#[derive(Clone)]
pub struct TileCache {
    store: Arc<dyn TileStore>,
    ttl_seconds: i64,
    max_entries_per_tile: usize,
    max_items: usize,
}

impl TileCache {
    #[must_use]
    pub fn new(
        store: Arc<dyn TileStore>,
        ttl_seconds: i64,
        max_entries_per_tile: usize,
        max_items: usize,
    ) -> Self {
        Self {
            store,
            ttl_seconds,
            max_entries_per_tile,
            max_items,
        }
    }

    /// Largest item count an entry may store; `limit` is clamped to this
    #[must_use]
    pub fn max_items(&self) -> usize {
        self.max_items
    }

    /// Build an entry stamped with the cache TTL, items capped
    #[must_use]
    pub fn make_entry(
        &self,
        now: DateTime<Utc>,
        mut items: Vec<DiscoveryItem>,
        filter_support: FilterSupport,
        source_breakdown: SourceBreakdown,
        source: String,
    ) -> CacheEntry {
        items.truncate(self.max_items);
        CacheEntry {
            cached_at: now.timestamp(),
            expires_at: now.timestamp() + self.ttl_seconds,
            items,
            filter_support,
            source_breakdown,
            source,
        }
    }

    /// Look up a fresh entry; expired or unreadable entries count as misses
    #[tracing::instrument(name = "cache_read", level = "debug", skip(self))]
    pub async fn read(
        &self,
        tile_key: &str,
        cache_key: &str,
        now: DateTime<Utc>,
    ) -> Option<CacheEntry> {
        let record = match self.store.read_tile(tile_key).await {
            Ok(record) => record?,
            Err(e) => {
                warn!("cache read failed, treating as miss: {e}");
                return None;
            }
        };

        let entry = record.entries.get(cache_key)?;
        if entry.expires_at > now.timestamp() {
            debug!("cache hit");
            Some(entry.clone())
        } else {
            debug!("cache entry expired");
            None
        }
    }

    /// Merge an entry into the tile record, prune oldest-first, persist
    ///
    /// Errors are logged and swallowed; callers dispatch this without
    /// awaiting the outcome.
    #[tracing::instrument(name = "cache_write", level = "debug", skip(self, entry))]
    pub async fn write(&self, tile_key: &str, cache_key: &str, entry: CacheEntry) {
        let mut record = match self.store.read_tile(tile_key).await {
            Ok(record) => record.unwrap_or_default(),
            Err(e) => {
                warn!("cache record unreadable before write, starting fresh: {e}");
                TileRecord::default()
            }
        };

        record.entries.insert(cache_key.to_string(), entry);

        while record.entries.len() > self.max_entries_per_tile {
            let oldest = record
                .entries
                .iter()
                .min_by_key(|(key, e)| (e.cached_at, (*key).clone()))
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    debug!("evicting oldest cache entry {key}");
                    record.entries.remove(&key);
                }
                None => break,
            }
        }

        if let Err(e) = self.store.upsert_tile(tile_key, record).await {
            warn!("cache write failed, continuing without caching: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::sources::StoreError;

    fn entry(cached_at: i64, expires_at: i64) -> CacheEntry {
        CacheEntry {
            cached_at,
            expires_at,
            items: vec![],
            filter_support: FilterSupport::full(),
            source_breakdown: SourceBreakdown::default(),
            source: "postgis".into(),
        }
    }

    fn cache(max_entries: usize) -> TileCache {
        TileCache::new(Arc::new(MemoryTileStore::new()), 900, max_entries, 100)
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let cache = cache(10);
        let now = Utc::now();

        cache
            .write("t", "k", entry(now.timestamp() - 10, now.timestamp() - 1))
            .await;
        assert!(cache.read("t", "k", now).await.is_none());

        cache
            .write("t", "k2", entry(now.timestamp(), now.timestamp() + 60))
            .await;
        assert!(cache.read("t", "k2", now).await.is_some());
    }

    #[tokio::test]
    async fn test_eviction_keeps_newest_entries() {
        let bound = 4;
        let cache = cache(bound);
        let now = Utc::now();

        for i in 0..(bound as i64 + 2) {
            cache
                .write(
                    "t",
                    &format!("k{i}"),
                    entry(now.timestamp() + i, now.timestamp() + 600),
                )
                .await;
        }

        for i in 0..2 {
            assert!(
                cache.read("t", &format!("k{i}"), now).await.is_none(),
                "oldest entry k{i} should be evicted"
            );
        }
        for i in 2..(bound as i64 + 2) {
            assert!(
                cache.read("t", &format!("k{i}"), now).await.is_some(),
                "newer entry k{i} should survive"
            );
        }
    }

    #[tokio::test]
    async fn test_broken_store_fails_soft() {
        struct BrokenStore;

        #[async_trait]
        impl TileStore for BrokenStore {
            async fn read_tile(&self, _tile_key: &str) -> Result<Option<TileRecord>, StoreError> {
                Err(StoreError::Unavailable {
                    message: "disk on fire".into(),
                })
            }
            async fn upsert_tile(
                &self,
                _tile_key: &str,
                _record: TileRecord,
            ) -> Result<(), StoreError> {
                Err(StoreError::Unavailable {
                    message: "disk on fire".into(),
                })
            }
        }

        let cache = TileCache::new(Arc::new(BrokenStore), 900, 10, 100);
        let now = Utc::now();

        assert!(cache.read("t", "k", now).await.is_none());
        // Must not panic or propagate
        cache.write("t", "k", entry(now.timestamp(), now.timestamp() + 60)).await;
    }

    #[tokio::test]
    async fn test_make_entry_caps_items() {
        let cache = TileCache::new(Arc::new(MemoryTileStore::new()), 900, 10, 2);
        let now = Utc::now();

        let items = (0..5)
            .map(|i| DiscoveryItem {
                id: format!("{i}"),
                name: format!("Item {i}"),
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
                source: "postgis".into(),
            })
            .collect();

        let entry = cache.make_entry(
            now,
            items,
            FilterSupport::full(),
            SourceBreakdown::default(),
            "postgis".into(),
        );
        assert_eq!(entry.items.len(), 2);
        assert_eq!(entry.expires_at - entry.cached_at, 900);
    }
}
