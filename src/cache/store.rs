//! Tile record persistence
//!
//! One record per geographic tile, keyed by the tile key. The production
//! store is an fjall keyspace with postcard-encoded records; the in-memory
//! store backs tests and cache-less deployments.

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use async_trait::async_trait;
use fjall::Keyspace;
use tokio::task;

use crate::error::PlaceScoutError;
use crate::sources::StoreError;

use super::TileRecord;

/// Key-value-per-tile persistence port
#[async_trait]
pub trait TileStore: Send + Sync {
    async fn read_tile(&self, tile_key: &str) -> Result<Option<TileRecord>, StoreError>;
    async fn upsert_tile(&self, tile_key: &str, record: TileRecord) -> Result<(), StoreError>;
}

/// Persistent tile store on an fjall keyspace
pub struct FjallTileStore {
    store: Keyspace,
}

impl FjallTileStore {
    pub fn open(path: impl AsRef<Path>) -> crate::Result<Self> {
        let db = fjall::Database::builder(&path)
            .open()
            .map_err(|e| PlaceScoutError::cache(format!("failed to open cache database: {e}")))?;
        let store = db
            .keyspace("tiles", fjall::KeyspaceCreateOptions::default)
            .map_err(|e| PlaceScoutError::cache(format!("failed to open tiles keyspace: {e}")))?;
        Ok(Self { store })
    }
}

#[async_trait]
impl TileStore for FjallTileStore {
    async fn read_tile(&self, tile_key: &str) -> Result<Option<TileRecord>, StoreError> {
        let store = self.store.clone();
        let key = tile_key.as_bytes().to_vec();

        let maybe_bytes = task::spawn_blocking(move || {
            store.get(key).map(|value| value.map(|v| v.to_vec()))
        })
        .await
        .map_err(|e| StoreError::Unavailable {
            message: format!("cache read task failed: {e}"),
        })?
        .map_err(|e| StoreError::Unavailable {
            message: format!("cache read failed: {e}"),
        })?;

        match maybe_bytes {
            Some(bytes) => postcard::from_bytes(&bytes).map(Some).map_err(|e| {
                StoreError::Decode {
                    message: format!("failed to decode tile record: {e}"),
                }
            }),
            None => Ok(None),
        }
    }

    async fn upsert_tile(&self, tile_key: &str, record: TileRecord) -> Result<(), StoreError> {
        let store = self.store.clone();
        let key = tile_key.as_bytes().to_vec();
        let bytes = postcard::to_stdvec(&record).map_err(|e| StoreError::Decode {
            message: format!("failed to encode tile record: {e}"),
        })?;

        task::spawn_blocking(move || store.insert(key, bytes))
            .await
            .map_err(|e| StoreError::Unavailable {
                message: format!("cache write task failed: {e}"),
            })?
            .map_err(|e| StoreError::Unavailable {
                message: format!("cache write failed: {e}"),
            })?;
        Ok(())
    }
}

/// In-memory tile store
#[derive(Debug, Default)]
pub struct MemoryTileStore {
    tiles: RwLock<HashMap<String, TileRecord>>,
}

impl MemoryTileStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TileStore for MemoryTileStore {
    async fn read_tile(&self, tile_key: &str) -> Result<Option<TileRecord>, StoreError> {
        let tiles = self.tiles.read().expect("tile store lock poisoned");
        Ok(tiles.get(tile_key).cloned())
    }

    async fn upsert_tile(&self, tile_key: &str, record: TileRecord) -> Result<(), StoreError> {
        let mut tiles = self.tiles.write().expect("tile store lock poisoned");
        tiles.insert(tile_key.to_string(), record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    use crate::cache::CacheEntry;
    use crate::models::FilterSupport;

    fn record_with_entry(key: &str) -> TileRecord {
        let mut record = TileRecord::default();
        record.entries.insert(
            key.to_string(),
            CacheEntry {
                cached_at: 100,
                expires_at: 200,
                items: vec![],
                filter_support: FilterSupport::full(),
                source_breakdown: Default::default(),
                source: "postgis".into(),
            },
        );
        record
    }

    #[tokio::test]
    async fn test_fjall_store_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = FjallTileStore::open(dir.path().join("cache")).unwrap();

        assert!(store.read_tile("t:40.00:-73.00").await.unwrap().is_none());

        store
            .upsert_tile("t:40.00:-73.00", record_with_entry("k1"))
            .await
            .unwrap();

        let record = store.read_tile("t:40.00:-73.00").await.unwrap().unwrap();
        assert!(record.entries.contains_key("k1"));
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryTileStore::new();
        store
            .upsert_tile("t:1.00:2.00", record_with_entry("k"))
            .await
            .unwrap();
        let record = store.read_tile("t:1.00:2.00").await.unwrap().unwrap();
        assert_eq!(record.entries.len(), 1);
    }
}
