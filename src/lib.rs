//! `PlaceScout` - location-based activity and venue discovery
//!
//! This library provides the discovery orchestration core: query
//! normalization, tiered source fallback, result merging and deduplication,
//! metadata hydration, facet computation, and per-tile result caching.

pub mod api;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod facets;
pub mod filters;
pub mod geo;
pub mod hydrate;
pub mod merge;
pub mod models;
pub mod sources;
pub mod web;

// Re-export core types for public API
pub use cache::{FjallTileStore, MemoryTileStore, TileCache, TileStore};
pub use config::PlaceScoutConfig;
pub use engine::{DiscoveryEngine, DiscoveryOptions, VenueOptions};
pub use error::PlaceScoutError;
pub use filters::{CapacityKey, NormalizedFilters, RawFilters, TimeWindow, build_cache_key};
pub use models::{
    BoundingBox, Coordinates, DiscoveryItem, DiscoveryQuery, DiscoveryResult, FilterSupport,
    VenueDiscovery,
};
pub use sources::{OverpassClient, SchemaCapabilities, SupabaseRest};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, PlaceScoutError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
