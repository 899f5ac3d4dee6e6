//! Source ports and the adapter contract
//!
//! Each backing source is reached through a small async port trait. Adapters
//! wrap a port, translate its rows into [`DiscoveryItem`]s at the boundary,
//! and never let a "no data" condition surface as an error: transient
//! failures come back as empty items with maximally-permissive filter
//! support so callers do not falsely narrow support on a failure.

pub mod capability;
pub mod overpass;
pub mod relational;
pub mod spatial;
pub mod supabase;
pub mod venues;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{BoundingBox, Coordinates, DiscoveryItem, FilterSupport, SessionRow};

pub use capability::SchemaCapabilities;
pub use overpass::{OverpassClient, PoiAdapter};
pub use relational::RelationalAdapter;
pub use spatial::SpatialAdapter;
pub use supabase::SupabaseRest;
pub use venues::VenueAdapter;

/// Errors surfaced by source ports
///
/// `MissingColumn` and `MissingRelation` are recoverable: the adapters react
/// by narrowing their query and retrying. Everything else degrades the call.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("column does not exist: {column}")]
    MissingColumn { column: String },

    #[error("relation does not exist: {relation}")]
    MissingRelation { relation: String },

    #[error("source unavailable: {message}")]
    Unavailable { message: String },

    #[error("failed to decode source response: {message}")]
    Decode { message: String },
}

/// What one adapter produced for one call
#[derive(Debug, Clone)]
pub struct AdapterOutcome {
    pub items: Vec<DiscoveryItem>,
    pub support: FilterSupport,
    pub source: &'static str,
    /// Set when the adapter failed in a way the caller should report
    /// (`degraded` + `fallback_error` on the response)
    pub fatal: Option<String>,
}

impl AdapterOutcome {
    /// Empty result with full support; used when a source fails so that
    /// downstream adapters are still trusted for every dimension.
    #[must_use]
    pub fn empty(source: &'static str) -> Self {
        Self {
            items: Vec::new(),
            support: FilterSupport::full(),
            source,
            fatal: None,
        }
    }

    #[must_use]
    pub fn failed(source: &'static str, message: String) -> Self {
        Self {
            items: Vec::new(),
            support: FilterSupport::full(),
            source,
            fatal: Some(message),
        }
    }
}

/// Query pushed down to the spatial nearest-neighbor procedure
#[derive(Debug, Clone, Serialize)]
pub struct SpatialQuery {
    pub center: Coordinates,
    pub radius_meters: f64,
    pub limit: usize,
    pub activity_types: Vec<String>,
    pub tags: Vec<String>,
}

/// Row returned by the spatial index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpatialHit {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub venue_label: Option<String>,
    #[serde(default)]
    pub place_id: Option<String>,
    #[serde(default)]
    pub place_label: Option<String>,
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub distance_meters: Option<f64>,
    #[serde(default)]
    pub activity_types: Option<Vec<String>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub traits: Option<Vec<String>>,
}

/// Optional columns of the activities table
///
/// The backing schema evolves independently; each column the current
/// deployment lacks is discovered at call time and remembered in
/// [`SchemaCapabilities`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OptionalColumn {
    ActivityTypes,
    Tags,
    TaxonomyCategories,
    PriceLevels,
}

impl OptionalColumn {
    pub const ALL: [OptionalColumn; 4] = [
        OptionalColumn::ActivityTypes,
        OptionalColumn::Tags,
        OptionalColumn::TaxonomyCategories,
        OptionalColumn::PriceLevels,
    ];

    #[must_use]
    pub fn column_name(&self) -> &'static str {
        match self {
            OptionalColumn::ActivityTypes => "activity_types",
            OptionalColumn::Tags => "tags",
            OptionalColumn::TaxonomyCategories => "taxonomy_categories",
            OptionalColumn::PriceLevels => "price_levels",
        }
    }

    #[must_use]
    pub fn from_column_name(name: &str) -> Option<Self> {
        OptionalColumn::ALL
            .into_iter()
            .find(|c| c.column_name() == name)
    }
}

/// Bounding-box query against the activities table
#[derive(Debug, Clone)]
pub struct ActivityQuery {
    pub bounds: BoundingBox,
    pub limit: usize,
    /// Optional columns to include in the select list
    pub columns: Vec<OptionalColumn>,
    /// Whether to join the traits side table
    pub include_traits: bool,
}

/// Row returned by the activities table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityRow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub venue_label: Option<String>,
    #[serde(default)]
    pub place_id: Option<String>,
    #[serde(default)]
    pub place_label: Option<String>,
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub activity_types: Option<Vec<String>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub traits: Option<Vec<String>>,
    #[serde(default)]
    pub taxonomy_categories: Option<Vec<String>>,
    #[serde(default)]
    pub price_levels: Option<Vec<u8>>,
}

/// Query against the external POI service
#[derive(Debug, Clone)]
pub struct PoiQuery {
    pub center: Coordinates,
    pub radius_meters: f64,
    pub limit: usize,
    /// Tag selectors in `key=value` form
    pub selectors: Vec<String>,
}

/// Raw element from the external POI service
#[derive(Debug, Clone, PartialEq)]
pub struct PoiElement {
    pub element_type: String,
    pub element_id: i64,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub tags: BTreeMap<String, String>,
}

/// Optional columns of the venue table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum VenueColumn {
    Tags,
    Capacity,
    Verified,
}

impl VenueColumn {
    pub const ALL: [VenueColumn; 3] = [
        VenueColumn::Tags,
        VenueColumn::Capacity,
        VenueColumn::Verified,
    ];

    #[must_use]
    pub fn column_name(&self) -> &'static str {
        match self {
            VenueColumn::Tags => "tags",
            VenueColumn::Capacity => "capacity",
            VenueColumn::Verified => "verified",
        }
    }

    #[must_use]
    pub fn from_column_name(name: &str) -> Option<Self> {
        VenueColumn::ALL
            .into_iter()
            .find(|c| c.column_name() == name)
    }
}

/// Bounding-box query against the venue table
#[derive(Debug, Clone)]
pub struct VenueQuery {
    pub bounds: BoundingBox,
    pub limit: usize,
    pub columns: Vec<VenueColumn>,
}

/// Row returned by the venue table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VenueRow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub place_id: Option<String>,
    #[serde(default)]
    pub place_label: Option<String>,
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(default)]
    pub verified: Option<bool>,
}

/// Spatial nearest-neighbor procedure
#[async_trait]
pub trait SpatialIndex: Send + Sync {
    async fn nearest(&self, query: &SpatialQuery) -> Result<Vec<SpatialHit>, StoreError>;
}

/// General-purpose activities table, queryable by bounding box
#[async_trait]
pub trait ActivityStore: Send + Sync {
    async fn activities_in_bounds(&self, query: &ActivityQuery)
    -> Result<Vec<ActivityRow>, StoreError>;
}

/// External POI service
#[async_trait]
pub trait PoiService: Send + Sync {
    async fn search(&self, query: &PoiQuery) -> Result<Vec<PoiElement>, StoreError>;
}

/// Simple venue table, queryable by bounding box
#[async_trait]
pub trait VenueTable: Send + Sync {
    async fn venues_in_bounds(&self, query: &VenueQuery) -> Result<Vec<VenueRow>, StoreError>;
}

/// Upcoming schedule/session rows for a set of activities
#[async_trait]
pub trait ScheduleProvider: Send + Sync {
    async fn upcoming_sessions(
        &self,
        activity_ids: &[String],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SessionRow>, StoreError>;
}
