//! Core data model for the discovery pipeline

pub mod item;
pub mod query;
pub mod session;

pub use item::{
    CacheInfo, DiscoveryItem, DiscoveryResult, FilterSupport, SourceBreakdown, VenueDebug,
    VenueDiscovery, VenueSummary,
};
pub use query::{BoundingBox, Coordinates, DiscoveryQuery};
pub use session::SessionRow;
