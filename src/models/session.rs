//! Schedule/session rows used by the metadata hydrator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One upcoming session of an activity
///
/// `ends_at` is frequently absent in the source data; downstream logic
/// treats a missing end as `starts_at` plus 90 minutes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRow {
    pub activity_id: String,
    pub starts_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,
    /// Price in minor currency units (cents); 0 or absent means free
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_minor: Option<i64>,
    /// Maximum attendee count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
}
