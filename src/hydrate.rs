//! Metadata hydration from schedule/session data
//!
//! Items backed by the activities table carry UUID primary keys; for those,
//! upcoming sessions within a lookahead window are joined to derive the
//! price tier, capacity tier, and time-of-day bucket. If the schedule join
//! fails entirely, the affected dimensions are marked unsupported for the
//! whole response rather than letting the UI treat them as authoritative.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Timelike, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::filters::{CapacityKey, TimeWindow};
use crate::models::{DiscoveryItem, FilterSupport, SessionRow};
use crate::sources::ScheduleProvider;

/// Prefix marking a taxonomy category id inside activity_types/tags
const TAXONOMY_PREFIX: &str = "cat:";

/// Sessions with no recorded end are assumed to run this long
const DEFAULT_SESSION_MINUTES: i64 = 90;

/// Price tier from minor currency units; free and low collapse into tier 1
#[must_use]
pub fn price_tier(price_minor: i64) -> u8 {
    if price_minor <= 1_500 {
        1
    } else if price_minor <= 3_500 {
        2
    } else if price_minor <= 7_500 {
        3
    } else {
        4
    }
}

/// Capacity tier from a maximum attendee count
#[must_use]
pub fn capacity_tier(capacity: u32) -> CapacityKey {
    match capacity {
        0..=2 => CapacityKey::Couple,
        3..=8 => CapacityKey::Small,
        9..=20 => CapacityKey::Medium,
        _ => CapacityKey::Large,
    }
}

/// Time-of-day bucket for a session start
#[must_use]
pub fn time_bucket(starts_at: DateTime<Utc>) -> TimeWindow {
    match starts_at.hour() {
        5..=11 => TimeWindow::Morning,
        12..=16 => TimeWindow::Afternoon,
        17..=20 => TimeWindow::Evening,
        _ => TimeWindow::Late,
    }
}

fn effective_end(session: &SessionRow) -> DateTime<Utc> {
    session
        .ends_at
        .unwrap_or(session.starts_at + Duration::minutes(DEFAULT_SESSION_MINUTES))
}

pub struct MetadataHydrator {
    schedules: Arc<dyn ScheduleProvider>,
    lookahead_days: i64,
}

impl MetadataHydrator {
    #[must_use]
    pub fn new(schedules: Arc<dyn ScheduleProvider>, lookahead_days: i64) -> Self {
        Self {
            schedules,
            lookahead_days,
        }
    }

    /// Enrich items in place; returns the support contribution of this pass
    pub async fn hydrate(&self, items: &mut [DiscoveryItem], now: DateTime<Utc>) -> FilterSupport {
        let mut support = FilterSupport::full();

        let ids: Vec<String> = items
            .iter()
            .filter(|item| Uuid::parse_str(&item.id).is_ok())
            .map(|item| item.id.clone())
            .collect();

        if !ids.is_empty() {
            match self
                .schedules
                .upcoming_sessions(&ids, now, now + Duration::days(self.lookahead_days))
                .await
            {
                Ok(sessions) => {
                    debug!(count = sessions.len(), "schedule join returned sessions");
                    let by_activity = group_sessions(sessions);
                    for item in items.iter_mut() {
                        if let Some(sessions) = by_activity.get(&item.id) {
                            apply_sessions(item, sessions, now);
                        }
                    }
                }
                Err(e) => {
                    warn!("schedule join failed, schedule-derived filters untrusted: {e}");
                    support.price_levels = false;
                    support.capacity = false;
                    support.time_window = false;
                }
            }
        }

        for item in items.iter_mut() {
            derive_taxonomy(item);
        }

        support
    }
}

fn group_sessions(sessions: Vec<SessionRow>) -> HashMap<String, Vec<SessionRow>> {
    let mut grouped: HashMap<String, Vec<SessionRow>> = HashMap::new();
    for session in sessions {
        grouped
            .entry(session.activity_id.clone())
            .or_default()
            .push(session);
    }
    for sessions in grouped.values_mut() {
        sessions.sort_by_key(|s| s.starts_at);
    }
    grouped
}

fn apply_sessions(item: &mut DiscoveryItem, sessions: &[SessionRow], now: DateTime<Utc>) {
    if sessions.is_empty() {
        return;
    }

    let mut levels: Vec<u8> = sessions
        .iter()
        .map(|s| price_tier(s.price_minor.unwrap_or(0)))
        .collect();
    levels.sort_unstable();
    levels.dedup();
    item.price_levels = Some(levels);

    // Multiple sessions merge to the higher tier
    item.capacity_key = sessions
        .iter()
        .filter_map(|s| s.capacity.map(capacity_tier))
        .max()
        .or(item.capacity_key);

    let open_now = sessions
        .iter()
        .any(|s| s.starts_at <= now && now <= effective_end(s));
    item.open_now = open_now;
    item.time_window = Some(if open_now {
        TimeWindow::OpenNow
    } else {
        time_bucket(sessions[0].starts_at)
    });
}

/// Derive taxonomy categories from prefixed type/tag values
///
/// Pure string-pattern derivation: values without the prefix never produce a
/// category.
fn derive_taxonomy(item: &mut DiscoveryItem) {
    if item
        .taxonomy_categories
        .as_ref()
        .is_some_and(|cats| !cats.is_empty())
    {
        return;
    }

    let mut categories: Vec<String> = item
        .activity_types
        .iter()
        .flatten()
        .chain(item.tags.iter().flatten())
        .filter(|value| value.starts_with(TAXONOMY_PREFIX))
        .cloned()
        .collect();
    categories.sort();
    categories.dedup();

    if !categories.is_empty() {
        item.taxonomy_categories = Some(categories);
    }
}
