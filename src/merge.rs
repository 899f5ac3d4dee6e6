//! Merging, deduplication, and canonical ordering of discovery items
//!
//! Multiple adapters can return the same physical place under different ids
//! and slightly different names. Items are keyed by place identity: a stable
//! place id when present, else a normalized name plus coordinates rounded to
//! four decimals (~11 m).

use std::collections::HashSet;

use crate::geo::round_coord;
use crate::models::DiscoveryItem;

/// Place-identity key for an item
#[must_use]
pub fn place_key(item: &DiscoveryItem) -> String {
    if let Some(place_id) = &item.place_id {
        let trimmed = place_id.trim();
        if !trimmed.is_empty() {
            return format!("p:{trimmed}");
        }
    }
    format!(
        "n:{}:{:.4}:{:.4}",
        normalize_name(&item.name),
        round_coord(item.lat, 4),
        round_coord(item.lng, 4),
    )
}

fn normalize_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Merge a fallback source into an existing result set
///
/// Primary items occupy their place keys first; a fallback item is admitted
/// only when its key is unoccupied, so each physical place appears exactly
/// once, taken from the higher-priority source. Records with non-finite
/// coordinates are dropped on both sides.
#[must_use]
pub fn merge_with_fallback(
    primary: Vec<DiscoveryItem>,
    fallback: Vec<DiscoveryItem>,
) -> Vec<DiscoveryItem> {
    let mut merged: Vec<DiscoveryItem> = Vec::with_capacity(primary.len() + fallback.len());
    let mut occupied: HashSet<String> = HashSet::new();

    for item in primary {
        if !item.has_finite_coordinates() {
            continue;
        }
        let key = place_key(&item);
        if occupied.insert(key) {
            merged.push(item);
        }
    }

    for item in fallback {
        if !item.has_finite_coordinates() {
            continue;
        }
        let key = place_key(&item);
        if occupied.insert(key) {
            merged.push(item);
        }
    }

    merged
}

/// Canonical result ordering: distance ascending, then case-sensitive name,
/// then id. Stable and reproducible for identical inputs.
pub fn sort_items(items: &mut [DiscoveryItem]) {
    items.sort_by(|a, b| {
        a.distance_meters
            .total_cmp(&b.distance_meters)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.id.cmp(&b.id))
    });
}
