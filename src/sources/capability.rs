//! Process-wide schema capability cache
//!
//! Column and relation absence is discovered by the adapters' retry loops.
//! Remembering what was missing lets later calls issue their first query
//! without the doomed columns instead of re-detecting per call. The state is
//! process-wide and refreshed only on restart; `reset` exists so tests do
//! not leak capability state into each other.

use std::collections::BTreeSet;
use std::sync::RwLock;

use super::{OptionalColumn, VenueColumn};

#[derive(Debug, Default)]
struct CapabilityState {
    missing_activity_columns: BTreeSet<OptionalColumn>,
    missing_venue_columns: BTreeSet<VenueColumn>,
    traits_relation_missing: bool,
}

/// What the backing schema has been observed to lack
#[derive(Debug, Default)]
pub struct SchemaCapabilities {
    state: RwLock<CapabilityState>,
}

impl SchemaCapabilities {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Optional activity columns not yet known to be missing
    #[must_use]
    pub fn activity_columns(&self) -> Vec<OptionalColumn> {
        let state = self.state.read().expect("capability lock poisoned");
        OptionalColumn::ALL
            .into_iter()
            .filter(|c| !state.missing_activity_columns.contains(c))
            .collect()
    }

    pub fn mark_activity_column_missing(&self, column: OptionalColumn) {
        let mut state = self.state.write().expect("capability lock poisoned");
        state.missing_activity_columns.insert(column);
    }

    /// Optional venue columns not yet known to be missing
    #[must_use]
    pub fn venue_columns(&self) -> Vec<VenueColumn> {
        let state = self.state.read().expect("capability lock poisoned");
        VenueColumn::ALL
            .into_iter()
            .filter(|c| !state.missing_venue_columns.contains(c))
            .collect()
    }

    pub fn mark_venue_column_missing(&self, column: VenueColumn) {
        let mut state = self.state.write().expect("capability lock poisoned");
        state.missing_venue_columns.insert(column);
    }

    #[must_use]
    pub fn traits_relation_available(&self) -> bool {
        let state = self.state.read().expect("capability lock poisoned");
        !state.traits_relation_missing
    }

    pub fn mark_traits_relation_missing(&self) {
        let mut state = self.state.write().expect("capability lock poisoned");
        state.traits_relation_missing = true;
    }

    /// Forget everything and probe again on the next call
    pub fn reset(&self) {
        let mut state = self.state.write().expect("capability lock poisoned");
        *state = CapabilityState::default();
    }
}
