//! The set of currently known geofences and the server deltas applied to it.
//!
//! [`GeofenceCollection`] is a value: merge, cull and region removal all return
//! a new collection and leave the receiver untouched.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::{GeofenceDefinition, GeofenceId};
use crate::validation::ValidationLimits;

/// An incremental server instruction: geofences to add or replace, ids to drop.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateDelta {
    /// Definitions to insert or replace by id.
    #[serde(default)]
    pub upserts: Vec<GeofenceDefinition>,

    /// Ids to remove. Wins over a stale upsert for the same id.
    #[serde(default)]
    pub deletions: BTreeSet<GeofenceId>,
}

impl UpdateDelta {
    /// Create a delta.
    #[must_use]
    pub const fn new(upserts: Vec<GeofenceDefinition>, deletions: BTreeSet<GeofenceId>) -> Self {
        Self { upserts, deletions }
    }

    /// Returns `true` if the delta carries no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletions.is_empty()
    }
}

/// Counts describing what a merge did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Valid upserts written into the collection.
    pub upserted: usize,
    /// Upserts rejected as invalid and applied as tombstones.
    pub tombstoned: usize,
    /// Ids named by the delta's deletion set that were present.
    pub deleted: usize,
}

/// Keyed set of geofence definitions: the authoritative "currently active" state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeofenceCollection {
    definitions: BTreeMap<GeofenceId, GeofenceDefinition>,
}

impl GeofenceCollection {
    /// Create an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Returns `true` if there are no definitions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Look up a definition by id.
    #[must_use]
    pub fn get(&self, id: GeofenceId) -> Option<&GeofenceDefinition> {
        self.definitions.get(&id)
    }

    /// Returns `true` if a definition with this id is present.
    #[must_use]
    pub fn contains(&self, id: GeofenceId) -> bool {
        self.definitions.contains_key(&id)
    }

    /// All ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = GeofenceId> + '_ {
        self.definitions.keys().copied()
    }

    /// All definitions in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &GeofenceDefinition> {
        self.definitions.values()
    }

    /// Total number of regions across all definitions.
    #[must_use]
    pub fn region_count(&self) -> usize {
        self.definitions.values().map(|d| d.regions.len()).sum()
    }

    /// Apply `delta` at `now` and return the result.
    ///
    /// Valid upserts replace by id; invalid upserts remove their id. Deletions
    /// are applied last so they win over a stale upsert for the same id.
    #[must_use]
    pub fn merged_with(
        &self,
        delta: &UpdateDelta,
        limits: &ValidationLimits,
        now: DateTime<Utc>,
    ) -> (Self, MergeStats) {
        let mut definitions = self.definitions.clone();
        let mut stats = MergeStats::default();

        for upsert in &delta.upserts {
            match limits.check(upsert, now) {
                Ok(()) => {
                    definitions.insert(upsert.id, upsert.clone());
                    stats.upserted += 1;
                }
                Err(reason) => {
                    warn!(geofence_id = upsert.id, %reason, "Dropping invalid geofence upsert");
                    definitions.remove(&upsert.id);
                    stats.tombstoned += 1;
                }
            }
        }

        for id in &delta.deletions {
            if definitions.remove(id).is_some() {
                stats.deleted += 1;
            }
        }

        (Self { definitions }, stats)
    }

    /// Return the collection without entries that have expired at `now`.
    #[must_use]
    pub fn culled(&self, now: DateTime<Utc>) -> (Self, usize) {
        let mut culled = 0;
        let definitions = self
            .definitions
            .iter()
            .filter(|(id, def)| {
                let expired = def.is_expired_at(now);
                if expired {
                    debug!(geofence_id = **id, "Culling expired geofence");
                    culled += 1;
                }
                !expired
            })
            .map(|(id, def)| (*id, def.clone()))
            .collect();
        (Self { definitions }, culled)
    }

    /// Return the collection with the named `(id, region index)` pairs removed.
    ///
    /// A definition left with no regions is dropped entirely. Pairs naming an
    /// unknown id or index are ignored. Surviving regions keep their indices.
    #[must_use]
    pub fn without_regions<I>(&self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (GeofenceId, u32)>,
    {
        let mut doomed: BTreeMap<GeofenceId, BTreeSet<u32>> = BTreeMap::new();
        for (id, index) in pairs {
            doomed.entry(id).or_default().insert(index);
        }

        let mut definitions = self.definitions.clone();
        for (id, indices) in doomed {
            let Some(def) = definitions.get(&id) else {
                continue;
            };
            let remaining: Vec<_> = def
                .regions
                .iter()
                .filter(|r| !indices.contains(&r.index))
                .copied()
                .collect();
            if remaining.is_empty() {
                debug!(geofence_id = id, "Last region cleared, dropping geofence");
                definitions.remove(&id);
            } else {
                let trimmed = GeofenceDefinition {
                    regions: remaining,
                    ..def.clone()
                };
                definitions.insert(id, trimmed);
            }
        }

        Self { definitions }
    }

    /// Definitions visible to a device subscribed to `tags`.
    pub fn visible_to<'a>(
        &'a self,
        tags: &'a BTreeSet<String>,
    ) -> impl Iterator<Item = &'a GeofenceDefinition> + 'a {
        self.definitions.values().filter(move |d| d.is_visible_to(tags))
    }
}

impl FromIterator<GeofenceDefinition> for GeofenceCollection {
    fn from_iter<T: IntoIterator<Item = GeofenceDefinition>>(iter: T) -> Self {
        Self {
            definitions: iter.into_iter().map(|d| (d.id, d)).collect(),
        }
    }
}

impl<'a> IntoIterator for &'a GeofenceCollection {
    type Item = &'a GeofenceDefinition;
    type IntoIter = std::collections::btree_map::Values<'a, GeofenceId, GeofenceDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.definitions.values()
    }
}
