//! The set of physical circles that should be live-monitored right now.
//!
//! A [`RegistrationRequestMap`] is derived from a [`GeofenceCollection`] and the
//! device's tag subscriptions on every engine call. It is never persisted.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::collection::GeofenceCollection;
use crate::types::{GeofenceDefinition, GeofenceId, MonitoredRegion};

/// One circle to hand to the platform monitor, with its owning definition.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionRequest {
    /// The definition this circle belongs to.
    pub definition: Arc<GeofenceDefinition>,

    /// Index of the circle within the definition.
    pub region_index: u32,
}

impl RegionRequest {
    /// The `(id, region index)` key the platform monitor registers under.
    #[must_use]
    pub fn key(&self) -> (GeofenceId, u32) {
        (self.definition.id, self.region_index)
    }

    /// The circle itself.
    #[must_use]
    pub fn region(&self) -> Option<&MonitoredRegion> {
        self.definition.region(self.region_index)
    }
}

/// Mapping `id -> regions` of every circle that must be monitored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrationRequestMap {
    requests: BTreeMap<GeofenceId, Vec<RegionRequest>>,
}

impl RegistrationRequestMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the map for a device subscribed to `tags`.
    ///
    /// Every region of every definition whose tag is absent or subscribed is
    /// included.
    #[must_use]
    pub fn build(collection: &GeofenceCollection, tags: &BTreeSet<String>) -> Self {
        let requests = collection
            .visible_to(tags)
            .map(|def| {
                let shared = Arc::new(def.clone());
                let regions = def
                    .regions
                    .iter()
                    .map(|r| RegionRequest {
                        definition: Arc::clone(&shared),
                        region_index: r.index,
                    })
                    .collect();
                (def.id, regions)
            })
            .collect();
        Self { requests }
    }

    /// Build a map naming specific `(id, region index)` pairs of `collection`.
    ///
    /// Pairs whose id or index is not present are skipped.
    #[must_use]
    pub fn for_pairs<I>(collection: &GeofenceCollection, pairs: I) -> Self
    where
        I: IntoIterator<Item = (GeofenceId, u32)>,
    {
        let mut map = Self::new();
        for (id, index) in pairs {
            let Some(def) = collection.get(id) else {
                continue;
            };
            if def.region(index).is_some() {
                map.insert(Arc::new(def.clone()), index);
            }
        }
        map
    }

    /// Add a single request.
    pub fn insert(&mut self, definition: Arc<GeofenceDefinition>, region_index: u32) {
        let entry = self.requests.entry(definition.id).or_default();
        if !entry.iter().any(|r| r.region_index == region_index) {
            entry.push(RegionRequest {
                definition,
                region_index,
            });
        }
    }

    /// Returns `true` if no circles are requested.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requests.values().all(Vec::is_empty)
    }

    /// Number of geofence ids with at least one request.
    #[must_use]
    pub fn len(&self) -> usize {
        self.requests.values().filter(|v| !v.is_empty()).count()
    }

    /// Total number of circles requested.
    #[must_use]
    pub fn region_count(&self) -> usize {
        self.requests.values().map(Vec::len).sum()
    }

    /// Requests for one geofence.
    #[must_use]
    pub fn get(&self, id: GeofenceId) -> Option<&[RegionRequest]> {
        self.requests.get(&id).map(Vec::as_slice)
    }

    /// Returns `true` if the given circle is requested.
    #[must_use]
    pub fn contains(&self, id: GeofenceId, region_index: u32) -> bool {
        self.get(id)
            .is_some_and(|rs| rs.iter().any(|r| r.region_index == region_index))
    }

    /// Geofence ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = GeofenceId> + '_ {
        self.requests
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(id, _)| *id)
    }

    /// Every requested circle as an `(id, region index)` key.
    pub fn keys(&self) -> impl Iterator<Item = (GeofenceId, u32)> + '_ {
        self.requests.values().flatten().map(RegionRequest::key)
    }

    /// Every requested circle.
    pub fn iter(&self) -> impl Iterator<Item = &RegionRequest> {
        self.requests.values().flatten()
    }
}
