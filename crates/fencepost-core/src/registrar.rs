//! In-process [`GeofenceRegistrar`] that keeps the bookkeeping a platform
//! adapter needs: which circles are live, and the full collection they came
//! from so a later transition can be resolved back to its definition.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::collection::GeofenceCollection;
use crate::error::{FencepostError, Result};
use crate::ports::GeofenceRegistrar;
use crate::registration::RegistrationRequestMap;
use crate::trigger::{resolve_trigger, GeofenceTrigger};
use crate::types::{GeofenceDefinition, GeofenceId, Transition};

#[derive(Debug, Default)]
struct Bookkeeping {
    active: BTreeSet<(GeofenceId, u32)>,
    collection: GeofenceCollection,
    generation: u64,
}

/// Registrar that records what it was asked to monitor.
///
/// Platform geofencing services cap how many circles one app may watch;
/// [`with_region_limit`](Self::with_region_limit) reproduces that cap.
#[derive(Debug, Default)]
pub struct MemoryRegistrar {
    state: Mutex<Bookkeeping>,
    region_limit: Option<usize>,
}

impl MemoryRegistrar {
    /// Create a registrar with no region limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject registrations of more than `limit` circles.
    #[must_use]
    pub fn with_region_limit(mut self, limit: usize) -> Self {
        self.region_limit = Some(limit);
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, Bookkeeping>> {
        self.state
            .lock()
            .map_err(|_| FencepostError::RegistrarFailed("registrar lock poisoned".into()))
    }

    /// Circles currently being monitored, as `(id, region index)` keys.
    ///
    /// # Errors
    ///
    /// Fails only if the bookkeeping lock is poisoned.
    pub fn active(&self) -> Result<BTreeSet<(GeofenceId, u32)>> {
        Ok(self.lock()?.active.clone())
    }

    /// Returns `true` if the given circle is being monitored.
    ///
    /// # Errors
    ///
    /// Fails only if the bookkeeping lock is poisoned.
    pub fn is_monitoring(&self, id: GeofenceId, region_index: u32) -> Result<bool> {
        Ok(self.lock()?.active.contains(&(id, region_index)))
    }

    /// The collection passed with the last registration.
    ///
    /// # Errors
    ///
    /// Fails only if the bookkeeping lock is poisoned.
    pub fn collection(&self) -> Result<GeofenceCollection> {
        Ok(self.lock()?.collection.clone())
    }

    /// Full metadata for a geofence known from the last registration.
    ///
    /// # Errors
    ///
    /// Fails only if the bookkeeping lock is poisoned.
    pub fn definition(&self, id: GeofenceId) -> Result<Option<GeofenceDefinition>> {
        Ok(self.lock()?.collection.get(id).cloned())
    }

    /// Resolve a platform transition callback for a monitored circle.
    ///
    /// Circles that are not currently monitored never fire, even if the
    /// correlated collection still describes them.
    ///
    /// # Errors
    ///
    /// Fails only if the bookkeeping lock is poisoned.
    pub fn resolve_transition(
        &self,
        id: GeofenceId,
        region_index: u32,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> Result<Option<GeofenceTrigger>> {
        let state = self.lock()?;
        if !state.active.contains(&(id, region_index)) {
            debug!(geofence_id = id, region_index, "Transition for unmonitored region");
            return Ok(None);
        }
        Ok(resolve_trigger(&state.collection, id, region_index, transition, now))
    }

    /// Number of successful register calls since creation or the last reset.
    ///
    /// # Errors
    ///
    /// Fails only if the bookkeeping lock is poisoned.
    pub fn generation(&self) -> Result<u64> {
        Ok(self.lock()?.generation)
    }
}

impl GeofenceRegistrar for MemoryRegistrar {
    fn register(
        &self,
        requests: &RegistrationRequestMap,
        collection: &GeofenceCollection,
    ) -> Result<()> {
        let wanted: BTreeSet<_> = requests.keys().collect();
        if let Some(limit) = self.region_limit.filter(|limit| wanted.len() > *limit) {
            return Err(FencepostError::RegistrarFailed(format!(
                "{} regions requested, platform allows {limit}",
                wanted.len()
            )));
        }

        let mut state = self.lock()?;
        let added = wanted.difference(&state.active).count();
        let removed = state.active.difference(&wanted).count();

        state.active = wanted;
        state.collection = collection.clone();
        state.generation += 1;

        debug!(added, removed, generation = state.generation, "Registrar bookkeeping updated");
        info!(regions = state.active.len(), "Monitoring geofence regions");
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        let mut state = self.lock()?;
        *state = Bookkeeping::default();
        info!("Stopped monitoring all geofence regions");
        Ok(())
    }
}
