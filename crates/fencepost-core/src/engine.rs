//! Geofence reconciliation.
//!
//! [`GeofenceEngine`] merges server deltas into the stored collection, drops
//! invalid and expired entries, filters by tag subscription and hands the
//! resulting circles to the platform monitor.
//!
//! The engine holds no state between calls beyond its port handles. It is not
//! safe to call concurrently against the same store and registrar: every
//! operation is a read-modify-write with no locking, so callers must serialize
//! access per installation.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info};

use crate::collection::{GeofenceCollection, MergeStats, UpdateDelta};
use crate::error::Result;
use crate::ports::{Clock, GeofenceRegistrar, GeofenceStore, SystemClock, TagSubscriptionProvider};
use crate::registration::RegistrationRequestMap;
use crate::types::SyncMarker;
use crate::validation::ValidationLimits;

/// Summary of one [`GeofenceEngine::process_update`] call.
///
/// Informational only; the port calls already happened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Both ports were reset because this was a first sync.
    pub reset: bool,
    /// A delta was merged.
    pub merged: bool,
    /// What the merge did with the delta's entries.
    pub merge: MergeStats,
    /// Entries dropped because they had expired.
    pub culled: usize,
    /// Definitions written to the store. Zero when nothing was written.
    pub persisted: usize,
    /// Circles handed to the registrar. Zero when register was not called.
    pub registered_regions: usize,
}

/// Reconciles server geofence updates with the device's monitored set.
pub struct GeofenceEngine {
    store: Arc<dyn GeofenceStore>,
    registrar: Arc<dyn GeofenceRegistrar>,
    tags: Arc<dyn TagSubscriptionProvider>,
    clock: Arc<dyn Clock>,
    limits: ValidationLimits,
}

impl std::fmt::Debug for GeofenceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeofenceEngine")
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl GeofenceEngine {
    /// Create an engine over the given ports using wall-clock time and default limits.
    pub fn new(
        store: Arc<dyn GeofenceStore>,
        registrar: Arc<dyn GeofenceRegistrar>,
        tags: Arc<dyn TagSubscriptionProvider>,
    ) -> Self {
        Self {
            store,
            registrar,
            tags,
            clock: Arc::new(SystemClock),
            limits: ValidationLimits::default(),
        }
    }

    /// Use `clock` for expiry decisions.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Use `limits` when validating upserts.
    #[must_use]
    pub fn with_limits(mut self, limits: ValidationLimits) -> Self {
        self.limits = limits;
        self
    }

    /// The validation limits in effect.
    #[must_use]
    pub const fn limits(&self) -> &ValidationLimits {
        &self.limits
    }

    /// Apply a server update.
    ///
    /// On a first sync (`previous` is [`SyncMarker::Never`]) both ports are
    /// reset before anything else. A missing `delta` means the backend had
    /// nothing new, so nothing beyond that reset happens. Otherwise the delta is
    /// merged into the stored collection, expired entries are culled, the
    /// result is saved and the tag-visible circles are registered. If a reset
    /// already left both ports empty and the merge produced nothing, no further
    /// writes are made.
    ///
    /// # Errors
    ///
    /// Any port failure is returned unchanged. Earlier port calls in the same
    /// invocation are not rolled back.
    pub fn process_update(
        &self,
        previous: SyncMarker,
        delta: Option<&UpdateDelta>,
        subscribed_tags: &BTreeSet<String>,
    ) -> Result<ProcessOutcome> {
        let mut outcome = ProcessOutcome::default();

        if previous.is_never() {
            info!("First sync, resetting registrar and store");
            self.registrar.reset()?;
            self.store.reset()?;
            outcome.reset = true;
        }

        let Some(delta) = delta else {
            debug!(%previous, "No geofence update to apply");
            return Ok(outcome);
        };

        let now = self.clock.now();
        let current = self.store.collection()?.unwrap_or_default();
        let (merged, merge) = current.merged_with(delta, &self.limits, now);
        let (merged, culled) = merged.culled(now);
        outcome.merged = true;
        outcome.merge = merge;
        outcome.culled = culled;

        debug!(
            previous = current.len(),
            upserted = merge.upserted,
            tombstoned = merge.tombstoned,
            deleted = merge.deleted,
            culled,
            "Merged geofence update"
        );

        if outcome.reset && merged.is_empty() {
            debug!("Nothing to track after reset");
            return Ok(outcome);
        }

        self.store.save_collection(&merged)?;
        outcome.persisted = merged.len();

        let requests = RegistrationRequestMap::build(&merged, subscribed_tags);
        self.registrar.register(&requests, &merged)?;
        outcome.registered_regions = requests.region_count();

        info!(
            geofences = outcome.persisted,
            regions = outcome.registered_regions,
            "Geofence update applied"
        );
        Ok(outcome)
    }

    /// Re-register the stored collection for a new tag subscription set.
    ///
    /// Nothing is merged, culled or saved. The registrar is called even when
    /// the collection is empty.
    ///
    /// # Errors
    ///
    /// Returns any store or registrar failure unchanged.
    pub fn reregister_active(&self, subscribed_tags: &BTreeSet<String>) -> Result<()> {
        let collection = self.store.collection()?.unwrap_or_default();
        let requests = RegistrationRequestMap::build(&collection, subscribed_tags);
        debug!(
            geofences = collection.len(),
            regions = requests.region_count(),
            "Re-registering stored geofences"
        );
        self.registrar.register(&requests, &collection)
    }

    /// Forget specific circles, typically after the platform reported them as
    /// removed.
    ///
    /// A definition whose last circle is cleared is dropped. The reduced
    /// collection is saved and re-registered using the tags reported by the
    /// engine's [`TagSubscriptionProvider`]. `None` or an empty map is a no-op.
    ///
    /// # Errors
    ///
    /// Returns any store, tag source or registrar failure unchanged.
    pub fn clear_regions(&self, regions: Option<&RegistrationRequestMap>) -> Result<()> {
        let Some(regions) = regions.filter(|r| !r.is_empty()) else {
            return Ok(());
        };

        let current = self.store.collection()?.unwrap_or_default();
        let reduced = current.without_regions(regions.keys());
        self.store.save_collection(&reduced)?;

        let tags = self.tags.subscribed_tags()?;
        let requests = RegistrationRequestMap::build(&reduced, &tags);
        info!(
            cleared = regions.region_count(),
            geofences = reduced.len(),
            regions = requests.region_count(),
            "Cleared geofence regions"
        );
        self.registrar.register(&requests, &reduced)
    }

    /// Wipe the store without touching the registrar.
    ///
    /// # Errors
    ///
    /// Returns the store failure unchanged.
    pub fn reset_store(&self) -> Result<()> {
        info!("Resetting geofence store");
        self.store.reset()
    }

    /// The currently stored collection, empty if nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns the store failure unchanged.
    pub fn stored_collection(&self) -> Result<GeofenceCollection> {
        Ok(self.store.collection()?.unwrap_or_default())
    }
}
