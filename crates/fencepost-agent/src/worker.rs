//! Serialized access to the geofence engine.
//!
//! The engine assumes one call at a time. [`SyncWorker`] holds an async gate
//! for the whole of each call and runs the blocking port I/O on tokio's
//! blocking pool, so sync results, tag changes and region clearing from
//! different tasks never interleave.

use std::collections::BTreeSet;
use std::sync::Arc;

use fencepost_core::{
    resolve_trigger, Clock, FencepostConfig, GeofenceCollection, GeofenceEngine, GeofenceId,
    GeofenceRegistrar, GeofenceTrigger, JsonFileStore, ProcessOutcome, RegistrationRequestMap,
    SharedTagSubscriptions, SyncMarker, SystemClock, TagSubscriptionProvider, Transition,
    UpdateDelta,
};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::AgentResult;
use crate::preferences::PreferencesFile;

/// Snapshot of the agent's persisted state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentStatus {
    /// Last successful sync.
    pub last_sync: SyncMarker,
    /// Current tag subscriptions.
    pub subscribed_tags: BTreeSet<String>,
    /// Circles the current tags make eligible for monitoring.
    pub visible_regions: usize,
    /// The stored collection.
    pub geofences: GeofenceCollection,
}

/// Drives the engine on behalf of the sync, tag and UI subsystems.
#[derive(Clone)]
pub struct SyncWorker {
    inner: Arc<WorkerInner>,
}

struct WorkerInner {
    engine: GeofenceEngine,
    tags: Arc<SharedTagSubscriptions>,
    preferences: PreferencesFile,
    clock: Arc<dyn Clock>,
    gate: Mutex<()>,
}

impl std::fmt::Debug for SyncWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncWorker")
            .field("engine", &self.inner.engine)
            .field("preferences", &self.inner.preferences)
            .finish_non_exhaustive()
    }
}

impl SyncWorker {
    /// Open the agent's state under the configured data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be resolved or the saved
    /// preferences cannot be read.
    pub fn open(
        config: &FencepostConfig,
        registrar: Arc<dyn GeofenceRegistrar>,
    ) -> AgentResult<Self> {
        Self::open_with_clock(config, registrar, Arc::new(SystemClock))
    }

    /// As [`SyncWorker::open`], deciding expiry and sync time with `clock`.
    ///
    /// # Errors
    ///
    /// See [`SyncWorker::open`].
    pub fn open_with_clock(
        config: &FencepostConfig,
        registrar: Arc<dyn GeofenceRegistrar>,
        clock: Arc<dyn Clock>,
    ) -> AgentResult<Self> {
        let data_dir = config.resolved_data_dir()?;
        let preferences = PreferencesFile::new(&data_dir);
        let saved = preferences.load()?;
        let tags = Arc::new(SharedTagSubscriptions::new(
            saved
                .subscribed_tags
                .unwrap_or_else(|| config.tags.subscribed.clone()),
        ));

        let engine = GeofenceEngine::new(
            Arc::new(JsonFileStore::new(&data_dir)),
            registrar,
            Arc::clone(&tags) as Arc<dyn TagSubscriptionProvider>,
        )
        .with_clock(Arc::clone(&clock))
        .with_limits(config.validation);

        info!(data_dir = %data_dir.display(), last_sync = %saved.last_sync, "Opened sync worker");

        Ok(Self {
            inner: Arc::new(WorkerInner {
                engine,
                tags,
                preferences,
                clock,
                gate: Mutex::new(()),
            }),
        })
    }

    /// Run `op` on the blocking pool while holding the gate.
    async fn run<T, F>(&self, op: F) -> AgentResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&WorkerInner) -> AgentResult<T> + Send + 'static,
    {
        let _guard = self.inner.gate.lock().await;
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || op(&inner)).await?
    }

    /// Apply a server update. The sync marker advances only if every port
    /// call succeeded.
    ///
    /// # Errors
    ///
    /// Returns the first port failure. The marker is left unchanged so the
    /// next attempt repeats the same sync.
    pub async fn apply(&self, delta: Option<UpdateDelta>) -> AgentResult<ProcessOutcome> {
        self.run(move |inner| {
            let mut prefs = inner.preferences.load()?;
            let tags = inner.tags.subscribed_tags()?;
            let outcome = inner
                .engine
                .process_update(prefs.last_sync, delta.as_ref(), &tags)?;

            prefs.last_sync = SyncMarker::At(inner.clock.now());
            inner.preferences.save(&prefs)?;
            info!(
                persisted = outcome.persisted,
                registered_regions = outcome.registered_regions,
                "Sync applied"
            );
            Ok(outcome)
        })
        .await
    }

    /// Register the stored collection again under the current tags.
    ///
    /// # Errors
    ///
    /// Returns the store or registrar failure.
    pub async fn reregister(&self) -> AgentResult<()> {
        self.run(|inner| {
            let tags = inner.tags.subscribed_tags()?;
            inner.engine.reregister_active(&tags)?;
            Ok(())
        })
        .await
    }

    /// Subscribe to `tags`. Returns `true` if the subscriptions changed, in
    /// which case the stored collection is registered again.
    ///
    /// The new set takes effect only once it is saved and registered; on
    /// failure the previous subscriptions stay in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the preferences cannot be saved or registration fails.
    pub async fn subscribe(&self, tags: Vec<String>) -> AgentResult<bool> {
        self.run(move |inner| {
            let mut candidate = inner.tags.subscribed_tags()?;
            let before = candidate.len();
            candidate.extend(tags);
            if candidate.len() == before {
                return Ok(false);
            }
            inner.commit_tags(candidate)?;
            Ok(true)
        })
        .await
    }

    /// Unsubscribe from `tags`. Returns `true` if the subscriptions changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the preferences cannot be saved or registration fails.
    pub async fn unsubscribe(&self, tags: Vec<String>) -> AgentResult<bool> {
        self.run(move |inner| {
            let mut candidate = inner.tags.subscribed_tags()?;
            let before = candidate.len();
            for tag in &tags {
                candidate.remove(tag);
            }
            if candidate.len() == before {
                return Ok(false);
            }
            inner.commit_tags(candidate)?;
            Ok(true)
        })
        .await
    }

    /// Stop monitoring the given `(id, region index)` circles and drop them
    /// from storage. Pairs not in the stored collection are ignored.
    /// Returns how many circles were cleared.
    ///
    /// # Errors
    ///
    /// Returns the store, tag source or registrar failure.
    pub async fn clear(&self, pairs: Vec<(GeofenceId, u32)>) -> AgentResult<usize> {
        self.run(move |inner| {
            let collection = inner.engine.stored_collection()?;
            let regions = RegistrationRequestMap::for_pairs(&collection, pairs);
            inner.engine.clear_regions(Some(&regions))?;
            Ok(regions.region_count())
        })
        .await
    }

    /// Resolve a platform transition callback against the stored collection.
    /// Returns `None` when the geofence is unknown, expired, hidden by the
    /// current tags or does not fire on `transition`.
    ///
    /// # Errors
    ///
    /// Returns the store or tag source failure.
    pub async fn transition(
        &self,
        id: GeofenceId,
        region_index: u32,
        transition: Transition,
    ) -> AgentResult<Option<GeofenceTrigger>> {
        self.run(move |inner| {
            let tags = inner.tags.subscribed_tags()?;
            let collection = inner.engine.stored_collection()?;
            let trigger = resolve_trigger(
                &collection,
                id,
                region_index,
                transition,
                inner.clock.now(),
            )
            .filter(|t| t.definition.is_visible_to(&tags));
            if let Some(trigger) = &trigger {
                info!(
                    geofence_id = id,
                    region_index,
                    ?transition,
                    at = %trigger.at,
                    "Geofence triggered"
                );
            }
            Ok(trigger)
        })
        .await
    }

    /// Erase the stored collection. The next update is treated as a first sync.
    ///
    /// # Errors
    ///
    /// Returns the store failure or an error saving the preferences.
    pub async fn reset_store(&self) -> AgentResult<()> {
        self.run(|inner| {
            inner.engine.reset_store()?;
            let mut prefs = inner.preferences.load()?;
            prefs.last_sync = SyncMarker::Never;
            inner.preferences.save(&prefs)?;
            Ok(())
        })
        .await
    }

    /// Current persisted state.
    ///
    /// # Errors
    ///
    /// Returns an error if the store or preferences cannot be read.
    pub async fn status(&self) -> AgentResult<AgentStatus> {
        self.run(|inner| {
            let prefs = inner.preferences.load()?;
            let subscribed_tags = inner.tags.subscribed_tags()?;
            let geofences = inner.engine.stored_collection()?;
            let visible_regions =
                RegistrationRequestMap::build(&geofences, &subscribed_tags).region_count();
            Ok(AgentStatus {
                last_sync: prefs.last_sync,
                subscribed_tags,
                visible_regions,
                geofences,
            })
        })
        .await
    }
}

impl WorkerInner {
    /// Save and register `tags`, then make them current.
    fn commit_tags(&self, tags: BTreeSet<String>) -> AgentResult<()> {
        let mut prefs = self.preferences.load()?;
        prefs.subscribed_tags = Some(tags.clone());
        self.preferences.save(&prefs)?;
        self.engine.reregister_active(&tags)?;

        info!(tags = ?tags, "Tag subscriptions changed");
        self.tags.replace(tags)?;
        Ok(())
    }
}
