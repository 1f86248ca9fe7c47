//! Shared test helpers: port doubles that record every call in order.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use fencepost_core::{
    FencepostError, FixedClock, GeofenceCollection, GeofenceDefinition, GeofenceEngine, GeofenceId,
    GeofenceRegistrar, GeofenceStore, MonitoredRegion, RegistrationRequestMap, Result, StaticTags,
    TriggerType,
};

/// One observed port call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    StoreGet,
    StoreSave(GeofenceCollection),
    StoreReset,
    Register {
        keys: Vec<(GeofenceId, u32)>,
        collection: GeofenceCollection,
    },
    RegistrarReset,
}

/// Ordered log shared by both doubles.
#[derive(Debug, Default)]
pub struct CallLog(Mutex<Vec<Call>>);

impl CallLog {
    pub fn push(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn saved(&self) -> Vec<GeofenceCollection> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::StoreSave(collection) => Some(collection),
                _ => None,
            })
            .collect()
    }

    pub fn registered(&self) -> Vec<Vec<(GeofenceId, u32)>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Register { keys, .. } => Some(keys),
                _ => None,
            })
            .collect()
    }
}

/// Store double holding one collection.
#[derive(Debug)]
pub struct RecordingStore {
    log: Arc<CallLog>,
    current: Mutex<Option<GeofenceCollection>>,
    pub fail_save: bool,
}

impl GeofenceStore for RecordingStore {
    fn collection(&self) -> Result<Option<GeofenceCollection>> {
        self.log.push(Call::StoreGet);
        Ok(self.current.lock().unwrap().clone())
    }

    fn save_collection(&self, collection: &GeofenceCollection) -> Result<()> {
        self.log.push(Call::StoreSave(collection.clone()));
        if self.fail_save {
            return Err(FencepostError::StoreUnavailable("disk full".into()));
        }
        *self.current.lock().unwrap() = Some(collection.clone());
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        self.log.push(Call::StoreReset);
        *self.current.lock().unwrap() = None;
        Ok(())
    }
}

/// Registrar double.
#[derive(Debug)]
pub struct RecordingRegistrar {
    log: Arc<CallLog>,
    pub fail_register: bool,
}

impl GeofenceRegistrar for RecordingRegistrar {
    fn register(
        &self,
        requests: &RegistrationRequestMap,
        collection: &GeofenceCollection,
    ) -> Result<()> {
        self.log.push(Call::Register {
            keys: requests.keys().collect(),
            collection: collection.clone(),
        });
        if self.fail_register {
            return Err(FencepostError::RegistrarFailed("too many regions".into()));
        }
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        self.log.push(Call::RegistrarReset);
        Ok(())
    }
}

/// An engine wired to recording doubles at a fixed instant.
pub struct Harness {
    pub log: Arc<CallLog>,
    pub store: Arc<RecordingStore>,
    pub engine: GeofenceEngine,
}

impl Harness {
    pub fn new(initial: Option<GeofenceCollection>) -> Self {
        Self::build(initial, BTreeSet::new(), false, false)
    }

    pub fn with_known_tags(initial: Option<GeofenceCollection>, tags: &[&str]) -> Self {
        Self::build(initial, tags.iter().map(ToString::to_string).collect(), false, false)
    }

    pub fn failing(
        initial: Option<GeofenceCollection>,
        fail_save: bool,
        fail_register: bool,
    ) -> Self {
        Self::build(initial, BTreeSet::new(), fail_save, fail_register)
    }

    fn build(
        initial: Option<GeofenceCollection>,
        known_tags: BTreeSet<String>,
        fail_save: bool,
        fail_register: bool,
    ) -> Self {
        let log = Arc::new(CallLog::default());
        let store = Arc::new(RecordingStore {
            log: Arc::clone(&log),
            current: Mutex::new(initial),
            fail_save,
        });
        let registrar = Arc::new(RecordingRegistrar {
            log: Arc::clone(&log),
            fail_register,
        });
        let engine = GeofenceEngine::new(store.clone(), registrar, Arc::new(StaticTags(known_tags)))
            .with_clock(Arc::new(FixedClock(now())));
        Self { log, store, engine }
    }

    /// The store contents right now, bypassing the log.
    pub fn stored(&self) -> Option<GeofenceCollection> {
        self.store.current.lock().unwrap().clone()
    }
}

/// The instant every harness engine sees as "now".
pub fn now() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

/// A valid, untagged, non-expiring definition with `regions` circles.
pub fn def(id: GeofenceId, regions: u32) -> GeofenceDefinition {
    let regions = (0..regions)
        .map(|i| MonitoredRegion::new(i, 37.77 + f64::from(i) * 0.01, -122.42, 120.0))
        .collect();
    GeofenceDefinition::new(id, regions, TriggerType::Both)
}

pub fn collection_of(defs: impl IntoIterator<Item = GeofenceDefinition>) -> GeofenceCollection {
    defs.into_iter().collect()
}

pub fn ids(collection: &GeofenceCollection) -> Vec<GeofenceId> {
    collection.ids().collect()
}

pub fn tags(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(ToString::to_string).collect()
}
