//! # fencepost-core
//!
//! Geofence reconciliation for the fencepost push-notification client.
//!
//! This crate provides:
//! - Value types for geofences and their monitored circles
//! - Merging of server deltas into the device's known geofence set
//! - Expiry culling and tag-based registration filtering
//! - Ports for storage, platform geofencing and tag subscriptions, with
//!   file-backed and in-memory adapters
//!
//! ## Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`engine`] - The reconciliation engine driving the ports
//! - [`collection`] - Known geofence set and server update deltas
//! - [`registration`] - Tag-filtered view handed to the platform monitor
//! - [`validation`] - Validity rules for incoming geofences
//! - [`ports`] - Store, registrar, tag source and clock traits
//! - [`storage`] - JSON file and in-memory stores
//! - [`registrar`] - In-process registrar with trigger bookkeeping
//! - [`tags`] - Tag subscription sources
//! - [`trigger`] - Resolving platform transitions to geofence metadata
//! - [`config`] - Configuration loading, saving, and validation
//! - [`error`] - Unified error types for the crate
//! - [`types`] - Shared value types

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod collection;
pub mod config;
pub mod engine;
pub mod error;
pub mod ports;
pub mod registrar;
pub mod registration;
pub mod storage;
pub mod tags;
pub mod trigger;
pub mod types;
pub mod validation;

// Re-export primary types for convenience
pub use collection::{GeofenceCollection, MergeStats, UpdateDelta};
pub use config::{FencepostConfig, LoggingConfig, TagsConfig};
pub use engine::{GeofenceEngine, ProcessOutcome};
pub use error::{FencepostError, Result};
pub use ports::{
    Clock, FixedClock, GeofenceRegistrar, GeofenceStore, SystemClock, TagSubscriptionProvider,
};
pub use registrar::MemoryRegistrar;
pub use registration::{RegionRequest, RegistrationRequestMap};
pub use storage::{default_data_dir, JsonFileStore, MemoryStore};
pub use tags::{SharedTagSubscriptions, StaticTags};
pub use trigger::{resolve_trigger, GeofenceTrigger};
pub use types::{
    GeofenceDefinition, GeofenceId, MonitoredRegion, SyncMarker, Transition, TriggerType,
};
pub use validation::{Invalidity, ValidationLimits};
