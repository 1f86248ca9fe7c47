//! Capabilities the engine calls through.
//!
//! Concrete storage, platform geofencing and tag sources live outside the
//! engine. Every port is synchronous; an adapter backed by an async runtime
//! must block on its work before returning.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::collection::GeofenceCollection;
use crate::error::Result;
use crate::registration::RegistrationRequestMap;

/// Durable storage of the device's [`GeofenceCollection`].
pub trait GeofenceStore: Send + Sync {
    /// Read the stored collection. `None` means nothing has been stored yet.
    fn collection(&self) -> Result<Option<GeofenceCollection>>;

    /// Replace the stored collection.
    fn save_collection(&self, collection: &GeofenceCollection) -> Result<()>;

    /// Wipe all persisted state.
    fn reset(&self) -> Result<()>;
}

/// Thin adapter over the platform geofencing service.
pub trait GeofenceRegistrar: Send + Sync {
    /// Make the platform monitor exactly the circles in `requests`.
    ///
    /// `collection` is the full known set, so a later trigger callback can be
    /// correlated back to complete metadata. Must be idempotent.
    fn register(
        &self,
        requests: &RegistrationRequestMap,
        collection: &GeofenceCollection,
    ) -> Result<()>;

    /// Stop monitoring everything and clear adapter-local bookkeeping.
    fn reset(&self) -> Result<()>;
}

/// Source of the device's current tag subscriptions.
pub trait TagSubscriptionProvider: Send + Sync {
    /// The full set of tags this device is subscribed to.
    fn subscribed_tags(&self) -> Result<BTreeSet<String>>;
}

/// Source of the current instant, used for expiry.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock pinned to one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

impl<T: GeofenceStore + ?Sized> GeofenceStore for Arc<T> {
    fn collection(&self) -> Result<Option<GeofenceCollection>> {
        (**self).collection()
    }

    fn save_collection(&self, collection: &GeofenceCollection) -> Result<()> {
        (**self).save_collection(collection)
    }

    fn reset(&self) -> Result<()> {
        (**self).reset()
    }
}

impl<T: GeofenceRegistrar + ?Sized> GeofenceRegistrar for Arc<T> {
    fn register(
        &self,
        requests: &RegistrationRequestMap,
        collection: &GeofenceCollection,
    ) -> Result<()> {
        (**self).register(requests, collection)
    }

    fn reset(&self) -> Result<()> {
        (**self).reset()
    }
}

impl<T: TagSubscriptionProvider + ?Sized> TagSubscriptionProvider for Arc<T> {
    fn subscribed_tags(&self) -> Result<BTreeSet<String>> {
        (**self).subscribed_tags()
    }
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}
