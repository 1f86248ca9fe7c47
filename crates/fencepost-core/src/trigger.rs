//! Resolving platform transition callbacks back to geofence metadata.
//!
//! The platform monitor only knows `(id, region index)`. The registrar keeps
//! the full collection alongside each registration so the notification layer
//! can turn a raw transition into a [`GeofenceTrigger`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::collection::GeofenceCollection;
use crate::types::{GeofenceDefinition, GeofenceId, MonitoredRegion, Transition};

/// A transition that should raise a local notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofenceTrigger {
    /// The definition that fired.
    pub definition: GeofenceDefinition,

    /// The circle that was crossed.
    pub region: MonitoredRegion,

    /// Direction of the crossing.
    pub transition: Transition,

    /// When the transition was resolved.
    pub at: DateTime<Utc>,
}

/// Resolve a platform transition against the collection last handed to the registrar.
///
/// Returns `None` if the id or region is unknown, the definition has expired,
/// or its trigger type does not fire on this transition.
#[must_use]
pub fn resolve_trigger(
    collection: &GeofenceCollection,
    id: GeofenceId,
    region_index: u32,
    transition: Transition,
    now: DateTime<Utc>,
) -> Option<GeofenceTrigger> {
    let Some(definition) = collection.get(id) else {
        debug!(geofence_id = id, "Transition for unknown geofence");
        return None;
    };
    let region = *definition.region(region_index)?;

    if definition.is_expired_at(now) {
        debug!(geofence_id = id, "Transition for expired geofence ignored");
        return None;
    }
    if !definition.trigger_type.fires_on(transition) {
        return None;
    }

    Some(GeofenceTrigger {
        definition: definition.clone(),
        region,
        transition,
        at: now,
    })
}
