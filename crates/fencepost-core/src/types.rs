//! Geofence value types.
//!
//! Everything in this module is a plain value: definitions are never mutated in
//! place, operations that "change" a geofence build a new one.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Server-assigned geofence identifier.
pub type GeofenceId = i64;

/// One physical circle belonging to a geofence definition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonitoredRegion {
    /// Position of this region within its parent definition's region list.
    pub index: u32,

    /// Latitude in decimal degrees.
    pub latitude: f64,

    /// Longitude in decimal degrees.
    pub longitude: f64,

    /// Circle radius in meters.
    pub radius_meters: f64,
}

impl MonitoredRegion {
    /// Create a region at the given list position.
    #[must_use]
    pub const fn new(index: u32, latitude: f64, longitude: f64, radius_meters: f64) -> Self {
        Self {
            index,
            latitude,
            longitude,
            radius_meters,
        }
    }
}

/// Which transitions of a geofence should raise a local event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    /// Fire when the device enters a region.
    Enter,
    /// Fire when the device leaves a region.
    Exit,
    /// Fire on both transitions.
    Both,
    /// The backend sent a trigger this client does not understand.
    #[default]
    #[serde(other)]
    Unknown,
}

impl TriggerType {
    /// Returns `true` if a transition of the given kind should fire.
    #[must_use]
    pub const fn fires_on(self, transition: Transition) -> bool {
        matches!(
            (self, transition),
            (Self::Both, _) | (Self::Enter, Transition::Enter) | (Self::Exit, Transition::Exit)
        )
    }
}

/// A transition reported by the platform location monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// The device crossed into the region.
    Enter,
    /// The device crossed out of the region.
    Exit,
}

/// A server-defined geofence: one or more circles sharing trigger, tag and expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofenceDefinition {
    /// Server-assigned identifier.
    pub id: GeofenceId,

    /// Circles making up this geofence, in server order.
    pub regions: Vec<MonitoredRegion>,

    /// Transitions that should fire.
    #[serde(default)]
    pub trigger_type: TriggerType,

    /// Restricts visibility to devices subscribed to this tag. `None` is visible to all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// The geofence stops being valid at this instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl GeofenceDefinition {
    /// Create an untagged, non-expiring definition.
    #[must_use]
    pub fn new(id: GeofenceId, regions: Vec<MonitoredRegion>, trigger_type: TriggerType) -> Self {
        Self {
            id,
            regions,
            trigger_type,
            tag: None,
            expires_at: None,
        }
    }

    /// Returns a copy restricted to devices subscribed to `tag`.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Returns a copy that expires at `expires_at`.
    #[must_use]
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Look up a region by its index.
    #[must_use]
    pub fn region(&self, index: u32) -> Option<&MonitoredRegion> {
        self.regions.iter().find(|r| r.index == index)
    }

    /// Returns `true` if the definition has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Returns `true` if a device subscribed to `tags` should monitor this geofence.
    #[must_use]
    pub fn is_visible_to<'a, I>(&self, tags: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        match &self.tag {
            None => true,
            Some(tag) => tags.into_iter().any(|t| t == tag),
        }
    }
}

/// Timestamp of the caller's last successful sync.
///
/// `Never` marks a first run: the engine wipes both ports before merging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "at")]
pub enum SyncMarker {
    /// No sync has ever completed on this installation.
    #[default]
    Never,
    /// The last successful sync completed at this instant.
    At(DateTime<Utc>),
}

impl SyncMarker {
    /// Build a marker from epoch milliseconds. Out-of-range values map to `Never`.
    #[must_use]
    pub fn from_millis(millis: i64) -> Self {
        Utc.timestamp_millis_opt(millis)
            .single()
            .map_or(Self::Never, Self::At)
    }

    /// Returns `true` for the first-run sentinel.
    #[must_use]
    pub const fn is_never(&self) -> bool {
        matches!(self, Self::Never)
    }
}

impl fmt::Display for SyncMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Never => f.write_str("never"),
            Self::At(at) => write!(f, "{}", at.to_rfc3339()),
        }
    }
}
