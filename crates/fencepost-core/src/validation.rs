//! Validity rules for geofence definitions.
//!
//! An invalid definition is never an error: the engine treats an invalid upsert
//! as a tombstone for its id. [`Invalidity`] exists so the reason can be logged.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{GeofenceDefinition, MonitoredRegion, TriggerType};

/// Default upper bound for a region radius, in meters.
pub const DEFAULT_MAX_RADIUS_METERS: f64 = 100_000.0;

/// Bounds applied to each region of a definition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationLimits {
    /// Radii must be strictly greater than this.
    pub min_radius_meters: f64,

    /// Radii must be less than or equal to this.
    pub max_radius_meters: f64,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            min_radius_meters: 0.0,
            max_radius_meters: DEFAULT_MAX_RADIUS_METERS,
        }
    }
}

/// Why a definition was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum Invalidity {
    /// The definition has no regions.
    NoRegions,
    /// The backend sent a trigger type this client does not understand.
    UnknownTrigger,
    /// The definition expired at or before the evaluation instant.
    Expired(DateTime<Utc>),
    /// A region has a coordinate outside the valid range or a non-finite value.
    BadCoordinate {
        /// Index of the offending region.
        index: u32,
    },
    /// A region radius falls outside the configured limits.
    BadRadius {
        /// Index of the offending region.
        index: u32,
        /// The rejected radius.
        radius_meters: f64,
    },
    /// Two regions share the same index.
    DuplicateIndex(u32),
}

impl fmt::Display for Invalidity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRegions => f.write_str("no regions"),
            Self::UnknownTrigger => f.write_str("unknown trigger type"),
            Self::Expired(at) => write!(f, "expired at {}", at.to_rfc3339()),
            Self::BadCoordinate { index } => write!(f, "region {index} has an invalid coordinate"),
            Self::BadRadius {
                index,
                radius_meters,
            } => write!(f, "region {index} has an invalid radius ({radius_meters} m)"),
            Self::DuplicateIndex(index) => write!(f, "region index {index} appears twice"),
        }
    }
}

impl ValidationLimits {
    /// Check a single region against these limits.
    pub fn check_region(&self, region: &MonitoredRegion) -> Result<(), Invalidity> {
        let coordinate_ok = region.latitude.is_finite()
            && region.longitude.is_finite()
            && (-90.0..=90.0).contains(&region.latitude)
            && (-180.0..=180.0).contains(&region.longitude);
        if !coordinate_ok {
            return Err(Invalidity::BadCoordinate {
                index: region.index,
            });
        }

        let radius = region.radius_meters;
        if !radius.is_finite()
            || radius <= self.min_radius_meters
            || radius > self.max_radius_meters
        {
            return Err(Invalidity::BadRadius {
                index: region.index,
                radius_meters: radius,
            });
        }

        Ok(())
    }

    /// Check a definition at `now`.
    ///
    /// A definition is valid iff it has at least one region, every region is
    /// plausible with a unique index, its trigger type is known, and it has not
    /// expired.
    pub fn check(
        &self,
        definition: &GeofenceDefinition,
        now: DateTime<Utc>,
    ) -> Result<(), Invalidity> {
        if definition.regions.is_empty() {
            return Err(Invalidity::NoRegions);
        }
        if definition.trigger_type == TriggerType::Unknown {
            return Err(Invalidity::UnknownTrigger);
        }
        if let Some(at) = definition.expires_at.filter(|at| *at <= now) {
            return Err(Invalidity::Expired(at));
        }

        let mut seen = HashSet::with_capacity(definition.regions.len());
        for region in &definition.regions {
            if !seen.insert(region.index) {
                return Err(Invalidity::DuplicateIndex(region.index));
            }
            self.check_region(region)?;
        }

        Ok(())
    }

    /// Returns `true` if [`check`](Self::check) passes.
    #[must_use]
    pub fn is_valid(&self, definition: &GeofenceDefinition, now: DateTime<Utc>) -> bool {
        self.check(definition, now).is_ok()
    }

    /// Returns a description of the first problem found in these limits, if any.
    #[must_use]
    pub fn problem(&self) -> Option<String> {
        if !self.min_radius_meters.is_finite() || self.min_radius_meters < 0.0 {
            return Some(format!(
                "min_radius_meters must be a non-negative number (got {})",
                self.min_radius_meters
            ));
        }
        if !self.max_radius_meters.is_finite() || self.max_radius_meters <= self.min_radius_meters {
            return Some(format!(
                "max_radius_meters must be greater than min_radius_meters (got {} <= {})",
                self.max_radius_meters, self.min_radius_meters
            ));
        }
        None
    }
}
