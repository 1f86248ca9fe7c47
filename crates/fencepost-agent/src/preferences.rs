//! Caller-owned sync state: the last successful sync and the tag subscriptions.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use fencepost_core::{Result, SyncMarker};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Preferences file name within the data directory.
pub const PREFERENCES_FILE: &str = "preferences.json";

/// State the agent carries between engine calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncPreferences {
    /// When the last update was applied successfully.
    pub last_sync: SyncMarker,

    /// Tags the device has subscribed to. `None` until it changes them,
    /// in which case the configured defaults apply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscribed_tags: Option<BTreeSet<String>>,
}

/// Reads and writes [`SyncPreferences`] as JSON.
#[derive(Debug, Clone)]
pub struct PreferencesFile {
    path: PathBuf,
}

impl PreferencesFile {
    /// Preferences stored in `data_dir`.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(PREFERENCES_FILE),
        }
    }

    /// Path of the preferences file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load preferences, or defaults if none were saved yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(&self) -> Result<SyncPreferences> {
        if !self.path.exists() {
            return Ok(SyncPreferences::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write preferences.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, preferences: &SyncPreferences) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(preferences)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(last_sync = %preferences.last_sync, "Saved sync preferences");
        Ok(())
    }
}
