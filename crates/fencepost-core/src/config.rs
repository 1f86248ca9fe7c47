//! Application configuration management.
//!
//! Handles loading, saving, and validating fencepost configuration including:
//! - Data directory for the persisted geofence collection
//! - Region validation limits
//! - Initial tag subscriptions
//! - Logging preferences

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FencepostError, Result};
use crate::validation::ValidationLimits;

/// Main application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FencepostConfig {
    /// Directory for persisted state. `None` uses the platform default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Most circles the platform monitor accepts at once. `None` is unlimited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_regions: Option<usize>,

    /// Bounds applied to every region of an incoming geofence.
    pub validation: ValidationLimits,

    /// Tag subscriptions used until the device records its own.
    pub tags: TagsConfig,

    /// Logging preferences.
    pub logging: LoggingConfig,
}

/// Tag subscription settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagsConfig {
    /// Tags subscribed on first run.
    pub subscribed: BTreeSet<String>,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `fencepost_core=debug`.
    pub level: String,

    /// Write JSON logs to rolling files instead of pretty stdout.
    pub production: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            production: false,
        }
    }
}

impl FencepostConfig {
    /// Load configuration from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, cannot be read, or does not parse.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(FencepostError::ConfigNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `path`, falling back to defaults if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        match Self::load(path) {
            Err(FencepostError::ConfigNotFound(_)) => Ok(Self::default()),
            other => other,
        }
    }

    /// Save configuration to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check values that parse but make no sense.
    ///
    /// # Errors
    ///
    /// Returns `ConfigValidationError` describing every problem found.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if let Some(problem) = self.validation.problem() {
            problems.push(format!("validation: {problem}"));
        }
        if self.max_regions == Some(0) {
            problems.push("max_regions: must be at least 1".to_string());
        }
        if self.tags.subscribed.iter().any(|t| t.trim().is_empty()) {
            problems.push("tags.subscribed: tags cannot be blank".to_string());
        }
        if self.logging.level.trim().is_empty() {
            problems.push("logging.level: cannot be empty".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(FencepostError::ConfigValidationError(problems.join("; ")))
        }
    }

    /// The configured data directory, or the platform default.
    ///
    /// # Errors
    ///
    /// Returns an error if no default location can be determined.
    pub fn resolved_data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => crate::storage::default_data_dir(),
        }
    }

    /// Get the default configuration file path.
    ///
    /// On Linux devices: `/etc/fencepost/config.toml`
    /// Elsewhere: the platform config directory.
    ///
    /// # Errors
    ///
    /// Returns an error if no home directory can be determined.
    pub fn default_path() -> Result<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            Ok(PathBuf::from("/etc/fencepost/config.toml"))
        }
        #[cfg(not(target_os = "linux"))]
        {
            let dirs = directories::ProjectDirs::from("", "", "fencepost").ok_or_else(|| {
                FencepostError::ConfigValidationError("Cannot determine config directory".into())
            })?;
            Ok(dirs.config_dir().join("config.toml"))
        }
    }
}
