//! Unified error types for the fencepost core library.
//!
//! This module provides a unified error type [`FencepostError`] that covers all
//! failure modes the reconciliation engine and its adapters can surface.
//!
//! # Design Principles
//!
//! - **Specific variants**: Each error variant captures exactly one failure mode
//! - **Actionable messages**: Error messages guide callers toward resolution
//! - **Context preservation**: Wrapped errors maintain their original context
//!
//! Invalid or expired geofences are *not* errors. The engine drops them
//! silently; only port failures and configuration problems reach the caller.
//!
//! # Example
//!
//! ```rust
//! use fencepost_core::error::{FencepostError, Result};
//! use std::path::PathBuf;
//!
//! fn load_config(path: &PathBuf) -> Result<()> {
//!     if !path.exists() {
//!         return Err(FencepostError::ConfigNotFound(path.clone()));
//!     }
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// The unified error type for all fencepost operations.
#[derive(Debug, Error)]
pub enum FencepostError {
    // =========================================================================
    // PORT ERRORS
    // =========================================================================
    /// The geofence store could not be read or written.
    #[error("Geofence store unavailable: {0}")]
    StoreUnavailable(String),

    /// The platform geofencing service rejected a register or reset call.
    #[error("Geofence registrar failed: {0}")]
    RegistrarFailed(String),

    /// The tag subscription source could not be read.
    #[error("Tag subscriptions unavailable: {0}")]
    TagSourceUnavailable(String),

    /// The device does not grant location monitoring permission.
    #[error("Location monitoring permission denied. Grant background location access.")]
    MonitoringPermissionDenied,

    // =========================================================================
    // CONFIGURATION ERRORS
    // =========================================================================
    /// The configuration file was not found at the expected path.
    #[error("Configuration file not found at: {}", .0.display())]
    ConfigNotFound(PathBuf),

    /// The configuration file exists but could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    ConfigParseError(String),

    /// The configuration was parsed but contains invalid values.
    #[error("Configuration validation failed: {0}")]
    ConfigValidationError(String),

    // =========================================================================
    // PERSISTENCE & I/O ERRORS
    // =========================================================================
    /// An error occurred while persisting or reading data.
    #[error("Persistence error: {0}")]
    PersistenceError(String),

    /// Persisted data could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// A low-level I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A specialized [`Result`] type for fencepost operations.
pub type Result<T> = std::result::Result<T, FencepostError>;

impl FencepostError {
    /// Returns `true` if this error came from one of the engine's ports.
    #[inline]
    #[must_use]
    pub const fn is_port_error(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable(_)
                | Self::RegistrarFailed(_)
                | Self::TagSourceUnavailable(_)
                | Self::MonitoringPermissionDenied
        )
    }

    /// Returns `true` if this error is related to configuration.
    #[inline]
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound(_) | Self::ConfigParseError(_) | Self::ConfigValidationError(_)
        )
    }

    /// Returns `true` if this error is related to I/O or persistence.
    #[inline]
    #[must_use]
    pub const fn is_io_error(&self) -> bool {
        matches!(
            self,
            Self::PersistenceError(_) | Self::SerializationError(_) | Self::IoError(_)
        )
    }

    /// Returns `true` if retrying the whole sync later may succeed.
    ///
    /// Permission and configuration problems need user intervention first.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable(_)
                | Self::RegistrarFailed(_)
                | Self::TagSourceUnavailable(_)
                | Self::PersistenceError(_)
                | Self::IoError(_)
        )
    }

    /// Returns a machine-readable error code.
    #[inline]
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Self::RegistrarFailed(_) => "REGISTRAR_FAILED",
            Self::TagSourceUnavailable(_) => "TAG_SOURCE_UNAVAILABLE",
            Self::MonitoringPermissionDenied => "MONITORING_PERMISSION_DENIED",
            Self::ConfigNotFound(_) => "CONFIG_NOT_FOUND",
            Self::ConfigParseError(_) => "CONFIG_PARSE_ERROR",
            Self::ConfigValidationError(_) => "CONFIG_VALIDATION_ERROR",
            Self::PersistenceError(_) => "PERSISTENCE_ERROR",
            Self::SerializationError(_) => "SERIALIZATION_ERROR",
            Self::IoError(_) => "IO_ERROR",
        }
    }
}

// =============================================================================
// CONVERSIONS FROM CONFIG FORMAT ERRORS
// =============================================================================

impl From<toml::de::Error> for FencepostError {
    fn from(err: toml::de::Error) -> Self {
        Self::ConfigParseError(err.to_string())
    }
}

impl From<toml::ser::Error> for FencepostError {
    fn from(err: toml::ser::Error) -> Self {
        Self::ConfigParseError(err.to_string())
    }
}

// =============================================================================
// TESTS
// =============================================================================
