//! Agent error types.
//!
//! Engine and adapter failures arrive as [`FencepostError`] and are wrapped
//! unchanged so callers can still classify them.

use fencepost_core::FencepostError;
use thiserror::Error;

/// Result type alias for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;

/// Errors raised by the sync agent.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The engine or one of its ports failed.
    #[error(transparent)]
    Core(#[from] FencepostError),

    /// Layered settings could not be assembled.
    #[error("Failed to load settings: {0}")]
    Settings(#[from] config::ConfigError),

    /// A blocking engine call panicked or was cancelled.
    #[error("Sync worker task failed: {0}")]
    Worker(String),

    /// A command-line argument could not be interpreted.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl AgentError {
    /// Returns `true` if retrying the same operation later may succeed.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::Core(err) => err.is_recoverable(),
            Self::Worker(_) => true,
            Self::Settings(_) | Self::InvalidArgument(_) => false,
        }
    }
}

impl From<tokio::task::JoinError> for AgentError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Worker(err.to_string())
    }
}
