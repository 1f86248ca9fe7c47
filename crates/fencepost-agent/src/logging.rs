//! Logging initialization and configuration.
//!
//! This module provides environment-aware logging setup:
//! - **Production**: JSON logs to rolling files + compact logs to stderr
//! - **Development**: Pretty logs to stderr with span events
//!
//! Stdout is left to command output.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use fencepost_core::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Overrides the configured filter directive.
pub const LOG_LEVEL_ENV: &str = "FENCEPOST_LOG_LEVEL";

/// Static guards to keep non-blocking writers alive.
/// These must persist for the lifetime of the program.
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();
static STDERR_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Initialize the logging system.
///
/// The filter comes from `RUST_LOG`, then `FENCEPOST_LOG_LEVEL`, then
/// `config.level`.
///
/// # Production Mode
///
/// - Logs to rolling daily files in `/var/log/fencepost/` on Linux, or
///   `<data_dir>/logs` when a data directory is given
/// - JSON format in files, compact without ANSI colors on stderr
///
/// # Development Mode
///
/// - Pretty stderr output with span open and close events
///
/// # Errors
///
/// Returns an error if the filter directive cannot be parsed.
pub fn init(config: &LoggingConfig, data_dir: Option<&Path>) -> anyhow::Result<()> {
    let log_level = std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| config.level.clone());

    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&log_level))?;

    if config.production {
        init_production(env_filter, &log_directory(data_dir))?;
    } else {
        init_development(env_filter);
    }

    Ok(())
}

fn init_production(env_filter: EnvFilter, log_dir: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "fencepost");
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);
    let (non_blocking_stderr, stderr_guard) = tracing_appender::non_blocking(std::io::stderr());

    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking_file)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(non_blocking_stderr)
        .with_target(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()?;

    let _ = FILE_GUARD.set(file_guard);
    let _ = STDERR_GUARD.set(stderr_guard);

    Ok(())
}

fn init_development(env_filter: EnvFilter) {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);

    // A subscriber may already be installed, e.g. by a test harness.
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .try_init();
}

/// Directory for production log files.
fn log_directory(data_dir: Option<&Path>) -> PathBuf {
    if let Some(dir) = data_dir {
        return dir.join("logs");
    }
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/var/log/fencepost")
    }
    #[cfg(not(target_os = "linux"))]
    {
        directories::ProjectDirs::from("", "", "fencepost")
            .map_or_else(|| PathBuf::from("./logs"), |dirs| dirs.data_dir().join("logs"))
    }
}
