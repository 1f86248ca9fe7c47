//! # fencepost-agent
//!
//! Applies geofence updates, tag changes and region clears against the
//! device's persisted state.
//!
//! ## Running
//!
//! ```bash
//! # First sync from a delta file
//! fencepost-agent --data-dir ./state apply --delta delta.json
//!
//! # Nothing new from the server
//! fencepost-agent apply --no-delta
//!
//! # Inspect the stored collection
//! fencepost-agent show
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use anyhow::Context;
use clap::Parser;
use fencepost_agent::cli::{self, Cli};
use fencepost_agent::{logging, settings};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let config_path = args.config_path()?;
    let mut config = settings::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    if let Some(dir) = args.data_dir {
        config.data_dir = Some(dir);
    }

    logging::init(&config.logging, config.data_dir.as_deref())?;
    info!(config = %config_path.display(), "Starting fencepost-agent");

    let worker = cli::open_worker(&config)?;
    let report = cli::execute(&worker, args.command).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
