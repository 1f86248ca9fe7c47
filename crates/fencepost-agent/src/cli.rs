//! Command-line interface.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use fencepost_core::{FencepostConfig, GeofenceId, MemoryRegistrar, Transition, UpdateDelta};
use serde::Serialize;
use serde_json::json;

use crate::error::{AgentError, AgentResult};
use crate::worker::SyncWorker;

/// Drive the fencepost geofence engine.
#[derive(Debug, Parser)]
#[command(name = "fencepost-agent", version, about)]
pub struct Cli {
    /// Configuration file. Defaults to the platform location.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the data directory.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Agent subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Apply a server update.
    Apply {
        /// JSON file holding the update delta
        #[arg(long, conflicts_with = "no_delta")]
        delta: Option<PathBuf>,

        /// The server reported nothing new
        #[arg(long)]
        no_delta: bool,
    },
    /// Register the stored geofences again under the current tags
    Reregister,
    /// Subscribe to tags
    Subscribe {
        /// Tags to add
        #[arg(required = true)]
        tags: Vec<String>,
    },
    /// Unsubscribe from tags
    Unsubscribe {
        /// Tags to remove
        #[arg(required = true)]
        tags: Vec<String>,
    },
    /// Stop monitoring specific circles
    Clear {
        /// Circle to clear, as `<geofence id>:<region index>`
        #[arg(long = "region", value_parser = parse_region, required = true)]
        regions: Vec<(GeofenceId, u32)>,
    },
    /// Resolve a platform transition callback to the geofence it fires
    Transition {
        /// Circle that was crossed, as `<geofence id>:<region index>`
        #[arg(long, value_parser = parse_region)]
        region: (GeofenceId, u32),

        /// Direction of the crossing
        #[arg(long, value_enum)]
        direction: Direction,
    },
    /// Erase the stored collection. The next update is a first sync.
    ResetStore,
    /// Print the stored state
    Show,
}

/// Direction of a region crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Direction {
    /// Entered the circle
    Enter,
    /// Left the circle
    Exit,
}

impl From<Direction> for Transition {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Enter => Self::Enter,
            Direction::Exit => Self::Exit,
        }
    }
}

/// Parse `<id>:<index>`.
fn parse_region(value: &str) -> Result<(GeofenceId, u32), String> {
    let (id, index) = value
        .split_once(':')
        .ok_or_else(|| format!("expected <id>:<index>, got `{value}`"))?;
    let id = id
        .trim()
        .parse()
        .map_err(|e| format!("bad geofence id `{id}`: {e}"))?;
    let index = index
        .trim()
        .parse()
        .map_err(|e| format!("bad region index `{index}`: {e}"))?;
    Ok((id, index))
}

impl Cli {
    /// The configuration file to read.
    ///
    /// # Errors
    ///
    /// Returns an error if no default location can be determined.
    pub fn config_path(&self) -> AgentResult<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => Ok(FencepostConfig::default_path()?),
        }
    }
}

/// Open a worker for `config` with an in-process registrar.
///
/// # Errors
///
/// Returns an error if the agent state cannot be opened.
pub fn open_worker(config: &FencepostConfig) -> AgentResult<SyncWorker> {
    let registrar = match config.max_regions {
        Some(limit) => MemoryRegistrar::new().with_region_limit(limit),
        None => MemoryRegistrar::new(),
    };
    SyncWorker::open(config, Arc::new(registrar))
}

/// Read an update delta from a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn read_delta(path: &Path) -> AgentResult<UpdateDelta> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| AgentError::InvalidArgument(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&content)
        .map_err(|e| AgentError::InvalidArgument(format!("{}: {e}", path.display())))
}

/// Run `command` and return its JSON report.
///
/// # Errors
///
/// Returns the failure of the underlying worker call.
pub async fn execute(worker: &SyncWorker, command: Command) -> AgentResult<serde_json::Value> {
    match command {
        Command::Apply { delta, no_delta } => {
            let delta = match (delta, no_delta) {
                (Some(path), _) => Some(read_delta(&path)?),
                (None, true) => None,
                (None, false) => {
                    return Err(AgentError::InvalidArgument(
                        "apply needs --delta <file> or --no-delta".into(),
                    ))
                }
            };
            let outcome = worker.apply(delta).await?;
            Ok(json!({
                "reset": outcome.reset,
                "merged": outcome.merged,
                "upserted": outcome.merge.upserted,
                "tombstoned": outcome.merge.tombstoned,
                "deleted": outcome.merge.deleted,
                "culled": outcome.culled,
                "persisted": outcome.persisted,
                "registered_regions": outcome.registered_regions,
            }))
        }
        Command::Reregister => {
            worker.reregister().await?;
            Ok(json!({ "reregistered": true }))
        }
        Command::Subscribe { tags } => {
            let changed = worker.subscribe(tags).await?;
            Ok(json!({ "changed": changed }))
        }
        Command::Unsubscribe { tags } => {
            let changed = worker.unsubscribe(tags).await?;
            Ok(json!({ "changed": changed }))
        }
        Command::Clear { regions } => {
            let cleared = worker.clear(regions).await?;
            Ok(json!({ "cleared_regions": cleared }))
        }
        Command::Transition {
            region: (id, index),
            direction,
        } => {
            let trigger = worker.transition(id, index, direction.into()).await?;
            Ok(json!({ "fired": trigger.is_some(), "trigger": trigger }))
        }
        Command::ResetStore => {
            worker.reset_store().await?;
            Ok(json!({ "reset": true }))
        }
        Command::Show => to_value(&worker.status().await?),
    }
}

fn to_value<T: Serialize>(value: &T) -> AgentResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| AgentError::Core(e.into()))
}
