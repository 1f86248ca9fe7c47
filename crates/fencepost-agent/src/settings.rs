//! Layered settings: TOML file, then `FENCEPOST_*` environment overrides.
//!
//! Nested keys use a double underscore, e.g. `FENCEPOST_LOGGING__LEVEL=debug`
//! or `FENCEPOST_TAGS__SUBSCRIBED=gold,silver`.

use std::path::Path;

use config::{Config, Environment, File};
use fencepost_core::FencepostConfig;

use crate::error::AgentResult;

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "FENCEPOST";

/// Load settings from `path` (optional) and the process environment.
///
/// # Errors
///
/// Returns an error if a source cannot be parsed or the merged result fails
/// validation.
pub fn load(path: &Path) -> AgentResult<FencepostConfig> {
    load_with_env(path, Environment::with_prefix(ENV_PREFIX))
}

fn load_with_env(path: &Path, env: Environment) -> AgentResult<FencepostConfig> {
    let merged = Config::builder()
        .add_source(File::from(path).required(false))
        .add_source(
            env.separator("__")
                .list_separator(",")
                .with_list_parse_key("tags.subscribed")
                .try_parsing(true),
        )
        .build()?;

    let settings: FencepostConfig = merged.try_deserialize()?;
    settings.validate()?;
    Ok(settings)
}
