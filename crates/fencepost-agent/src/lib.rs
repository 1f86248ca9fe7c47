//! # fencepost-agent
//!
//! Caller-side driver for the fencepost geofence engine.
//!
//! The engine expects one call at a time and leaves the sync marker and tag
//! subscriptions to its caller. This crate provides both: a [`SyncWorker`]
//! that serializes engine calls and persists [`SyncPreferences`], plus the
//! layered settings, logging and command-line front end of the
//! `fencepost-agent` binary.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod cli;
pub mod error;
pub mod logging;
pub mod preferences;
pub mod settings;
pub mod worker;

pub use error::{AgentError, AgentResult};
pub use preferences::{PreferencesFile, SyncPreferences};
pub use worker::{AgentStatus, SyncWorker};
