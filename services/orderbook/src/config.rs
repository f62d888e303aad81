//! Configuration for the replay service
//!
//! Layered, lowest precedence first: built-in defaults, an optional TOML
//! file, `LOB_REPLAY_*` environment variables (nested keys joined by `__`,
//! e.g. `LOB_REPLAY_REPLAY__DEPTH_LEVELS=10`). The binary applies its CLI
//! flags on top.

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::analytics::MAX_DEPTH_LEVELS;
use crate::replay::ReplayConfig;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "LOB_REPLAY";

/// Replay service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Event sources
    pub input: InputConfig,
    /// Metrics destination and console output
    pub output: OutputConfig,
    /// Replay parameters
    pub replay: ReplayConfig,
}

/// Event file locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Order lifecycle dump
    pub orders_path: PathBuf,
    /// Trade print dump
    pub trades_path: PathBuf,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            orders_path: PathBuf::from("Data/nse_orders_data.csv"),
            trades_path: PathBuf::from("Data/nse_trades_data.csv"),
        }
    }
}

/// Output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Metrics CSV path
    pub metrics_path: PathBuf,
    /// Events between console depth prints (0 disables)
    pub print_interval: u64,
    /// Levels shown in the console ladder
    pub print_depth: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            metrics_path: PathBuf::from("Output/metrics_output.csv"),
            print_interval: 1000,
            print_depth: 5,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from an optional file plus environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("failed to read configuration")?;

        let config: Self = settings
            .try_deserialize()
            .context("invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the replay cannot run with
    pub fn validate(&self) -> Result<()> {
        let replay = &self.replay;
        ensure!(
            (1..=MAX_DEPTH_LEVELS).contains(&replay.depth_levels),
            "depth_levels must be within [1, {MAX_DEPTH_LEVELS}], got {}",
            replay.depth_levels
        );
        ensure!(
            self.output.print_depth <= MAX_DEPTH_LEVELS,
            "print_depth must be at most {MAX_DEPTH_LEVELS}, got {}",
            self.output.print_depth
        );
        ensure!(
            (0.0..=1.0).contains(&replay.decay_lambda),
            "decay_lambda must be within [0, 1], got {}",
            replay.decay_lambda
        );
        ensure!(replay.snapshot_interval >= 1, "snapshot_interval must be at least 1");
        ensure!(replay.snapshot_capacity >= 1, "snapshot_capacity must be at least 1");
        Ok(())
    }
}
