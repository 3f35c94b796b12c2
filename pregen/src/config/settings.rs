//! Settings structs for each configuration section.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use std::path::PathBuf;

use crate::throttle::{GenerationRate, ThrottleSettings};

/// Complete configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    /// Batch sizing and cadence
    pub generation: GenerationSettings,
    /// Performance thresholds (`[throttle]`)
    pub throttle: ThrottleSettings,
    /// Progress file and save cadence
    pub persistence: PersistenceSettings,
    /// Log output
    pub logging: LoggingSettings,
}

/// Generation cadence configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    /// Cells per invocation, or a fractional cadence below one
    pub rate: GenerationRate,
    /// Host ticks between work cycles
    pub tick_interval: u64,
    /// Wall-clock budget for one batch, in milliseconds
    pub max_batch_millis: u64,
    /// How long processed cells stay pinned, in milliseconds
    pub pin_release_delay_millis: u64,
    /// Radius used when a region declares no bound
    pub default_radius: i32,
    /// Visited cells between progress log lines
    pub progress_log_interval: u64,
}

/// Progress persistence configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistenceSettings {
    /// Progress document path
    pub file: PathBuf,
    /// Work cycles between periodic saves
    pub save_interval: u64,
    /// Saved runs idle longer than this are not resumed
    pub stale_after_hours: u64,
    /// Saved records idle longer than this are pruned
    pub cleanup_after_hours: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
}
