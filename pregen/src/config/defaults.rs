//! Default values for all configuration settings.
//!
//! Contains the `DEFAULT_*` constants and the `ConfigFile::default()`
//! implementation.

use super::file::config_directory;
use super::settings::*;
use crate::throttle::{GenerationRate, ThrottleSettings};

// =============================================================================
// [generation]
// =============================================================================

/// Cells processed per invocation at full speed.
pub const DEFAULT_RATE: f64 = 4.0;

/// Host ticks between work cycles.
pub const DEFAULT_TICK_INTERVAL: u64 = 1;

/// Wall-clock budget per batch (ms). Half a 20 TPS tick.
pub const DEFAULT_MAX_BATCH_MILLIS: u64 = 25;

/// How long processed cells stay pinned (ms).
pub const DEFAULT_PIN_RELEASE_DELAY_MILLIS: u64 = 5_000;

/// Radius used when a region declares no bound.
pub const DEFAULT_RADIUS: i32 = 256;

/// Visited cells between progress log lines.
pub const DEFAULT_PROGRESS_LOG_INTERVAL: u64 = 500;

// =============================================================================
// [throttle]
// =============================================================================

pub const DEFAULT_MIN_TPS: f64 = 15.0;
pub const DEFAULT_HIGH_TPS: f64 = 19.0;
pub const DEFAULT_MID_TPS: f64 = 17.0;
pub const DEFAULT_LOW_TPS: f64 = 15.0;
pub const DEFAULT_MAX_MEMORY_PERCENT: u8 = 85;

// =============================================================================
// [persistence]
// =============================================================================

/// Progress document file name inside the config directory.
pub const DEFAULT_PROGRESS_FILENAME: &str = "progress.json";

/// Work cycles between periodic saves (~10s at 20 TPS).
pub const DEFAULT_SAVE_INTERVAL: u64 = 200;

/// Saved runs idle longer than this are not resumed.
pub const DEFAULT_STALE_AFTER_HOURS: u64 = 24;

/// Saved records idle longer than this are pruned (one week).
pub const DEFAULT_CLEANUP_AFTER_HOURS: u64 = 168;

// =============================================================================
// [logging]
// =============================================================================

pub const DEFAULT_LOG_FILENAME: &str = "pregen.log";

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            rate: GenerationRate::default(),
            tick_interval: DEFAULT_TICK_INTERVAL,
            max_batch_millis: DEFAULT_MAX_BATCH_MILLIS,
            pin_release_delay_millis: DEFAULT_PIN_RELEASE_DELAY_MILLIS,
            default_radius: DEFAULT_RADIUS,
            progress_log_interval: DEFAULT_PROGRESS_LOG_INTERVAL,
        }
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        let config_dir = config_directory();

        Self {
            generation: GenerationSettings::default(),
            throttle: ThrottleSettings::default(),
            persistence: PersistenceSettings {
                file: config_dir.join(DEFAULT_PROGRESS_FILENAME),
                save_interval: DEFAULT_SAVE_INTERVAL,
                stale_after_hours: DEFAULT_STALE_AFTER_HOURS,
                cleanup_after_hours: DEFAULT_CLEANUP_AFTER_HOURS,
            },
            logging: LoggingSettings {
                file: config_dir.join(DEFAULT_LOG_FILENAME),
            },
        }
    }
}
