//! Configuration file handling for ~/.pregen/config.ini.
//!
//! Loads and saves user configuration with sensible defaults.
//! Settings structs live in [`super::settings`], constants in [`super::defaults`],
//! parsing in [`super::parser`], and serialization in [`super::writer`].

use ini::Ini;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub use super::defaults::*;
pub use super::settings::*;

use crate::scheduler::SchedulerConfig;
use crate::store::JsonFileStore;
use crate::task::TaskSettings;

const SECS_PER_HOUR: u64 = 3600;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

impl ConfigFile {
    /// Load configuration from the default path (~/.pregen/config.ini).
    pub fn load() -> Result<Self, ConfigFileError> {
        let path = config_file_path();
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Save configuration to the default path (~/.pregen/config.ini).
    pub fn save(&self) -> Result<(), ConfigFileError> {
        let path = config_file_path();
        self.save_to(&path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }

        let content = super::writer::to_config_string(self);
        std::fs::write(path, content).map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// Create the default config file if it doesn't exist.
    ///
    /// Returns the path to the config file.
    pub fn ensure_exists() -> Result<PathBuf, ConfigFileError> {
        let path = config_file_path();
        if !path.exists() {
            Self::default().save_to(&path)?;
        }
        Ok(path)
    }

    /// Scheduler tuning derived from this configuration.
    pub fn scheduler_config(&self) -> SchedulerConfig {
        let generation = &self.generation;
        let persistence = &self.persistence;

        SchedulerConfig {
            task: TaskSettings {
                rate: generation.rate,
                max_batch_time: Duration::from_millis(generation.max_batch_millis),
                pin_release_delay: Duration::from_millis(generation.pin_release_delay_millis),
                progress_log_interval: generation.progress_log_interval,
                throttle: self.throttle.clone(),
            },
            tick_interval: generation.tick_interval,
            save_interval: persistence.save_interval,
            default_radius: generation.default_radius,
            stale_after: hours(persistence.stale_after_hours),
            cleanup_after: hours(persistence.cleanup_after_hours),
        }
    }

    /// Store for the configured progress file.
    pub fn progress_store(&self) -> JsonFileStore {
        JsonFileStore::new(&self.persistence.file)
    }
}

/// Saturates rather than overflowing on absurd hour counts.
fn hours(count: u64) -> Duration {
    Duration::from_secs(count.saturating_mul(SECS_PER_HOUR))
}

/// Get the path to the config directory (~/.pregen).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".pregen")
}

/// Get the path to the config file (~/.pregen/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}
