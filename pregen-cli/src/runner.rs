//! CLI runner for common setup and operations.
//!
//! Encapsulates config loading, logging initialization and scheduler
//! construction so command handlers stay small.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pregen::config::{config_file_path, ConfigFile};
use pregen::logging::{init_logging, LogOptions, LoggingGuard};
use pregen::scheduler::Scheduler;
use pregen::store::ProgressStore;
use tracing::info;

use crate::error::CliError;

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    #[allow(dead_code)]
    logging_guard: Option<LoggingGuard>,
    /// Loaded configuration file
    config: ConfigFile,
    /// Where the configuration was read from
    config_path: PathBuf,
}

impl CliRunner {
    /// Load config and initialize logging.
    ///
    /// # Arguments
    ///
    /// * `config_path` - Config file to read; the default location when `None`
    /// * `debug` - Log this crate at debug level regardless of RUST_LOG
    /// * `quiet` - Log to the file only
    pub fn new(config_path: Option<&Path>, debug: bool, quiet: bool) -> Result<Self, CliError> {
        let runner = Self::without_logging(config_path)?;

        let options = LogOptions::new(&runner.config.logging.file)
            .with_stdout(!quiet)
            .with_debug(debug);
        let logging_guard =
            init_logging(&options).map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard: Some(logging_guard),
            ..runner
        })
    }

    /// Load config without installing a global subscriber.
    pub fn without_logging(config_path: Option<&Path>) -> Result<Self, CliError> {
        let config_path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(config_file_path);
        let config = ConfigFile::load_from(&config_path)?;

        Ok(Self {
            logging_guard: None,
            config,
            config_path,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("Pregen v{}", pregen::VERSION);
        info!(config = %self.config_path.display(), "Pregen CLI: {} command", command);
    }

    /// Store backed by the configured progress file.
    pub fn progress_store(&self) -> Arc<dyn ProgressStore> {
        Arc::new(self.config.progress_store())
    }

    /// Scheduler using the configured tuning and progress file.
    pub fn create_scheduler(&self) -> Scheduler {
        Scheduler::new(self.config.scheduler_config(), self.progress_store())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_config_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.ini");

        let runner = CliRunner::without_logging(Some(&path)).unwrap();
        assert_eq!(runner.config_path(), path.as_path());
        assert_eq!(
            runner.config().generation.tick_interval,
            pregen::config::DEFAULT_TICK_INTERVAL
        );
    }

    #[test]
    fn test_scheduler_starts_empty() {
        let temp_dir = TempDir::new().unwrap();
        let runner =
            CliRunner::without_logging(Some(&temp_dir.path().join("config.ini"))).unwrap();
        assert_eq!(runner.create_scheduler().active_count(), 0);
    }
}
