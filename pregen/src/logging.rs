//! Logging infrastructure for the generation scheduler.
//!
//! Provides structured logging with file output and optional console output:
//! - Writes to the configured log file (cleared on session start)
//! - Optionally prints to stdout for interactive runs
//! - Configurable via RUST_LOG environment variable

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping this guard will flush and close the log file writer.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Where and how verbosely to log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogOptions {
    /// Full path of the log file.
    pub file: PathBuf,
    /// Mirror log output to stdout.
    pub stdout: bool,
    /// Log this crate at debug level when RUST_LOG is not set.
    pub debug: bool,
}

impl LogOptions {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            stdout: true,
            debug: false,
        }
    }

    pub fn with_stdout(mut self, stdout: bool) -> Self {
        self.stdout = stdout;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Filter directive used when RUST_LOG is not set.
    pub fn default_directive(&self) -> &'static str {
        if self.debug {
            "info,pregen=debug"
        } else {
            "info"
        }
    }

    /// Directory and file name of the log file.
    fn split_path(&self) -> io::Result<(&Path, &Path)> {
        let name = self.file.file_name().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Log path {} has no file name", self.file.display()),
            )
        })?;
        let dir = self
            .file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Ok((dir, Path::new(name)))
    }

    /// Creates the log directory and truncates the log file.
    fn prepare(&self) -> io::Result<(&Path, &Path)> {
        let (dir, name) = self.split_path()?;
        fs::create_dir_all(dir)?;
        fs::write(dir.join(name), "")?;
        Ok((dir, name))
    }
}

/// Initialize the global logging subscriber.
///
/// Creates the log directory if needed, clears the previous log file, and
/// installs a file layer plus an optional stdout layer.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created or the log file
/// cannot be cleared.
pub fn init_logging(options: &LogOptions) -> Result<LoggingGuard, io::Error> {
    let (dir, name) = options.prepare()?;

    let file_appender = tracing_appender::rolling::never(dir, name);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_target(true);

    let stdout_layer = options.stdout.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(io::stdout)
            .with_ansi(true)
            .compact()
    });

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(options.default_directive()));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_builder_defaults() {
        let options = LogOptions::new("/tmp/pregen.log");
        assert!(options.stdout);
        assert!(!options.debug);
        assert_eq!(options.default_directive(), "info");

        let options = options.with_stdout(false).with_debug(true);
        assert!(!options.stdout);
        assert_eq!(options.default_directive(), "info,pregen=debug");
    }

    #[test]
    fn test_prepare_creates_directory_and_clears_file() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("nested").join("deep").join("pregen.log");
        let options = LogOptions::new(&log_path);

        options.prepare().unwrap();
        assert!(log_path.exists());

        fs::write(&log_path, "old log data").unwrap();
        options.prepare().unwrap();
        assert_eq!(fs::read_to_string(&log_path).unwrap(), "");
    }

    #[test]
    fn test_bare_file_name_uses_current_directory() {
        let options = LogOptions::new("pregen.log");
        let (dir, name) = options.split_path().unwrap();
        assert_eq!(dir, Path::new("."));
        assert_eq!(name, Path::new("pregen.log"));
    }

    #[test]
    fn test_path_without_file_name_is_rejected() {
        let options = LogOptions::new("/");
        assert!(options.split_path().is_err());
    }

    #[test]
    fn test_guard_structure() {
        use tracing_appender::non_blocking::NonBlocking;

        let (non_blocking, guard) = NonBlocking::new(std::io::sink());
        drop(non_blocking);

        let _logging_guard = LoggingGuard { _file_guard: guard };
    }

    // Actual log output needs a global subscriber, which can only be installed
    // once per process; it is exercised by the CLI.
}
