//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::path::PathBuf;
use std::process;

use pregen::config::ConfigFileError;
use pregen::store::StoreError;
use pregen::PregenError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Invalid command-line argument
    InvalidArgument(String),
    /// Scheduler operation failed
    Scheduler(PregenError),
    /// Failed to start the async runtime
    Runtime(std::io::Error),
    /// Config file already present and `--force` not given
    AlreadyExists(PathBuf),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InvalidArgument(_) => 2,
            CliError::Config(_) | CliError::AlreadyExists(_) => 3,
            CliError::Scheduler(PregenError::Store(_)) => 4,
            _ => 1,
        }
    }

    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Scheduler(PregenError::Store(StoreError::Parse { path, .. })) => {
                eprintln!();
                eprintln!("The progress file could not be parsed:");
                eprintln!("  {}", path.display());
                eprintln!("The next save moves it to a .corrupt file and starts fresh.");
            }
            CliError::Scheduler(PregenError::Store(StoreError::UnsupportedVersion {
                path,
                ..
            })) => {
                eprintln!();
                eprintln!("The progress file was written by a newer version:");
                eprintln!("  {}", path.display());
                eprintln!("Upgrade pregen or point [persistence] file at another path.");
            }
            CliError::AlreadyExists(_) => {
                eprintln!();
                eprintln!("Use --force to overwrite it with the defaults.");
            }
            _ => {}
        }

        process::exit(self.exit_code())
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            CliError::Scheduler(e) => write!(f, "{}", e),
            CliError::Runtime(e) => write!(f, "Failed to start runtime: {}", e),
            CliError::AlreadyExists(path) => {
                write!(f, "Config file already exists: {}", path.display())
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Scheduler(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PregenError> for CliError {
    fn from(e: PregenError) -> Self {
        CliError::Scheduler(e)
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        CliError::Scheduler(PregenError::Store(e))
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pregen::coord::RegionId;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::InvalidArgument("x".into()).exit_code(), 2);
        assert_eq!(CliError::Config("x".into()).exit_code(), 3);
        assert_eq!(
            CliError::Scheduler(PregenError::UnknownRegion(RegionId::new("nether"))).exit_code(),
            1
        );
    }

    #[test]
    fn test_display_wraps_scheduler_error() {
        let err: CliError = PregenError::NotActive(RegionId::new("overworld")).into();
        assert!(err.to_string().contains("overworld"));
    }
}
