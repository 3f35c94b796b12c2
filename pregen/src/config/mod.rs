//! Configuration for the generation scheduler.
//!
//! Settings are read from an INI file (`~/.pregen/config.ini` by default).
//! Missing files and missing keys fall back to the defaults in
//! [`defaults`]; invalid values are rejected with
//! [`ConfigFileError::InvalidValue`] naming the offending key.
//!
//! # Example
//!
//! ```
//! use pregen::config::ConfigFile;
//!
//! let config = ConfigFile::default();
//! let scheduler_config = config.scheduler_config();
//! assert_eq!(scheduler_config.tick_interval, 1);
//! ```

pub mod defaults;
mod file;
mod parser;
mod settings;
mod writer;

pub use defaults::*;
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{ConfigFile, GenerationSettings, LoggingSettings, PersistenceSettings};
