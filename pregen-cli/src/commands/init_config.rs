//! Init-config command - write a configuration file with default values.

use std::path::Path;

use pregen::config::ConfigFile;

use crate::error::CliError;

/// Write the default configuration to `path`.
///
/// An existing file is only replaced when `force` is set.
pub fn run(path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        return Err(CliError::AlreadyExists(path.to_path_buf()));
    }

    ConfigFile::default().save_to(path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_writes_loadable_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.ini");

        run(&path, false).unwrap();

        let loaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(loaded.generation, ConfigFile::default().generation);
    }

    #[test]
    fn test_refuses_to_overwrite_without_force() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.ini");
        std::fs::write(&path, "[generation]\nrate = 2\n").unwrap();

        assert!(matches!(run(&path, false), Err(CliError::AlreadyExists(_))));
        assert!(std::fs::read_to_string(&path).unwrap().contains("rate = 2"));

        run(&path, true).unwrap();
        let loaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(loaded.generation, ConfigFile::default().generation);
    }
}
