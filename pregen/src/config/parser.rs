//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function and its helpers.
//! It is the single place where INI key names are mapped to struct fields.

use ini::Ini;
use std::path::PathBuf;
use std::str::FromStr;

use super::file::ConfigFileError;
use super::settings::ConfigFile;
use crate::throttle::{GenerationRate, NOMINAL_TPS};

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [generation] section
    if let Some(section) = ini.section(Some("generation")) {
        if let Some(v) = section.get("rate") {
            config.generation.rate = v
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(GenerationRate::from_cells_per_invocation)
                .ok_or_else(|| {
                    invalid(
                        "generation",
                        "rate",
                        v,
                        "must be a positive number (cells per invocation, e.g. 4 or 0.25)",
                    )
                })?;
        }
        if let Some(v) = section.get("tick_interval") {
            config.generation.tick_interval = parse_at_least("generation", "tick_interval", v, 1)?;
        }
        if let Some(v) = section.get("max_batch_millis") {
            config.generation.max_batch_millis =
                parse_at_least("generation", "max_batch_millis", v, 1)?;
        }
        if let Some(v) = section.get("pin_release_delay_millis") {
            config.generation.pin_release_delay_millis = parse_value(
                "generation",
                "pin_release_delay_millis",
                v,
                "must be a non-negative integer (milliseconds)",
            )?;
        }
        if let Some(v) = section.get("default_radius") {
            let radius: i32 = parse_value(
                "generation",
                "default_radius",
                v,
                "must be a non-negative integer",
            )?;
            if radius < 0 {
                return Err(invalid(
                    "generation",
                    "default_radius",
                    v,
                    "must be a non-negative integer",
                ));
            }
            config.generation.default_radius = radius;
        }
        if let Some(v) = section.get("progress_log_interval") {
            config.generation.progress_log_interval = parse_value(
                "generation",
                "progress_log_interval",
                v,
                "must be a non-negative integer (0 disables progress logging)",
            )?;
        }
    }

    // [throttle] section
    if let Some(section) = ini.section(Some("throttle")) {
        if let Some(v) = section.get("min_tps") {
            config.throttle.min_tps = parse_tps("min_tps", v)?;
        }
        if let Some(v) = section.get("high_tps") {
            config.throttle.high_tps = parse_tps("high_tps", v)?;
        }
        if let Some(v) = section.get("mid_tps") {
            config.throttle.mid_tps = parse_tps("mid_tps", v)?;
        }
        if let Some(v) = section.get("low_tps") {
            config.throttle.low_tps = parse_tps("low_tps", v)?;
        }
        if let Some(v) = section.get("max_memory_percent") {
            let percent: u8 = parse_value(
                "throttle",
                "max_memory_percent",
                v,
                "must be an integer between 0 and 100",
            )?;
            if percent > 100 {
                return Err(invalid(
                    "throttle",
                    "max_memory_percent",
                    v,
                    "must be an integer between 0 and 100",
                ));
            }
            config.throttle.max_memory_percent = percent;
        }
        if let Some(v) = section.get("pause_when_users_present") {
            config.throttle.pause_when_users_present = parse_bool(v);
        }
    }

    let bands = &config.throttle;
    if bands.mid_tps > bands.high_tps {
        return Err(invalid(
            "throttle",
            "mid_tps",
            &bands.mid_tps.to_string(),
            "must not exceed high_tps",
        ));
    }
    if bands.low_tps > bands.mid_tps {
        return Err(invalid(
            "throttle",
            "low_tps",
            &bands.low_tps.to_string(),
            "must not exceed mid_tps",
        ));
    }

    // [persistence] section
    if let Some(section) = ini.section(Some("persistence")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.persistence.file = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("save_interval") {
            config.persistence.save_interval = parse_at_least("persistence", "save_interval", v, 1)?;
        }
        if let Some(v) = section.get("stale_after_hours") {
            config.persistence.stale_after_hours = parse_value(
                "persistence",
                "stale_after_hours",
                v,
                "must be a non-negative integer (hours)",
            )?;
        }
        if let Some(v) = section.get("cleanup_after_hours") {
            config.persistence.cleanup_after_hours = parse_value(
                "persistence",
                "cleanup_after_hours",
                v,
                "must be a non-negative integer (hours)",
            )?;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = expand_tilde(v);
            }
        }
    }

    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_value<T: FromStr>(
    section: &str,
    key: &str,
    value: &str,
    reason: &str,
) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, reason))
}

fn parse_at_least(section: &str, key: &str, value: &str, min: u64) -> Result<u64, ConfigFileError> {
    let reason = format!("must be an integer of at least {}", min);
    let parsed: u64 = parse_value(section, key, value, &reason)?;
    if parsed < min {
        return Err(invalid(section, key, value, &reason));
    }
    Ok(parsed)
}

fn parse_tps(key: &str, value: &str) -> Result<f64, ConfigFileError> {
    let reason = format!("must be a number between 0 and {}", NOMINAL_TPS);
    let tps: f64 = parse_value("throttle", key, value, &reason)?;
    if !(0.0..=NOMINAL_TPS).contains(&tps) {
        return Err(invalid("throttle", key, value, &reason));
    }
    Ok(tps)
}

/// Parse a boolean value from a string.
pub(super) fn parse_bool(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v == "true" || v == "1" || v == "yes" || v == "on"
}

/// Expand ~ to home directory in paths.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
