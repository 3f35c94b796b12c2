//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! This module contains the `to_config_string()` function that produces
//! the commented INI representation written to `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let generation = &config.generation;
    let throttle = &config.throttle;
    let persistence = &config.persistence;

    format!(
        r#"[generation]
; Cells processed per invocation at full speed (default: 4)
; Values below 1 generate one cell every 1/rate invocations (e.g. 0.25 = every 4th)
rate = {}
; Host ticks between work cycles (default: 1)
tick_interval = {}
; Wall-clock budget for one batch in milliseconds (default: 25)
max_batch_millis = {}
; How long processed cells stay pinned in milliseconds (default: 5000)
pin_release_delay_millis = {}
; Radius used when a region declares no bound (default: 256)
default_radius = {}
; Log progress every N visited cells, 0 disables (default: 500)
progress_log_interval = {}

[throttle]
; Generation pauses below this many ticks per second (default: 15)
min_tps = {}
; Batch size bands: full rate at or above high_tps, one less at or above
; mid_tps, a single cell at or above low_tps, nothing below (defaults: 19/17/15)
high_tps = {}
mid_tps = {}
low_tps = {}
; Generation pauses while memory usage exceeds this percentage (default: 85)
max_memory_percent = {}
; Pause while users are present in the target region (default: false)
pause_when_users_present = {}

[persistence]
; Progress file, written on every task change and periodically
file = {}
; Work cycles between periodic saves (default: 200)
save_interval = {}
; Saved runs idle longer than this are not resumed (default: 24)
stale_after_hours = {}
; Saved records idle longer than this are removed by cleanup (default: 168)
cleanup_after_hours = {}

[logging]
; Log file path
file = {}
"#,
        generation.rate.cells_per_invocation(),
        generation.tick_interval,
        generation.max_batch_millis,
        generation.pin_release_delay_millis,
        generation.default_radius,
        generation.progress_log_interval,
        throttle.min_tps,
        throttle.high_tps,
        throttle.mid_tps,
        throttle.low_tps,
        throttle.max_memory_percent,
        throttle.pause_when_users_present,
        path_to_string(&persistence.file),
        persistence.save_interval,
        persistence.stale_after_hours,
        persistence.cleanup_after_hours,
        path_to_string(&config.logging.file),
    )
}

/// Convert a path to a string, using ~ for home directory.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}
