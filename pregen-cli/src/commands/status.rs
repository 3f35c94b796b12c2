//! Status command - show saved generation progress.

use std::time::Duration;

use pregen::clock::{Clock, SystemClock};
use pregen::coord::RegionId;
use pregen::progress::{GenerationProgress, ProgressRecord};
use pregen::scheduler::format_eta;
use pregen::store::ProgressStore;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Run the status command.
pub fn run(runner: &CliRunner) -> Result<(), CliError> {
    let store_path = &runner.config().persistence.file;
    let records = runner.progress_store().load()?;

    if records.is_empty() {
        println!("No saved generation progress in {}", store_path.display());
        return Ok(());
    }

    println!("Generation progress ({})", store_path.display());
    println!();

    let stale_after = runner.config().scheduler_config().stale_after;
    let now = SystemClock.now_millis();
    for (id, record) in &records {
        println!("{}", describe(id, record, stale_after, now));
    }
    Ok(())
}

/// One status line for a saved record.
fn describe(id: &RegionId, record: &ProgressRecord, stale_after: Duration, now: u64) -> String {
    let progress = match GenerationProgress::from_record(record) {
        Ok(progress) => progress,
        Err(e) => return format!("{}: INVALID ({})", id, e),
    };

    let snapshot = progress.snapshot(now);
    let mut line = format!(
        "{}: {} {:.1}% ({}/{} cells, {} generated, {} skipped, radius {}, ETA {})",
        id,
        snapshot.status,
        snapshot.percent,
        snapshot.visited,
        snapshot.total_cells,
        snapshot.generated,
        snapshot.skipped,
        progress.radius(),
        format_eta(snapshot.eta_minutes),
    );
    if progress.is_stale(stale_after, now) {
        line.push_str(" [stale]");
    }
    if let Some(error) = snapshot.last_error {
        line.push_str(&format!(" last error: {}", error));
    }
    line
}
