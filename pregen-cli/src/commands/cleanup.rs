//! Cleanup command - prune finished and abandoned progress records.

use crate::error::CliError;
use crate::runner::CliRunner;

/// Run the cleanup command.
pub fn run(runner: &CliRunner) -> Result<(), CliError> {
    runner.log_startup("cleanup");

    let scheduler = runner.create_scheduler();
    let removed = scheduler.cleanup_saved_tasks()?;

    if removed == 0 {
        println!("No saved records to remove.");
    } else {
        println!(
            "Removed {} saved record{}.",
            removed,
            if removed == 1 { "" } else { "s" }
        );
    }
    Ok(())
}
