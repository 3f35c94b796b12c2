//! Pregen CLI - Command-line interface
//!
//! Operator front end for the pregen library: drive the generation
//! scheduler against a simulated world, inspect saved progress and manage
//! the configuration file.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pregen::config::config_file_path;

use commands::run::RunArgs;
use error::CliError;
use runner::CliRunner;

#[derive(Parser)]
#[command(name = "pregen")]
#[command(version = pregen::VERSION)]
#[command(about = "Incremental background world generation", long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.pregen/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Log to the log file only
    #[arg(long, short, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate regions in a simulated world, resuming saved progress
    Run(RunArgs),

    /// Show saved generation progress
    Status,

    /// Remove completed and long-idle progress records
    Cleanup,

    /// Write a configuration file with default values
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = dispatch(cli) {
        e.exit();
    }
}

fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::InitConfig { force } => {
            let path = cli.config.unwrap_or_else(config_file_path);
            commands::init_config::run(&path, force)
        }
        Commands::Status => {
            let runner = CliRunner::without_logging(cli.config.as_deref())?;
            commands::status::run(&runner)
        }
        Commands::Cleanup => {
            let runner = CliRunner::new(cli.config.as_deref(), cli.debug, cli.quiet)?;
            commands::cleanup::run(&runner)
        }
        Commands::Run(args) => {
            let runner = CliRunner::new(cli.config.as_deref(), cli.debug, cli.quiet)?;
            commands::run::run(&runner, args)
        }
    }
}
