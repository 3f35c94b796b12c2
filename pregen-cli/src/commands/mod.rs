//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`cleanup`] - Prune completed and long-idle progress records
//! - [`init_config`] - Write a default configuration file
//! - [`run`] - Drive the scheduler against a simulated world
//! - [`status`] - Show saved generation progress

pub mod cleanup;
pub mod init_config;
pub mod run;
pub mod status;
