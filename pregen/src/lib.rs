//! Pregen - incremental background world generation
//!
//! This library schedules generation of large square regions of a
//! procedurally generated world without starving the live server that hosts
//! it. Regions are walked in an outward spiral from their center, a few cells
//! per host tick, with throttling against tick latency, memory pressure and
//! user presence. Progress survives restarts.
//!
//! # High-Level API
//!
//! The [`scheduler`] module is the entry point:
//!
//! ```ignore
//! use pregen::config::ConfigFile;
//! use pregen::scheduler::Scheduler;
//!
//! let config = ConfigFile::load()?;
//! let mut scheduler = Scheduler::new(config.scheduler_config(), Arc::new(config.progress_store()));
//! scheduler.resume_saved_tasks(&world)?;
//!
//! // From the host's tick loop
//! scheduler.tick(&world);
//! ```
//!
//! The host world is reached only through the traits in [`backend`].

pub mod backend;
pub mod clock;
pub mod config;
pub mod coord;
pub mod error;
pub mod logging;
pub mod progress;
pub mod scheduler;
pub mod spiral;
pub mod store;
pub mod task;
pub mod throttle;

pub use error::PregenError;

/// Version of the pregen library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
