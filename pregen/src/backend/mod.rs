//! Interface to the host's world backend.
//!
//! The scheduler never touches world storage directly. Everything it needs
//! from the host goes through two traits:
//!
//! - [`WorldBackend`]: the region registry plus server-wide performance
//!   signals (tick latency, memory usage).
//! - [`RegionBackend`]: a live handle to one region, used to pin cells,
//!   query their persisted state and force generation.
//!
//! Optional signals are declared up front through [`BackendCapabilities`]
//! rather than discovered at runtime, so a backend that cannot report memory
//! pressure simply never triggers the memory throttle.
//!
//! [`simulated`] provides an in-memory implementation used by tests and the
//! CLI simulation.

pub mod simulated;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::coord::{CellCoord, RegionId};

pub use simulated::{SimulatedRegion, SimulatedWorld};

/// Errors reported by a region backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Generating a single cell failed. Retried by the task.
    #[error("Cell {coord} failed to generate: {reason}")]
    Generation { coord: CellCoord, reason: String },

    /// The persisted state of a cell could not be read. Retried by the task.
    #[error("Cell {coord} status unavailable: {reason}")]
    StatusUnavailable { coord: CellCoord, reason: String },

    /// The region itself is unusable; retrying individual cells is pointless.
    #[error("Region backend failure: {0}")]
    Fatal(String),
}

impl BackendError {
    /// Whether the error affects the whole region rather than one cell.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BackendError::Fatal(_))
    }
}

/// Persisted generation state of a cell, as stored by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellStatus {
    /// Nothing has been generated for this cell.
    Missing,
    /// Generation started but the cell is not complete.
    Partial,
    /// The cell is fully generated and saved.
    Generated,
}

impl CellStatus {
    pub fn is_generated(&self) -> bool {
        matches!(self, CellStatus::Generated)
    }
}

/// Optional signals a backend is able to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BackendCapabilities {
    /// [`WorldBackend::memory_usage_percent`] reflects real memory pressure.
    pub memory_usage: bool,
    /// [`RegionBackend::has_live_users`] reflects real user presence.
    pub live_users: bool,
}

impl BackendCapabilities {
    /// Every optional signal is supported.
    pub fn all() -> Self {
        Self {
            memory_usage: true,
            live_users: true,
        }
    }
}

/// Registration metadata for a region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionMetadata {
    /// Cell the generation spiral starts from.
    pub center: CellCoord,
    /// World seed, carried through for reproducibility.
    pub seed: i64,
    /// Whether the region accepts background generation at all.
    pub generation_enabled: bool,
    /// Configured world bound, in cells from the center, if the region has one.
    pub bound_radius: Option<i32>,
}

/// Live handle to one region's generation backend.
pub trait RegionBackend: Send + Sync {
    /// Keep a cell resident. `ttl_hint` is how long the caller expects to
    /// hold the pin.
    fn pin_cell(&self, coord: CellCoord, ttl_hint: Duration);

    /// Release a pin taken with [`RegionBackend::pin_cell`].
    fn unpin_cell(&self, coord: CellCoord);

    /// The cell's state in persistent storage (not merely whether it is
    /// currently loaded).
    fn persisted_cell_status(&self, coord: CellCoord) -> Result<CellStatus, BackendError>;

    /// Generate the cell to completion.
    fn force_generate(&self, coord: CellCoord) -> Result<(), BackendError>;

    /// Whether interactive users are currently present in the region.
    fn has_live_users(&self) -> bool;
}

/// Region registry and server-wide performance signals.
pub trait WorldBackend: Send + Sync {
    /// Metadata for a registered region, `None` if it does not exist.
    fn region_metadata(&self, id: &RegionId) -> Option<RegionMetadata>;

    /// Live handle for a region, `None` if it does not exist (any more).
    fn open_region(&self, id: &RegionId) -> Option<Arc<dyn RegionBackend>>;

    /// Average duration of recent host ticks.
    fn tick_latency(&self) -> Duration;

    /// Memory in use as a percentage of the maximum.
    fn memory_usage_percent(&self) -> u8;

    /// Optional signals this backend supports.
    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities::default()
    }

    fn region_exists(&self, id: &RegionId) -> bool {
        self.region_metadata(id).is_some()
    }

    fn center_and_seed(&self, id: &RegionId) -> Option<(CellCoord, i64)> {
        self.region_metadata(id).map(|m| (m.center, m.seed))
    }
}
