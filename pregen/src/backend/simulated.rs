//! In-memory world backend.
//!
//! Keeps generated cells and pin counts in memory and lets callers inject
//! performance signals and per-cell failures. Used by the test-suite and by
//! the CLI's simulation mode.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use super::{
    BackendCapabilities, BackendError, CellStatus, RegionBackend, RegionMetadata, WorldBackend,
};
use crate::coord::{CellCoord, RegionId};

/// Injected failure behaviour for a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailurePlan {
    /// Fail this many more generation attempts, then succeed.
    Times(u32),
    /// Every attempt fails.
    Always,
    /// Every attempt fails with a region-wide fatal error.
    Fatal,
}

/// A simulated region.
#[derive(Debug)]
pub struct SimulatedRegion {
    metadata: RegionMetadata,
    generated: Mutex<HashSet<CellCoord>>,
    partial: Mutex<HashSet<CellCoord>>,
    pins: Mutex<HashMap<CellCoord, u32>>,
    failures: Mutex<HashMap<CellCoord, FailurePlan>>,
    live_users: AtomicBool,
    generation_cost: RwLock<Duration>,
    generate_calls: AtomicU64,
    pin_calls: AtomicU64,
    unpin_calls: AtomicU64,
}

impl SimulatedRegion {
    fn new(metadata: RegionMetadata) -> Self {
        Self {
            metadata,
            generated: Mutex::new(HashSet::new()),
            partial: Mutex::new(HashSet::new()),
            pins: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            live_users: AtomicBool::new(false),
            generation_cost: RwLock::new(Duration::ZERO),
            generate_calls: AtomicU64::new(0),
            pin_calls: AtomicU64::new(0),
            unpin_calls: AtomicU64::new(0),
        }
    }

    pub fn metadata(&self) -> &RegionMetadata {
        &self.metadata
    }

    /// Mark cells as generated before a run starts.
    pub fn mark_generated(&self, cells: impl IntoIterator<Item = CellCoord>) {
        self.generated.lock().extend(cells);
    }

    /// Mark cells as partially generated (they still need generation).
    pub fn mark_partial(&self, cells: impl IntoIterator<Item = CellCoord>) {
        self.partial.lock().extend(cells);
    }

    pub fn is_generated(&self, coord: CellCoord) -> bool {
        self.generated.lock().contains(&coord)
    }

    pub fn generated_count(&self) -> usize {
        self.generated.lock().len()
    }

    /// Make the next `times` generation attempts for `coord` fail.
    pub fn fail_cell(&self, coord: CellCoord, times: u32) {
        self.failures.lock().insert(coord, FailurePlan::Times(times));
    }

    /// Make every generation attempt for `coord` fail.
    pub fn fail_cell_always(&self, coord: CellCoord) {
        self.failures.lock().insert(coord, FailurePlan::Always);
    }

    /// Make generating `coord` report a region-wide fatal error.
    pub fn fail_cell_fatally(&self, coord: CellCoord) {
        self.failures.lock().insert(coord, FailurePlan::Fatal);
    }

    pub fn set_live_users(&self, present: bool) {
        self.live_users.store(present, Ordering::SeqCst);
    }

    /// Time each successful generation takes.
    pub fn set_generation_cost(&self, cost: Duration) {
        *self.generation_cost.write() = cost;
    }

    /// Number of cells currently holding at least one pin.
    pub fn pinned_count(&self) -> usize {
        self.pins.lock().len()
    }

    /// Outstanding pins on a single cell.
    pub fn pin_count(&self, coord: CellCoord) -> u32 {
        self.pins.lock().get(&coord).copied().unwrap_or(0)
    }

    pub fn generate_calls(&self) -> u64 {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn pin_calls(&self) -> u64 {
        self.pin_calls.load(Ordering::SeqCst)
    }

    pub fn unpin_calls(&self) -> u64 {
        self.unpin_calls.load(Ordering::SeqCst)
    }

    fn take_failure(&self, coord: CellCoord) -> Option<BackendError> {
        let mut failures = self.failures.lock();
        let plan = *failures.get(&coord)?;

        match plan {
            FailurePlan::Fatal => Some(BackendError::Fatal(format!(
                "storage for cell {} is unavailable",
                coord
            ))),
            FailurePlan::Always => Some(BackendError::Generation {
                coord,
                reason: "simulated persistent failure".to_string(),
            }),
            FailurePlan::Times(0) => {
                failures.remove(&coord);
                None
            }
            FailurePlan::Times(remaining) => {
                failures.insert(coord, FailurePlan::Times(remaining - 1));
                Some(BackendError::Generation {
                    coord,
                    reason: "simulated transient failure".to_string(),
                })
            }
        }
    }
}

impl RegionBackend for SimulatedRegion {
    fn pin_cell(&self, coord: CellCoord, _ttl_hint: Duration) {
        self.pin_calls.fetch_add(1, Ordering::SeqCst);
        *self.pins.lock().entry(coord).or_insert(0) += 1;
    }

    fn unpin_cell(&self, coord: CellCoord) {
        self.unpin_calls.fetch_add(1, Ordering::SeqCst);
        let mut pins = self.pins.lock();
        if let Some(count) = pins.get_mut(&coord) {
            *count -= 1;
            if *count == 0 {
                pins.remove(&coord);
            }
        }
    }

    fn persisted_cell_status(&self, coord: CellCoord) -> Result<CellStatus, BackendError> {
        if self.generated.lock().contains(&coord) {
            Ok(CellStatus::Generated)
        } else if self.partial.lock().contains(&coord) {
            Ok(CellStatus::Partial)
        } else {
            Ok(CellStatus::Missing)
        }
    }

    fn force_generate(&self, coord: CellCoord) -> Result<(), BackendError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = self.take_failure(coord) {
            return Err(error);
        }

        let cost = *self.generation_cost.read();
        if !cost.is_zero() {
            std::thread::sleep(cost);
        }

        self.partial.lock().remove(&coord);
        self.generated.lock().insert(coord);
        Ok(())
    }

    fn has_live_users(&self) -> bool {
        self.live_users.load(Ordering::SeqCst)
    }
}

/// In-memory region registry with adjustable performance signals.
///
/// # Example
///
/// ```
/// use pregen::backend::{RegionMetadata, SimulatedWorld, WorldBackend};
/// use pregen::coord::{CellCoord, RegionId};
///
/// let world = SimulatedWorld::new();
/// world.add_region(
///     RegionId::new("overworld"),
///     RegionMetadata {
///         center: CellCoord::new(0, 0),
///         seed: 42,
///         generation_enabled: true,
///         bound_radius: Some(64),
///     },
/// );
/// assert!(world.region_exists(&RegionId::new("overworld")));
/// ```
#[derive(Debug)]
pub struct SimulatedWorld {
    regions: RwLock<HashMap<RegionId, Arc<SimulatedRegion>>>,
    tick_latency_micros: AtomicU64,
    memory_percent: AtomicU8,
    capabilities: BackendCapabilities,
}

impl Default for SimulatedWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedWorld {
    /// Creates an empty world running at full speed with low memory usage.
    pub fn new() -> Self {
        Self {
            regions: RwLock::new(HashMap::new()),
            tick_latency_micros: AtomicU64::new(10_000),
            memory_percent: AtomicU8::new(30),
            capabilities: BackendCapabilities::all(),
        }
    }

    /// Restrict the optional signals this world reports.
    pub fn with_capabilities(mut self, capabilities: BackendCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Register a region and return its handle.
    pub fn add_region(&self, id: RegionId, metadata: RegionMetadata) -> Arc<SimulatedRegion> {
        let region = Arc::new(SimulatedRegion::new(metadata));
        self.regions.write().insert(id, Arc::clone(&region));
        region
    }

    /// Unregister a region, as if it had been deleted by the host.
    pub fn remove_region(&self, id: &RegionId) -> Option<Arc<SimulatedRegion>> {
        self.regions.write().remove(id)
    }

    /// Concrete handle to a simulated region.
    pub fn region(&self, id: &RegionId) -> Option<Arc<SimulatedRegion>> {
        self.regions.read().get(id).cloned()
    }

    pub fn set_tick_latency(&self, latency: Duration) {
        self.tick_latency_micros
            .store(latency.as_micros() as u64, Ordering::SeqCst);
    }

    pub fn set_memory_usage(&self, percent: u8) {
        self.memory_percent.store(percent.min(100), Ordering::SeqCst);
    }
}

impl WorldBackend for SimulatedWorld {
    fn region_metadata(&self, id: &RegionId) -> Option<RegionMetadata> {
        self.regions.read().get(id).map(|r| r.metadata.clone())
    }

    fn open_region(&self, id: &RegionId) -> Option<Arc<dyn RegionBackend>> {
        self.regions
            .read()
            .get(id)
            .map(|r| Arc::clone(r) as Arc<dyn RegionBackend>)
    }

    fn tick_latency(&self) -> Duration {
        Duration::from_micros(self.tick_latency_micros.load(Ordering::SeqCst))
    }

    fn memory_usage_percent(&self) -> u8 {
        self.memory_percent.load(Ordering::SeqCst)
    }

    fn capabilities(&self) -> BackendCapabilities {
        self.capabilities
    }
}
