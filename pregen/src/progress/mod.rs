//! Shared progress state for one region's generation run.
//!
//! [`GenerationProgress`] is written by exactly one task on the tick thread
//! and read concurrently by monitoring code (status commands, dashboards).
//! Counters and status are atomics and the retry map is a [`DashMap`], so
//! readers never block the writer and never observe a torn update.
//!
//! The spiral walk sits behind a mutex: only the owning task advances it,
//! and save points take brief snapshots.

mod record;

pub use record::{ProgressRecord, RecordError};

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::coord::{CellCoord, RegionId};
use crate::spiral::{SpiralIterator, SpiralState};

const MILLIS_PER_MINUTE: f64 = 60_000.0;

/// Lifecycle state of a generation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationStatus {
    Running,
    Paused,
    Completed,
    Error,
}

impl GenerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Paused => "PAUSED",
            Self::Completed => "COMPLETED",
            Self::Error => "ERROR",
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            Self::Running => 0,
            Self::Paused => 1,
            Self::Completed => 2,
            Self::Error => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::Paused,
            2 => Self::Completed,
            _ => Self::Error,
        }
    }
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenerationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RUNNING" => Ok(Self::Running),
            "PAUSED" => Ok(Self::Paused),
            "COMPLETED" => Ok(Self::Completed),
            "ERROR" => Ok(Self::Error),
            other => Err(format!("unknown generation status '{}'", other)),
        }
    }
}

/// Progress of one region's generation run.
#[derive(Debug)]
pub struct GenerationProgress {
    region: RegionId,
    seed: i64,
    status: AtomicU8,
    /// Cells the walk has passed over, including ones generated before the run.
    visited: AtomicU64,
    /// Cells this run actually generated.
    generated: AtomicU64,
    /// Cells given up on after exhausting their retries.
    skipped: AtomicU64,
    /// Invocations since the last cell in fractional-rate mode.
    fractional_counter: AtomicU32,
    retries: DashMap<CellCoord, u32>,
    started_at: u64,
    last_activity: AtomicU64,
    last_error: RwLock<Option<String>>,
    spiral: Mutex<SpiralIterator>,
    total_cells: u64,
}

impl GenerationProgress {
    /// Starts tracking a fresh run.
    pub fn new(region: RegionId, seed: i64, spiral: SpiralIterator, now_millis: u64) -> Self {
        let total_cells = spiral.total_cells();
        Self {
            region,
            seed,
            status: AtomicU8::new(GenerationStatus::Running.to_u8()),
            visited: AtomicU64::new(0),
            generated: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            fractional_counter: AtomicU32::new(0),
            retries: DashMap::new(),
            started_at: now_millis,
            last_activity: AtomicU64::new(now_millis),
            last_error: RwLock::new(None),
            spiral: Mutex::new(spiral),
            total_cells,
        }
    }

    pub fn region(&self) -> &RegionId {
        &self.region
    }

    pub fn seed(&self) -> i64 {
        self.seed
    }

    // ─────────────────────────────────────────────────────────────────────
    // Status
    // ─────────────────────────────────────────────────────────────────────

    pub fn status(&self) -> GenerationStatus {
        GenerationStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Sets the status, returning the previous one.
    pub fn set_status(&self, status: GenerationStatus) -> GenerationStatus {
        GenerationStatus::from_u8(self.status.swap(status.to_u8(), Ordering::AcqRel))
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    pub fn set_last_error(&self, message: impl Into<String>) {
        *self.last_error.write() = Some(message.into());
    }

    // ─────────────────────────────────────────────────────────────────────
    // Counters
    // ─────────────────────────────────────────────────────────────────────

    pub fn visited(&self) -> u64 {
        self.visited.load(Ordering::Acquire)
    }

    pub fn generated(&self) -> u64 {
        self.generated.load(Ordering::Acquire)
    }

    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Acquire)
    }

    /// Returns the new visited count.
    pub fn increment_visited(&self) -> u64 {
        self.visited.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Returns the new generated count.
    pub fn increment_generated(&self) -> u64 {
        self.generated.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn increment_skipped(&self) -> u64 {
        self.skipped.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn fractional_counter(&self) -> u32 {
        self.fractional_counter.load(Ordering::Acquire)
    }

    /// Counts one invocation in fractional-rate mode.
    ///
    /// Returns `true` (and resets the counter) once `every` invocations have
    /// accumulated.
    pub fn tick_fractional(&self, every: u32) -> bool {
        let count = self.fractional_counter.fetch_add(1, Ordering::AcqRel) + 1;
        if count >= every {
            self.fractional_counter.store(0, Ordering::Release);
            true
        } else {
            false
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Retries
    // ─────────────────────────────────────────────────────────────────────

    pub fn retry_count(&self, coord: CellCoord) -> u32 {
        self.retries.get(&coord).map(|r| *r).unwrap_or(0)
    }

    /// Increments the retry count for a cell, inserting it if absent.
    /// Returns the new count.
    pub fn record_retry(&self, coord: CellCoord) -> u32 {
        let mut entry = self.retries.entry(coord).or_insert(0);
        *entry += 1;
        *entry
    }

    pub fn clear_retry(&self, coord: CellCoord) {
        self.retries.remove(&coord);
    }

    /// Cells with pending retries.
    pub fn pending_retries(&self) -> BTreeMap<CellCoord, u32> {
        self.retries
            .iter()
            .filter(|e| *e.value() > 0)
            .map(|e| (*e.key(), *e.value()))
            .collect()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Traversal
    // ─────────────────────────────────────────────────────────────────────

    /// The next cell to process, without advancing.
    pub fn next_cell(&self) -> Option<CellCoord> {
        self.spiral.lock().peek()
    }

    /// Moves the walk past the current cell.
    pub fn advance(&self) {
        self.spiral.lock().advance();
    }

    pub fn spiral_state(&self) -> SpiralState {
        self.spiral.lock().state()
    }

    pub fn center(&self) -> CellCoord {
        self.spiral.lock().center()
    }

    pub fn radius(&self) -> i32 {
        self.spiral.lock().max_radius()
    }

    pub fn total_cells(&self) -> u64 {
        self.total_cells
    }

    /// Whether the walk has cells left.
    pub fn has_remaining(&self) -> bool {
        self.spiral.lock().has_next()
    }

    /// Completed explicitly or the walk is exhausted.
    pub fn is_complete(&self) -> bool {
        self.status() == GenerationStatus::Completed || !self.has_remaining()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Timing and derived metrics
    // ─────────────────────────────────────────────────────────────────────

    pub fn started_at_millis(&self) -> u64 {
        self.started_at
    }

    pub fn last_activity_millis(&self) -> u64 {
        self.last_activity.load(Ordering::Acquire)
    }

    /// Records activity at `now_millis`.
    pub fn touch(&self, now_millis: u64) {
        self.last_activity.fetch_max(now_millis, Ordering::AcqRel);
    }

    pub fn elapsed_minutes(&self, now_millis: u64) -> f64 {
        now_millis.saturating_sub(self.started_at) as f64 / MILLIS_PER_MINUTE
    }

    /// Newly generated cells per minute.
    pub fn generation_rate(&self, now_millis: u64) -> f64 {
        per_minute(self.generated(), self.elapsed_minutes(now_millis))
    }

    /// Visited cells per minute.
    pub fn visit_rate(&self, now_millis: u64) -> f64 {
        per_minute(self.visited(), self.elapsed_minutes(now_millis))
    }

    /// Percentage of the walk covered, capped at 100.
    pub fn progress_percent(&self) -> f64 {
        if self.total_cells == 0 {
            return 100.0;
        }
        let scaled = self.visited() as u128 * 100;
        (scaled as f64 / self.total_cells as f64).min(100.0)
    }

    /// Minutes until the walk finishes at the current visit rate, `None` when
    /// the rate is still zero.
    ///
    /// Uses the visit rate rather than the generation rate so cells that were
    /// already generated count towards traversal speed.
    pub fn estimated_minutes_remaining(&self, now_millis: u64) -> Option<f64> {
        let rate = self.visit_rate(now_millis);
        if rate <= 0.0 {
            return None;
        }
        let remaining = self.total_cells.saturating_sub(self.visited());
        Some(remaining as f64 / rate)
    }

    /// Whether the run has been idle longer than `max_idle`.
    pub fn is_stale(&self, max_idle: Duration, now_millis: u64) -> bool {
        let idle = now_millis.saturating_sub(self.last_activity_millis());
        idle as u128 > max_idle.as_millis()
    }

    /// Point-in-time copy of the progress for display.
    pub fn snapshot(&self, now_millis: u64) -> ProgressSnapshot {
        ProgressSnapshot {
            region: self.region.clone(),
            status: self.status(),
            visited: self.visited(),
            generated: self.generated(),
            skipped: self.skipped(),
            total_cells: self.total_cells,
            percent: self.progress_percent(),
            generation_rate: self.generation_rate(now_millis),
            visit_rate: self.visit_rate(now_millis),
            eta_minutes: self.estimated_minutes_remaining(now_millis),
            pending_retries: self.retries.len(),
            last_error: self.last_error(),
        }
    }
}

fn per_minute(count: u64, minutes: f64) -> f64 {
    if minutes <= 0.0 {
        0.0
    } else {
        count as f64 / minutes
    }
}

/// Plain copy of a run's progress.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub region: RegionId,
    pub status: GenerationStatus,
    pub visited: u64,
    pub generated: u64,
    pub skipped: u64,
    pub total_cells: u64,
    pub percent: f64,
    pub generation_rate: f64,
    pub visit_rate: f64,
    pub eta_minutes: Option<f64>,
    pub pending_retries: usize,
    pub last_error: Option<String>,
}
