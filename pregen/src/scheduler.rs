//! Scheduler owning every active generation task.
//!
//! The [`Scheduler`] is driven from the host's tick loop. Each call to
//! [`Scheduler::tick`] is cheap: real work only happens once every
//! `tick_interval` host ticks, and then each active task processes one
//! bounded batch.
//!
//! All methods take `&mut self` and are expected to run on the host's tick
//! thread. Monitoring code on other threads reads progress through the
//! shared handles returned by [`Scheduler::progress`].
//!
//! # Persistence
//!
//! Progress is written to a [`ProgressStore`] after every operation that
//! changes the task set, when a task finishes, and every `save_interval` work
//! cycles. Saves are upserts: records of regions that are not currently
//! active (completed runs, paused runs awaiting cleanup) are preserved.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use pregen::backend::{RegionMetadata, SimulatedWorld};
//! use pregen::coord::{CellCoord, RegionId};
//! use pregen::scheduler::{Scheduler, SchedulerConfig};
//! use pregen::store::MemoryStore;
//!
//! let world = SimulatedWorld::new();
//! let overworld = RegionId::new("overworld");
//! world.add_region(overworld.clone(), RegionMetadata {
//!     center: CellCoord::new(0, 0),
//!     seed: 42,
//!     generation_enabled: true,
//!     bound_radius: Some(2),
//! });
//!
//! let mut scheduler = Scheduler::new(SchedulerConfig::default(), Arc::new(MemoryStore::new()));
//! scheduler.start(&world, &overworld, None).unwrap();
//! while scheduler.is_active(&overworld) {
//!     scheduler.tick(&world);
//! }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::backend::WorldBackend;
use crate::clock::{Clock, SystemClock};
use crate::config;
use crate::coord::RegionId;
use crate::error::PregenError;
use crate::progress::{GenerationProgress, GenerationStatus, ProgressRecord};
use crate::spiral::SpiralIterator;
use crate::store::{ProgressStore, RecordMap, StoreError};
use crate::task::{GenerationTask, TaskSettings};
use crate::throttle::{PerformanceSample, ThrottleReason};

/// Scheduler tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    pub task: TaskSettings,
    /// Host ticks between work cycles.
    pub tick_interval: u64,
    /// Work cycles between periodic saves.
    pub save_interval: u64,
    /// Radius used when neither the caller nor the region specifies one.
    pub default_radius: i32,
    /// Saved runs idle longer than this are not resumed.
    pub stale_after: Duration,
    /// Saved records idle longer than this are pruned by cleanup.
    pub cleanup_after: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            task: TaskSettings::default(),
            tick_interval: config::DEFAULT_TICK_INTERVAL,
            save_interval: config::DEFAULT_SAVE_INTERVAL,
            default_radius: config::DEFAULT_RADIUS,
            stale_after: Duration::from_secs(config::DEFAULT_STALE_AFTER_HOURS * 3600),
            cleanup_after: Duration::from_secs(config::DEFAULT_CLEANUP_AFTER_HOURS * 3600),
        }
    }
}

/// What a single [`Scheduler::tick`] did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickOutcome {
    /// Whether this tick was a work cycle.
    pub ran: bool,
    /// Tasks that processed a batch.
    pub batches: usize,
    pub visited: u64,
    pub generated: u64,
    /// Regions whose run finished and were removed.
    pub completed: Vec<RegionId>,
    /// Regions that disappeared from the backend and were removed.
    pub vanished: Vec<RegionId>,
    pub saved: bool,
}

/// Counts from [`Scheduler::resume_saved_tasks`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResumeSummary {
    pub resumed: usize,
    pub missing_region: usize,
    pub not_running: usize,
    pub stale: usize,
    pub invalid: usize,
}

/// Human-readable snapshot of one task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskStatus {
    pub region: RegionId,
    pub status: GenerationStatus,
    pub radius: i32,
    pub visited: u64,
    pub total_cells: u64,
    pub generated: u64,
    pub skipped: u64,
    pub percent: f64,
    /// Newly generated cells per minute.
    pub rate: f64,
    pub eta_minutes: Option<f64>,
    pub throttle: Option<ThrottleReason>,
    pub pinned: usize,
    pub last_error: Option<String>,
}

impl TaskStatus {
    fn capture(task: &GenerationTask, now_millis: u64) -> Self {
        let progress = task.progress();
        let snapshot = progress.snapshot(now_millis);
        Self {
            region: snapshot.region,
            status: snapshot.status,
            radius: progress.radius(),
            visited: snapshot.visited,
            total_cells: snapshot.total_cells,
            generated: snapshot.generated,
            skipped: snapshot.skipped,
            percent: snapshot.percent,
            rate: snapshot.generation_rate,
            eta_minutes: snapshot.eta_minutes,
            throttle: task.throttle_reason().cloned(),
            pinned: task.pending_pin_count(),
            last_error: snapshot.last_error,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} {:.1}% ({}/{} cells, {} generated, {:.1}/min, ETA {}",
            self.region,
            self.status,
            self.percent,
            self.visited,
            self.total_cells,
            self.generated,
            self.rate,
            format_eta(self.eta_minutes)
        )?;
        if self.skipped > 0 {
            write!(f, ", {} skipped", self.skipped)?;
        }
        write!(f, ")")?;
        if let Some(reason) = &self.throttle {
            write!(f, " [throttled: {}]", reason)?;
        }
        if self.pinned > 0 {
            write!(f, " [pins: {}]", self.pinned)?;
        }
        Ok(())
    }
}

/// Formats an ETA in minutes as `12.5m` or `3h07m`.
pub fn format_eta(minutes: Option<f64>) -> String {
    match minutes {
        None => "unknown".to_string(),
        Some(m) if m < 60.0 => format!("{:.1}m", m),
        Some(m) => format!("{}h{:02}m", (m / 60.0).floor() as u64, (m % 60.0).floor() as u64),
    }
}

/// Owns and drives all active generation tasks.
pub struct Scheduler {
    config: SchedulerConfig,
    store: Arc<dyn ProgressStore>,
    clock: Arc<dyn Clock>,
    tasks: HashMap<RegionId, GenerationTask>,
    ticks_since_work: u64,
    cycles_since_save: u64,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .field("tasks", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, store: Arc<dyn ProgressStore>) -> Self {
        Self {
            config,
            store,
            clock: Arc::new(SystemClock),
            tasks: HashMap::new(),
            ticks_since_work: 0,
            cycles_since_save: 0,
        }
    }

    /// Replaces the wall-clock source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn active_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_active(&self, region: &RegionId) -> bool {
        self.tasks.contains_key(region)
    }

    /// Shared progress handle for monitoring from other threads.
    pub fn progress(&self, region: &RegionId) -> Option<Arc<GenerationProgress>> {
        self.tasks.get(region).map(|t| Arc::clone(t.progress()))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Task lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Starts generating `region` outward from its center.
    ///
    /// Without an explicit radius the region's own bound is used, falling
    /// back to the configured default.
    pub fn start(
        &mut self,
        world: &dyn WorldBackend,
        region: &RegionId,
        radius: Option<i32>,
    ) -> Result<TaskStatus, PregenError> {
        let metadata = world
            .region_metadata(region)
            .ok_or_else(|| PregenError::UnknownRegion(region.clone()))?;
        if !metadata.generation_enabled {
            return Err(PregenError::GenerationDisabled(region.clone()));
        }
        if self.tasks.contains_key(region) {
            return Err(PregenError::AlreadyActive(region.clone()));
        }

        let radius = radius
            .or(metadata.bound_radius)
            .unwrap_or(self.config.default_radius);
        let spiral = SpiralIterator::new(metadata.center, radius)?;
        let now = self.clock.now_millis();
        let progress = GenerationProgress::new(region.clone(), metadata.seed, spiral, now);

        info!(
            region = %region,
            center = %metadata.center,
            radius,
            total_cells = progress.total_cells(),
            rate = %self.config.task.rate,
            "Starting generation"
        );

        let task = GenerationTask::new(progress);
        let status = TaskStatus::capture(&task, now);
        self.tasks.insert(region.clone(), task);
        self.save_logged();
        Ok(status)
    }

    /// Stops and removes a task, persisting its final state.
    pub fn stop(
        &mut self,
        world: &dyn WorldBackend,
        region: &RegionId,
    ) -> Result<TaskStatus, PregenError> {
        let mut task = self
            .tasks
            .remove(region)
            .ok_or_else(|| PregenError::NotActive(region.clone()))?;

        let handle = world.open_region(region);
        task.stop(handle.as_deref());

        let status = TaskStatus::capture(&task, self.clock.now_millis());
        if let Err(e) = self.write_records(vec![task.progress().to_record()]) {
            error!(region = %region, error = %e, "Failed to save stopped task");
        }
        Ok(status)
    }

    /// Returns `false` if the task was not running.
    pub fn pause(&mut self, region: &RegionId) -> Result<bool, PregenError> {
        let task = self
            .tasks
            .get(region)
            .ok_or_else(|| PregenError::NotActive(region.clone()))?;
        let changed = task.pause();
        if changed {
            self.save_logged();
        }
        Ok(changed)
    }

    /// Returns `false` if the task was neither paused nor failed.
    pub fn resume(&mut self, region: &RegionId) -> Result<bool, PregenError> {
        let task = self
            .tasks
            .get(region)
            .ok_or_else(|| PregenError::NotActive(region.clone()))?;
        let changed = task.resume();
        if changed {
            self.save_logged();
        }
        Ok(changed)
    }

    pub fn status(&self, region: &RegionId) -> Option<TaskStatus> {
        let now = self.clock.now_millis();
        self.tasks.get(region).map(|t| TaskStatus::capture(t, now))
    }

    /// Status of every active task, ordered by region.
    pub fn status_all(&self) -> Vec<TaskStatus> {
        let now = self.clock.now_millis();
        let mut all: Vec<TaskStatus> = self
            .tasks
            .values()
            .map(|t| TaskStatus::capture(t, now))
            .collect();
        all.sort_by(|a, b| a.region.cmp(&b.region));
        all
    }

    // ─────────────────────────────────────────────────────────────────────
    // Tick
    // ─────────────────────────────────────────────────────────────────────

    /// Called once per host tick.
    pub fn tick(&mut self, world: &dyn WorldBackend) -> TickOutcome {
        let mut outcome = TickOutcome::default();

        self.ticks_since_work += 1;
        if self.ticks_since_work < self.config.tick_interval.max(1) {
            return outcome;
        }
        self.ticks_since_work = 0;
        outcome.ran = true;

        if self.tasks.is_empty() {
            return outcome;
        }

        let sample = PerformanceSample::capture(world);
        let mut regions: Vec<RegionId> = self.tasks.keys().cloned().collect();
        regions.sort();

        let mut finished = Vec::new();
        for id in regions {
            let Some(handle) = world.open_region(&id) else {
                warn!(region = %id, "Target region no longer exists, dropping generation task");
                if let Some(mut task) = self.tasks.remove(&id) {
                    task.stop(None);
                }
                outcome.vanished.push(id);
                continue;
            };
            let Some(task) = self.tasks.get_mut(&id) else {
                continue;
            };

            let report =
                task.process_batch(handle.as_ref(), &sample, &self.config.task, self.clock.as_ref());
            outcome.batches += 1;
            outcome.visited += report.visited;
            outcome.generated += report.generated;

            if report.completed {
                task.release_all_pins(handle.as_ref());
                finished.push(id);
            }
        }

        let mut finished_records = Vec::with_capacity(finished.len());
        for id in finished {
            if let Some(task) = self.tasks.remove(&id) {
                finished_records.push(task.progress().to_record());
            }
            outcome.completed.push(id);
        }

        self.cycles_since_save += 1;
        let due = self.cycles_since_save >= self.config.save_interval.max(1);
        if due || !finished_records.is_empty() || !outcome.vanished.is_empty() {
            self.cycles_since_save = 0;
            match self.write_records(finished_records) {
                Ok(_) => outcome.saved = true,
                Err(e) => error!(error = %e, "Failed to save generation progress"),
            }
        }

        outcome
    }

    // ─────────────────────────────────────────────────────────────────────
    // Persistence
    // ─────────────────────────────────────────────────────────────────────

    /// Reconstructs tasks from persisted records.
    ///
    /// Records for missing or ineligible regions, non-running records, stale
    /// runs and undecodable records are left in the store untouched.
    pub fn resume_saved_tasks(
        &mut self,
        world: &dyn WorldBackend,
    ) -> Result<ResumeSummary, PregenError> {
        let records = self.store.load()?;
        let now = self.clock.now_millis();
        let mut summary = ResumeSummary::default();

        for (id, record) in records {
            if self.tasks.contains_key(&id) {
                continue;
            }

            let eligible = world
                .region_metadata(&id)
                .map(|m| m.generation_enabled)
                .unwrap_or(false);
            if !eligible {
                warn!(region = %id, "Saved generation task targets a missing region, not resuming");
                summary.missing_region += 1;
                continue;
            }

            if record.status != GenerationStatus::Running {
                debug!(region = %id, status = %record.status, "Saved task is not running, not resuming");
                summary.not_running += 1;
                continue;
            }

            let progress = match GenerationProgress::from_record(&record) {
                Ok(progress) => progress,
                Err(e) => {
                    warn!(region = %id, error = %e, "Skipping invalid saved task");
                    summary.invalid += 1;
                    continue;
                }
            };

            if progress.is_stale(self.config.stale_after, now) {
                warn!(
                    region = %id,
                    last_activity = %record.last_activity,
                    "Saved task is stale, not resuming"
                );
                summary.stale += 1;
                continue;
            }

            info!(
                region = %id,
                visited = progress.visited(),
                total = progress.total_cells(),
                "Resuming saved generation task"
            );
            self.tasks.insert(id, GenerationTask::new(progress));
            summary.resumed += 1;
        }

        Ok(summary)
    }

    /// Writes every active task's progress to the store. Returns the number of
    /// records written.
    pub fn save_progress(&self) -> Result<usize, PregenError> {
        Ok(self.write_records(Vec::new())?)
    }

    /// Removes completed and long-idle records of inactive regions from the
    /// store. Returns the number of records removed.
    ///
    /// Records of regions with an active task are always kept, however long
    /// they have been idle.
    pub fn cleanup_saved_tasks(&self) -> Result<usize, PregenError> {
        let mut records = self.store.load()?;
        let now = self.clock.now_millis();
        let cutoff = self.config.cleanup_after.as_millis();
        let before = records.len();

        records.retain(|id, record| {
            if self.tasks.contains_key(id) {
                return true;
            }
            let idle = now.saturating_sub(record.last_activity_millis()) as u128;
            let prune = record.status == GenerationStatus::Completed || idle > cutoff;
            if prune {
                debug!(region = %id, status = %record.status, "Pruning saved generation record");
            }
            !prune
        });

        let removed = before - records.len();
        if removed > 0 {
            self.store.save(&records)?;
            info!(removed, remaining = records.len(), "Cleaned up saved generation records");
        }
        Ok(removed)
    }

    /// Releases every pin and saves progress. Tasks stay registered.
    pub fn shutdown(&mut self, world: &dyn WorldBackend) -> Result<usize, PregenError> {
        for (id, task) in self.tasks.iter_mut() {
            match world.open_region(id) {
                Some(handle) => {
                    let released = task.release_all_pins(handle.as_ref());
                    debug!(region = %id, released, "Released pins for shutdown");
                }
                None => warn!(region = %id, "Region gone at shutdown, pins not released"),
            }
        }
        let saved = self.save_progress()?;
        info!(tasks = saved, "Generation scheduler shut down");
        Ok(saved)
    }

    /// Upserts active records plus `extra` into the store.
    fn write_records(
        &self,
        extra: Vec<ProgressRecord>,
    ) -> Result<usize, StoreError> {
        let mut stored: RecordMap = match self.store.load() {
            Ok(records) => records,
            Err(e @ StoreError::Parse { .. }) => match self.store.set_aside()? {
                Some(_) => {
                    warn!(error = %e, "Starting a fresh progress document");
                    RecordMap::new()
                }
                None => return Err(e),
            },
            Err(e) => return Err(e),
        };

        let mut written = 0;
        let records = self
            .tasks
            .values()
            .map(|t| t.progress().to_record())
            .chain(extra);
        for record in records {
            stored.insert(RegionId::new(record.region.clone()), record);
            written += 1;
        }

        self.store.save(&stored)?;
        Ok(written)
    }

    fn save_logged(&self) {
        if let Err(e) = self.write_records(Vec::new()) {
            error!(error = %e, "Failed to save generation progress");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{RegionMetadata, SimulatedWorld};
    use crate::clock::ManualClock;
    use crate::coord::CellCoord;
    use crate::store::MemoryStore;
    use crate::throttle::GenerationRate;

    const START: u64 = 1_700_000_000_000;

    fn world_with(regions: &[(&str, Option<i32>, bool)]) -> SimulatedWorld {
        let world = SimulatedWorld::new();
        for (name, bound, enabled) in regions {
            world.add_region(
                RegionId::new(*name),
                RegionMetadata {
                    center: CellCoord::new(0, 0),
                    seed: 5,
                    generation_enabled: *enabled,
                    bound_radius: *bound,
                },
            );
        }
        world
    }

    fn scheduler(store: Arc<MemoryStore>, clock: Arc<ManualClock>) -> Scheduler {
        let config = SchedulerConfig {
            task: TaskSettings {
                rate: GenerationRate::PerInvocation(5),
                max_batch_time: Duration::from_secs(5),
                ..TaskSettings::default()
            },
            ..SchedulerConfig::default()
        };
        Scheduler::new(config, store).with_clock(clock)
    }

    fn setup() -> (Scheduler, Arc<MemoryStore>, Arc<ManualClock>) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(START));
        (
            scheduler(Arc::clone(&store), Arc::clone(&clock)),
            store,
            clock,
        )
    }

    fn id(name: &str) -> RegionId {
        RegionId::new(name)
    }

    #[test]
    fn test_start_uses_region_bound_radius() {
        let world = world_with(&[("overworld", Some(2), true)]);
        let (mut s, store, _) = setup();

        let status = s.start(&world, &id("overworld"), None).unwrap();
        assert_eq!(status.total_cells, 25);
        assert_eq!(status.radius, 2);
        assert!(s.is_active(&id("overworld")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_start_falls_back_to_default_radius() {
        let world = world_with(&[("overworld", None, true)]);
        let (mut s, _, _) = setup();
        let status = s.start(&world, &id("overworld"), None).unwrap();
        assert_eq!(status.radius, 256);

        let world = world_with(&[("nether", Some(100), true)]);
        let status = s.start(&world, &id("nether"), Some(3)).unwrap();
        assert_eq!(status.radius, 3);
    }

    #[test]
    fn test_start_rejections() {
        let world = world_with(&[("overworld", Some(2), true), ("lobby", None, false)]);
        let (mut s, _, _) = setup();

        assert!(matches!(
            s.start(&world, &id("missing"), None),
            Err(PregenError::UnknownRegion(_))
        ));
        assert!(matches!(
            s.start(&world, &id("lobby"), None),
            Err(PregenError::GenerationDisabled(_))
        ));
        assert!(matches!(
            s.start(&world, &id("overworld"), Some(-4)),
            Err(PregenError::Spiral(_))
        ));
        s.start(&world, &id("overworld"), None).unwrap();
        assert!(matches!(
            s.start(&world, &id("overworld"), None),
            Err(PregenError::AlreadyActive(_))
        ));
    }

    #[test]
    fn test_tick_interval_gates_work() {
        let world = world_with(&[("overworld", Some(4), true)]);
        let (mut s, _, _) = setup();
        s.config.tick_interval = 3;
        s.start(&world, &id("overworld"), None).unwrap();

        assert!(!s.tick(&world).ran);
        assert!(!s.tick(&world).ran);
        let outcome = s.tick(&world);
        assert!(outcome.ran);
        assert_eq!(outcome.visited, 5);
    }

    #[test]
    fn test_completed_task_is_removed_and_persisted() {
        let world = world_with(&[("overworld", Some(1), true)]);
        let (mut s, store, _) = setup();
        s.start(&world, &id("overworld"), None).unwrap();

        s.tick(&world);
        let outcome = s.tick(&world);

        assert_eq!(outcome.completed, vec![id("overworld")]);
        assert!(!s.is_active(&id("overworld")));
        let record = store.get(&id("overworld")).unwrap();
        assert_eq!(record.status, GenerationStatus::Completed);
        assert_eq!(record.visited, 9);
        assert_eq!(world.region(&id("overworld")).unwrap().pinned_count(), 0);
    }

    #[test]
    fn test_vanished_region_is_dropped() {
        let world = world_with(&[("overworld", Some(3), true), ("nether", Some(3), true)]);
        let (mut s, _, _) = setup();
        s.start(&world, &id("overworld"), None).unwrap();
        s.start(&world, &id("nether"), None).unwrap();

        world.remove_region(&id("nether"));
        let outcome = s.tick(&world);

        assert_eq!(outcome.vanished, vec![id("nether")]);
        assert_eq!(outcome.batches, 1);
        assert!(s.is_active(&id("overworld")));
        assert!(!s.is_active(&id("nether")));
    }

    #[test]
    fn test_stop_persists_completed_record() {
        let world = world_with(&[("overworld", Some(5), true)]);
        let (mut s, store, _) = setup();
        s.start(&world, &id("overworld"), None).unwrap();
        s.tick(&world);

        let status = s.stop(&world, &id("overworld")).unwrap();
        assert_eq!(status.status, GenerationStatus::Completed);
        assert_eq!(status.pinned, 0);
        assert_eq!(
            store.get(&id("overworld")).unwrap().status,
            GenerationStatus::Completed
        );
        assert!(matches!(
            s.stop(&world, &id("overworld")),
            Err(PregenError::NotActive(_))
        ));
    }

    #[test]
    fn test_pause_resume_persist_status() {
        let world = world_with(&[("overworld", Some(5), true)]);
        let (mut s, store, _) = setup();
        s.start(&world, &id("overworld"), None).unwrap();

        assert!(s.pause(&id("overworld")).unwrap());
        assert_eq!(
            store.get(&id("overworld")).unwrap().status,
            GenerationStatus::Paused
        );
        assert_eq!(s.tick(&world).visited, 0);

        assert!(s.resume(&id("overworld")).unwrap());
        assert_eq!(s.tick(&world).visited, 5);
        assert!(matches!(
            s.pause(&id("nether")),
            Err(PregenError::NotActive(_))
        ));
    }

    #[test]
    fn test_status_display() {
        let world = world_with(&[("overworld", Some(2), true)]);
        let (mut s, _, clock) = setup();
        s.start(&world, &id("overworld"), None).unwrap();
        clock.advance(Duration::from_secs(60));
        s.tick(&world);

        let status = s.status(&id("overworld")).unwrap();
        assert_eq!(
            status.to_string(),
            "overworld: RUNNING 20.0% (5/25 cells, 5 generated, 5.0/min, ETA 4.0m) [pins: 5]"
        );
        assert_eq!(s.status_all().len(), 1);
        assert!(s.status(&id("nether")).is_none());
    }

    #[test]
    fn test_format_eta() {
        assert_eq!(format_eta(None), "unknown");
        assert_eq!(format_eta(Some(12.34)), "12.3m");
        assert_eq!(format_eta(Some(135.0)), "2h15m");
    }

    #[test]
    fn test_save_progress_preserves_inactive_records() {
        let world = world_with(&[("overworld", Some(5), true)]);
        let (mut s, store, _) = setup();

        let spiral = SpiralIterator::new(CellCoord::new(0, 0), 1).unwrap();
        let old = GenerationProgress::new(id("archive"), 1, spiral, START);
        old.set_status(GenerationStatus::Completed);
        store.insert(old.to_record());

        s.start(&world, &id("overworld"), None).unwrap();
        assert_eq!(s.save_progress().unwrap(), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_cleanup_keeps_idle_active_task() {
        let world = world_with(&[("overworld", Some(5), true)]);
        let (mut s, store, clock) = setup();
        s.start(&world, &id("overworld"), None).unwrap();
        s.pause(&id("overworld")).unwrap();

        let spiral = SpiralIterator::new(CellCoord::new(0, 0), 1).unwrap();
        let idle = GenerationProgress::new(id("archive"), 1, spiral, START);
        idle.set_status(GenerationStatus::Paused);
        store.insert(idle.to_record());

        clock.advance(Duration::from_secs(200 * 3600));
        assert_eq!(s.cleanup_saved_tasks().unwrap(), 1);
        assert!(store.get(&id("archive")).is_none());
        assert!(store.get(&id("overworld")).is_some());
    }

    #[test]
    fn test_periodic_save() {
        let world = world_with(&[("overworld", Some(10), true)]);
        let (mut s, store, _) = setup();
        s.config.save_interval = 2;
        s.start(&world, &id("overworld"), None).unwrap();

        assert!(!s.tick(&world).saved);
        assert!(s.tick(&world).saved);
        assert_eq!(store.get(&id("overworld")).unwrap().visited, 10);
    }

    #[test]
    fn test_progress_handle_is_shared() {
        let world = world_with(&[("overworld", Some(3), true)]);
        let (mut s, _, _) = setup();
        s.start(&world, &id("overworld"), None).unwrap();
        let handle = s.progress(&id("overworld")).unwrap();

        s.tick(&world);
        assert_eq!(handle.visited(), 5);
    }
}
