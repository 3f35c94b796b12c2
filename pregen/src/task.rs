//! Per-region generation task.
//!
//! A [`GenerationTask`] is invoked once per scheduler tick and processes a
//! small, bounded batch of cells:
//!
//! 1. Release pins whose hold delay has expired. This always happens, even
//!    while paused or throttled, so pins can never accumulate.
//! 2. Bail out unless the run is `RUNNING` with cells left.
//! 3. Evaluate throttling (TPS, memory, live users).
//! 4. Size the batch from the configured rate and current TPS band.
//! 5. Walk cells until the batch count or the time budget is used up.
//!
//! # Failure handling
//!
//! A failing cell is retried on later invocations, with the walk held at that
//! cell. After [`MAX_RETRIES`] failures the cell is skipped and the run moves
//! on. A fatal backend error moves the run to `ERROR` and it stops advancing
//! until resumed.
//!
//! # State machine
//!
//! ```text
//! RUNNING <--pause/resume--> PAUSED
//! RUNNING --walk exhausted--> COMPLETED
//! RUNNING --fatal error-->   ERROR --resume--> RUNNING
//! any     --stop-->          COMPLETED
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::backend::{BackendError, RegionBackend};
use crate::clock::Clock;
use crate::config;
use crate::coord::{CellCoord, RegionId};
use crate::progress::{GenerationProgress, GenerationStatus};
use crate::throttle::{GenerationRate, PerformanceSample, ThrottleReason, ThrottleSettings};

/// Failures a single cell may accumulate before it is skipped.
pub const MAX_RETRIES: u32 = 3;

/// Tuning for batch processing.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSettings {
    pub rate: GenerationRate,
    /// Wall-clock budget for one invocation.
    pub max_batch_time: Duration,
    /// How long a processed cell stays pinned.
    pub pin_release_delay: Duration,
    /// Log progress every this many visited cells.
    pub progress_log_interval: u64,
    pub throttle: ThrottleSettings,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            rate: GenerationRate::default(),
            max_batch_time: Duration::from_millis(config::DEFAULT_MAX_BATCH_MILLIS),
            pin_release_delay: Duration::from_millis(config::DEFAULT_PIN_RELEASE_DELAY_MILLIS),
            progress_log_interval: config::DEFAULT_PROGRESS_LOG_INTERVAL,
            throttle: ThrottleSettings::default(),
        }
    }
}

/// What one invocation of [`GenerationTask::process_batch`] did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub pins_released: usize,
    pub visited: u64,
    pub generated: u64,
    pub skipped: u64,
    /// Cells that failed and will be retried.
    pub retried: u64,
    pub throttled: Option<ThrottleReason>,
    /// The run finished during this invocation.
    pub completed: bool,
    /// A fatal backend error moved the run to `ERROR`.
    pub failed: bool,
}

/// Executes generation for one region.
#[derive(Debug)]
pub struct GenerationTask {
    progress: Arc<GenerationProgress>,
    /// Pinned cells and the epoch-millis deadline at which to unpin them.
    pending_unpins: HashMap<CellCoord, u64>,
    last_throttle: Option<ThrottleReason>,
}

impl GenerationTask {
    pub fn new(progress: GenerationProgress) -> Self {
        Self {
            progress: Arc::new(progress),
            pending_unpins: HashMap::new(),
            last_throttle: None,
        }
    }

    pub fn progress(&self) -> &Arc<GenerationProgress> {
        &self.progress
    }

    pub fn region(&self) -> &RegionId {
        self.progress.region()
    }

    pub fn is_throttled(&self) -> bool {
        self.last_throttle.is_some()
    }

    pub fn throttle_reason(&self) -> Option<&ThrottleReason> {
        self.last_throttle.as_ref()
    }

    /// Cells currently pinned by this task.
    pub fn pending_pin_count(&self) -> usize {
        self.pending_unpins.len()
    }

    /// Runs one invocation against the region's live backend handle.
    pub fn process_batch(
        &mut self,
        region: &dyn RegionBackend,
        sample: &PerformanceSample,
        settings: &TaskSettings,
        clock: &dyn Clock,
    ) -> BatchReport {
        let mut report = BatchReport {
            pins_released: self.release_expired_pins(region, clock.now_millis()),
            ..BatchReport::default()
        };

        if self.progress.status() != GenerationStatus::Running {
            return report;
        }
        if !self.progress.has_remaining() {
            report.completed = self.finish_run();
            return report;
        }
        // throttled invocations count as activity
        self.progress.touch(clock.now_millis());

        if let Some(reason) = settings.throttle.evaluate(sample, region) {
            if self.last_throttle.as_ref() != Some(&reason) {
                debug!(region = %self.region(), reason = %reason, "Generation throttled");
            }
            report.throttled = Some(reason.clone());
            self.last_throttle = Some(reason);
            return report;
        }
        if self.last_throttle.take().is_some() {
            debug!(region = %self.region(), "Generation throttle lifted");
        }

        let batch = settings
            .rate
            .batch_size(&settings.throttle, sample.tps, &self.progress);
        let budget_start = Instant::now();
        let mut attempted = 0u32;

        while attempted < batch {
            if budget_start.elapsed() >= settings.max_batch_time {
                debug!(region = %self.region(), attempted, "Batch time budget exhausted");
                break;
            }
            let Some(coord) = self.progress.next_cell() else {
                break;
            };
            attempted += 1;

            self.pin(region, coord, settings.pin_release_delay);
            let outcome = Self::generate_cell(region, coord);
            self.schedule_unpin(coord, clock.now_millis(), settings.pin_release_delay);

            match outcome {
                Ok(newly_generated) => {
                    self.progress.clear_retry(coord);
                    self.progress.advance();
                    // visited first so readers never see generated > visited
                    report.visited += 1;
                    self.record_visit(settings.progress_log_interval);
                    if newly_generated {
                        self.progress.increment_generated();
                        report.generated += 1;
                    }
                }
                Err(e) if e.is_fatal() => {
                    error!(region = %self.region(), cell = %coord, error = %e, "Region backend failed, stopping generation");
                    self.progress.set_last_error(e.to_string());
                    self.progress.set_status(GenerationStatus::Error);
                    report.failed = true;
                    break;
                }
                Err(e) => {
                    let retries = self.progress.record_retry(coord);
                    if retries >= MAX_RETRIES {
                        warn!(region = %self.region(), cell = %coord, retries, error = %e, "Skipping cell after repeated failures");
                        self.progress.clear_retry(coord);
                        self.progress.set_last_error(e.to_string());
                        self.progress.increment_skipped();
                        self.progress.advance();
                        report.skipped += 1;
                        report.visited += 1;
                        self.record_visit(settings.progress_log_interval);
                    } else {
                        debug!(region = %self.region(), cell = %coord, retries, error = %e, "Cell failed, will retry");
                        report.retried += 1;
                        break;
                    }
                }
            }
        }

        if self.progress.status() == GenerationStatus::Running && !self.progress.has_remaining()
        {
            report.completed = self.finish_run();
        }

        report
    }

    /// Holds generation at the current cell. Returns `false` if the run was
    /// not running.
    pub fn pause(&self) -> bool {
        if self.progress.status() != GenerationStatus::Running {
            return false;
        }
        self.progress.set_status(GenerationStatus::Paused);
        info!(region = %self.region(), "Generation paused");
        true
    }

    /// Continues a paused run, or re-arms one stopped by a fatal error.
    pub fn resume(&self) -> bool {
        match self.progress.status() {
            GenerationStatus::Paused | GenerationStatus::Error => {
                self.progress.set_status(GenerationStatus::Running);
                info!(region = %self.region(), "Generation resumed");
                true
            }
            _ => false,
        }
    }

    /// Ends the run, releasing every pin immediately.
    ///
    /// When the region is gone its pins are dropped without unpinning.
    pub fn stop(&mut self, region: Option<&dyn RegionBackend>) {
        match region {
            Some(region) => {
                self.release_all_pins(region);
            }
            None => self.pending_unpins.clear(),
        }
        self.progress.set_status(GenerationStatus::Completed);
        info!(
            region = %self.region(),
            visited = self.progress.visited(),
            generated = self.progress.generated(),
            "Generation stopped"
        );
    }

    /// Unpins every outstanding cell without changing the run's status.
    pub fn release_all_pins(&mut self, region: &dyn RegionBackend) -> usize {
        let count = self.pending_unpins.len();
        for (coord, _) in self.pending_unpins.drain() {
            region.unpin_cell(coord);
        }
        count
    }

    fn release_expired_pins(&mut self, region: &dyn RegionBackend, now_millis: u64) -> usize {
        let expired: Vec<CellCoord> = self
            .pending_unpins
            .iter()
            .filter(|(_, &deadline)| deadline <= now_millis)
            .map(|(coord, _)| *coord)
            .collect();

        for coord in &expired {
            self.pending_unpins.remove(coord);
            region.unpin_cell(*coord);
        }
        expired.len()
    }

    /// Pins a cell unless this task already holds a pin on it.
    fn pin(&self, region: &dyn RegionBackend, coord: CellCoord, hold: Duration) {
        if !self.pending_unpins.contains_key(&coord) {
            region.pin_cell(coord, hold);
        }
    }

    fn schedule_unpin(&mut self, coord: CellCoord, now_millis: u64, delay: Duration) {
        let deadline = now_millis.saturating_add(delay.as_millis() as u64);
        self.pending_unpins.insert(coord, deadline);
    }

    /// Generates the cell if storage does not already hold it. Returns whether
    /// it was newly generated.
    fn generate_cell(region: &dyn RegionBackend, coord: CellCoord) -> Result<bool, BackendError> {
        if region.persisted_cell_status(coord)?.is_generated() {
            return Ok(false);
        }
        region.force_generate(coord)?;
        Ok(true)
    }

    fn record_visit(&self, log_interval: u64) {
        let visited = self.progress.increment_visited();
        if log_interval > 0 && visited % log_interval == 0 {
            info!(
                region = %self.region(),
                visited,
                total = self.progress.total_cells(),
                generated = self.progress.generated(),
                percent = self.progress.progress_percent(),
                "Generation progress"
            );
        }
    }

    fn finish_run(&self) -> bool {
        if self.progress.set_status(GenerationStatus::Completed) == GenerationStatus::Completed {
            return false;
        }
        info!(
            region = %self.region(),
            visited = self.progress.visited(),
            generated = self.progress.generated(),
            skipped = self.progress.skipped(),
            "Generation complete"
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{RegionMetadata, SimulatedRegion, SimulatedWorld};
    use crate::clock::ManualClock;
    use crate::spiral::SpiralIterator;

    const START: u64 = 1_700_000_000_000;

    struct Fixture {
        region: Arc<SimulatedRegion>,
        clock: ManualClock,
        task: GenerationTask,
        settings: TaskSettings,
    }

    impl Fixture {
        fn new(radius: i32, rate: u32) -> Self {
            let world = SimulatedWorld::new();
            let region = world.add_region(
                RegionId::new("overworld"),
                RegionMetadata {
                    center: CellCoord::new(0, 0),
                    seed: 7,
                    generation_enabled: true,
                    bound_radius: None,
                },
            );
            let spiral = SpiralIterator::new(CellCoord::new(0, 0), radius).unwrap();
            let progress =
                GenerationProgress::new(RegionId::new("overworld"), 7, spiral, START);
            Self {
                region,
                clock: ManualClock::new(START),
                task: GenerationTask::new(progress),
                settings: TaskSettings {
                    rate: GenerationRate::PerInvocation(rate),
                    max_batch_time: Duration::from_secs(5),
                    ..TaskSettings::default()
                },
            }
        }

        fn run(&mut self, sample: PerformanceSample) -> BatchReport {
            self.task
                .process_batch(self.region.as_ref(), &sample, &self.settings, &self.clock)
        }

        fn run_nominal(&mut self) -> BatchReport {
            self.run(PerformanceSample::nominal())
        }
    }

    fn starved() -> PerformanceSample {
        PerformanceSample {
            tps: 5.0,
            ..PerformanceSample::nominal()
        }
    }

    #[test]
    fn test_batch_generates_up_to_rate() {
        let mut f = Fixture::new(2, 5);
        let report = f.run_nominal();

        assert_eq!(report.visited, 5);
        assert_eq!(report.generated, 5);
        assert_eq!(f.region.generated_count(), 5);
        assert_eq!(f.task.progress().visited(), 5);
        assert_eq!(f.task.pending_pin_count(), 5);
    }

    #[test]
    fn test_already_generated_cells_are_visited_not_generated() {
        let mut f = Fixture::new(1, 9);
        f.region
            .mark_generated([CellCoord::new(0, 0), CellCoord::new(1, 0)]);
        f.region.mark_partial([CellCoord::new(1, 1)]);

        let report = f.run_nominal();
        assert_eq!(report.visited, 9);
        assert_eq!(report.generated, 7);
        assert_eq!(f.region.generate_calls(), 7);
    }

    #[test]
    fn test_run_completes_in_the_invocation_that_exhausts_the_walk() {
        let mut f = Fixture::new(1, 9);
        let report = f.run_nominal();
        assert!(report.completed);
        assert_eq!(f.task.progress().status(), GenerationStatus::Completed);

        let report = f.run_nominal();
        assert!(!report.completed);
        assert_eq!(report.visited, 0);
    }

    #[test]
    fn test_transient_failure_holds_position() {
        let mut f = Fixture::new(2, 5);
        f.region.fail_cell(CellCoord::new(0, 0), 1);

        let report = f.run_nominal();
        assert_eq!(report.retried, 1);
        assert_eq!(report.visited, 0);
        assert_eq!(f.task.progress().next_cell(), Some(CellCoord::new(0, 0)));
        assert_eq!(f.task.progress().retry_count(CellCoord::new(0, 0)), 1);

        let report = f.run_nominal();
        assert_eq!(report.visited, 5);
        assert_eq!(f.task.progress().retry_count(CellCoord::new(0, 0)), 0);
    }

    #[test]
    fn test_cell_is_skipped_after_max_retries() {
        let mut f = Fixture::new(1, 9);
        let bad = CellCoord::new(0, 0);
        f.region.fail_cell_always(bad);

        for _ in 0..MAX_RETRIES - 1 {
            let report = f.run_nominal();
            assert_eq!(report.retried, 1);
        }
        let report = f.run_nominal();

        assert_eq!(report.skipped, 1);
        assert_eq!(f.task.progress().skipped(), 1);
        assert_eq!(f.task.progress().retry_count(bad), 0);
        assert!(f.task.progress().last_error().is_some());
        assert!(!f.region.is_generated(bad));
        // The rest of the batch carried on past the skipped cell
        assert_eq!(report.visited, 9);
        assert_eq!(report.generated, 8);
        assert!(report.completed);
    }

    #[test]
    fn test_fatal_error_moves_to_error_status() {
        let mut f = Fixture::new(2, 5);
        f.region.fail_cell_fatally(CellCoord::new(1, 0));

        let report = f.run_nominal();
        assert!(report.failed);
        assert_eq!(report.visited, 1);
        assert_eq!(f.task.progress().status(), GenerationStatus::Error);

        let report = f.run_nominal();
        assert_eq!(report.visited, 0);

        assert!(f.task.resume());
        assert_eq!(f.task.progress().status(), GenerationStatus::Running);
    }

    #[test]
    fn test_pins_released_after_delay() {
        let mut f = Fixture::new(3, 4);
        f.run_nominal();
        assert_eq!(f.region.pinned_count(), 4);

        f.clock.advance(Duration::from_secs(4));
        let report = f.task.process_batch(
            f.region.as_ref(),
            &starved(),
            &f.settings,
            &f.clock,
        );
        assert_eq!(report.pins_released, 0);

        f.clock.advance(Duration::from_secs(1));
        let report = f.run(starved());
        assert_eq!(report.pins_released, 4);
        assert_eq!(f.region.pinned_count(), 0);
        assert_eq!(f.task.pending_pin_count(), 0);
    }

    #[test]
    fn test_throttled_batch_still_releases_pins() {
        let mut f = Fixture::new(3, 6);
        f.run_nominal();
        assert_eq!(f.task.pending_pin_count(), 6);

        f.clock.advance(Duration::from_secs(10));
        let report = f.run(starved());

        assert!(report.throttled.is_some());
        assert_eq!(report.pins_released, 6);
        assert_eq!(report.visited, 0);
        assert_eq!(f.task.pending_pin_count(), 0);
        assert!(f.task.is_throttled());
    }

    #[test]
    fn test_throttled_run_still_counts_as_active() {
        let mut f = Fixture::new(3, 2);
        f.clock.advance(Duration::from_secs(7200));
        f.run(starved());

        let progress = f.task.progress();
        assert_eq!(progress.visited(), 0);
        assert_eq!(progress.last_activity_millis(), START + 7_200_000);
        assert!(!progress.is_stale(Duration::from_secs(3600), START + 7_200_000));
    }

    #[test]
    fn test_throttle_clears_when_recovered() {
        let mut f = Fixture::new(3, 2);
        f.run(starved());
        assert!(f.task.is_throttled());

        let report = f.run_nominal();
        assert!(!f.task.is_throttled());
        assert_eq!(report.visited, 2);
    }

    #[test]
    fn test_retried_cell_is_not_pinned_twice() {
        let mut f = Fixture::new(2, 5);
        let cell = CellCoord::new(0, 0);
        f.region.fail_cell(cell, 2);

        f.run_nominal();
        f.run_nominal();
        assert_eq!(f.region.pin_count(cell), 1);

        f.run_nominal();
        f.clock.advance(Duration::from_secs(60));
        f.run(starved());
        assert_eq!(f.region.pinned_count(), 0);
    }

    #[test]
    fn test_pause_and_resume() {
        let mut f = Fixture::new(2, 5);
        assert!(f.task.pause());
        assert!(!f.task.pause());

        let report = f.run_nominal();
        assert_eq!(report.visited, 0);

        assert!(f.task.resume());
        assert!(!f.task.resume());
        let report = f.run_nominal();
        assert_eq!(report.visited, 5);
    }

    #[test]
    fn test_stop_releases_pins_immediately() {
        let mut f = Fixture::new(3, 5);
        f.run_nominal();
        assert_eq!(f.region.pinned_count(), 5);

        f.task.stop(Some(f.region.as_ref() as &dyn RegionBackend));
        assert_eq!(f.region.pinned_count(), 0);
        assert_eq!(f.task.progress().status(), GenerationStatus::Completed);
    }

    #[test]
    fn test_release_all_pins_keeps_status() {
        let mut f = Fixture::new(3, 3);
        f.run_nominal();

        let released = f.task.release_all_pins(f.region.as_ref());
        assert_eq!(released, 3);
        assert_eq!(f.region.pinned_count(), 0);
        assert_eq!(f.task.progress().status(), GenerationStatus::Running);
    }

    #[test]
    fn test_time_budget_bounds_batch() {
        let mut f = Fixture::new(3, 40);
        f.settings.max_batch_time = Duration::from_millis(30);
        f.region.set_generation_cost(Duration::from_millis(20));

        let report = f.run_nominal();
        assert!(report.visited >= 1);
        assert!(report.visited < 40);
    }

    #[test]
    fn test_fractional_rate() {
        let mut f = Fixture::new(2, 1);
        f.settings.rate = GenerationRate::EveryNInvocations(2);

        assert_eq!(f.run_nominal().visited, 0);
        assert_eq!(f.run_nominal().visited, 1);
        assert_eq!(f.run_nominal().visited, 0);
        assert_eq!(f.run_nominal().visited, 1);
    }

    #[test]
    fn test_counters_monotonic_and_consistent() {
        let mut f = Fixture::new(4, 7);
        f.region.fail_cell(CellCoord::new(2, 2), 5);
        f.region.mark_generated([CellCoord::new(1, 1), CellCoord::new(-2, 0)]);

        let mut last = (0, 0);
        for _ in 0..40 {
            f.run_nominal();
            let p = f.task.progress();
            let now = (p.visited(), p.generated());
            assert!(now.0 >= last.0 && now.1 >= last.1);
            assert!(now.0 >= now.1);
            last = now;
        }
        assert_eq!(f.task.progress().visited(), 81);
    }
}
