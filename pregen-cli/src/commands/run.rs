//! Run command - drive the scheduler against a simulated world.
//!
//! Builds an in-memory world with the requested regions, resumes any saved
//! runs, starts the rest and ticks the scheduler at the host tick rate until
//! every task finishes, the tick limit is hit or Ctrl-C is pressed. Progress
//! is saved on the way out so the next invocation picks up where this one
//! stopped.

use std::str::FromStr;
use std::time::{Duration, Instant};

use clap::Args;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use pregen::backend::{RegionMetadata, SimulatedWorld};
use pregen::coord::{CellCoord, RegionId};
use pregen::scheduler::Scheduler;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Interval between host ticks at 20 TPS.
const HOST_TICK: Duration = Duration::from_millis(50);

/// A region to generate, given as `name` or `name:radius`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionSpec {
    pub id: RegionId,
    pub radius: Option<i32>,
}

impl FromStr for RegionSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, radius) = match s.rsplit_once(':') {
            Some((name, radius)) if radius.chars().all(|c| c.is_ascii_digit()) => {
                let radius = radius
                    .parse::<i32>()
                    .map_err(|e| format!("invalid radius in '{}': {}", s, e))?;
                (name, Some(radius))
            }
            _ => (s, None),
        };
        if name.trim().is_empty() {
            return Err(format!("region name missing in '{}'", s));
        }
        Ok(Self {
            id: RegionId::new(name.trim()),
            radius,
        })
    }
}

/// Arguments for the run command.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Regions to generate, as NAME or NAME:RADIUS (repeatable)
    #[arg(long = "region", default_value = "overworld")]
    pub regions: Vec<RegionSpec>,

    /// Radius for regions that do not give one (defaults to the config value)
    #[arg(long)]
    pub radius: Option<i32>,

    /// Spiral center as X,Z
    #[arg(long, default_value = "0,0", allow_hyphen_values = true)]
    pub center: CellCoord,

    /// World seed recorded with each run
    #[arg(long, default_value_t = 0)]
    pub seed: i64,

    /// Simulated time the host spends per tick, in milliseconds
    #[arg(long, default_value_t = 10)]
    pub host_load_ms: u64,

    /// Simulated cost of generating one cell, in milliseconds
    #[arg(long, default_value_t = 0)]
    pub cell_cost_ms: u64,

    /// Stop after this many host ticks
    #[arg(long)]
    pub max_ticks: Option<u64>,

    /// Host ticks between status lines
    #[arg(long, default_value_t = 100)]
    pub status_every: u64,
}

/// Run the run command.
pub fn run(runner: &CliRunner, args: RunArgs) -> Result<(), CliError> {
    runner.log_startup("run");

    let world = build_world(&args)?;
    let mut scheduler = runner.create_scheduler();

    let summary = scheduler.resume_saved_tasks(&world)?;
    info!(
        resumed = summary.resumed,
        missing_region = summary.missing_region,
        not_running = summary.not_running,
        stale = summary.stale,
        invalid = summary.invalid,
        "Loaded saved generation tasks"
    );

    for spec in &args.regions {
        if scheduler.is_active(&spec.id) {
            continue;
        }
        let status = scheduler.start(&world, &spec.id, spec.radius.or(args.radius))?;
        println!("Started {}", status);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    let cancellation = CancellationToken::new();
    let ticks = runtime.block_on(async {
        let ctrl_c_token = cancellation.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, stopping");
                ctrl_c_token.cancel();
            }
        });
        drive(&mut scheduler, &world, &args, cancellation.clone()).await
    });
    cancellation.cancel();

    for status in scheduler.status_all() {
        println!("{}", status);
    }
    let saved = scheduler.shutdown(&world)?;
    println!(
        "Ran {} ticks; saved {} task{}.",
        ticks,
        saved,
        if saved == 1 { "" } else { "s" }
    );
    Ok(())
}

/// Simulated world holding every requested region.
fn build_world(args: &RunArgs) -> Result<SimulatedWorld, CliError> {
    if let Some(radius) = args.radius {
        if radius < 0 {
            return Err(CliError::InvalidArgument(format!(
                "radius must be non-negative, got {}",
                radius
            )));
        }
    }

    let world = SimulatedWorld::new();
    world.set_tick_latency(Duration::from_millis(args.host_load_ms));
    for spec in &args.regions {
        let region = world.add_region(
            spec.id.clone(),
            RegionMetadata {
                center: args.center,
                seed: args.seed,
                generation_enabled: true,
                bound_radius: None,
            },
        );
        region.set_generation_cost(Duration::from_millis(args.cell_cost_ms));
    }
    Ok(world)
}

/// Ticks the scheduler until it has nothing left to do, the tick limit is
/// reached or `cancellation` fires. Returns the number of ticks run.
async fn drive(
    scheduler: &mut Scheduler,
    world: &SimulatedWorld,
    args: &RunArgs,
    cancellation: CancellationToken,
) -> u64 {
    let mut interval = tokio::time::interval(HOST_TICK);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let host_load = Duration::from_millis(args.host_load_ms);
    let status_every = args.status_every.max(1);
    let mut ticks = 0u64;

    loop {
        tokio::select! {
            biased;
            _ = cancellation.cancelled() => break,
            _ = interval.tick() => {
                let started = Instant::now();
                let outcome = scheduler.tick(world);
                world.set_tick_latency(host_load + started.elapsed());
                ticks += 1;

                for region in &outcome.completed {
                    println!("Finished {}", region);
                }
                for region in &outcome.vanished {
                    warn!(region = %region, "Region disappeared during generation");
                }
                if outcome.saved {
                    debug!(ticks, "Progress saved");
                }
                if ticks % status_every == 0 {
                    for status in scheduler.status_all() {
                        info!("{}", status);
                    }
                }

                if scheduler.active_count() == 0 {
                    info!(ticks, "No generation tasks left");
                    break;
                }
                if args.max_ticks.is_some_and(|max| ticks >= max) {
                    info!(ticks, "Tick limit reached");
                    break;
                }
            }
        }
    }

    ticks
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        run: RunArgs,
    }

    #[test]
    fn test_region_spec_parsing() {
        let spec: RegionSpec = "overworld".parse().unwrap();
        assert_eq!(spec.id, RegionId::new("overworld"));
        assert_eq!(spec.radius, None);

        let spec: RegionSpec = "nether:32".parse().unwrap();
        assert_eq!(spec.id, RegionId::new("nether"));
        assert_eq!(spec.radius, Some(32));

        let spec: RegionSpec = "minecraft:the_end".parse().unwrap();
        assert_eq!(spec.id, RegionId::new("minecraft:the_end"));
        assert_eq!(spec.radius, None);

        assert!(":5".parse::<RegionSpec>().is_err());
    }

    #[test]
    fn test_run_args_defaults() {
        let cli = TestCli::parse_from(["pregen"]);
        assert_eq!(cli.run.regions.len(), 1);
        assert_eq!(cli.run.regions[0].id, RegionId::new("overworld"));
        assert_eq!(cli.run.center, CellCoord::new(0, 0));
        assert_eq!(cli.run.max_ticks, None);
    }

    #[test]
    fn test_run_args_negative_center() {
        let cli = TestCli::parse_from(["pregen", "--center", "-4,9", "--region", "a:2"]);
        assert_eq!(cli.run.center, CellCoord::new(-4, 9));
        assert_eq!(cli.run.regions[0].radius, Some(2));
    }

    #[test]
    fn test_build_world_rejects_negative_radius() {
        let cli = TestCli::parse_from(["pregen", "--radius=-1"]);
        assert!(matches!(
            build_world(&cli.run),
            Err(CliError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_drive_finishes_small_region() {
        use pregen::scheduler::SchedulerConfig;
        use pregen::store::MemoryStore;
        use std::sync::Arc;

        let cli = TestCli::parse_from(["pregen", "--region", "overworld:2", "--host-load-ms", "0"]);
        let world = build_world(&cli.run).unwrap();
        let mut scheduler =
            Scheduler::new(SchedulerConfig::default(), Arc::new(MemoryStore::new()));
        let id = RegionId::new("overworld");
        scheduler.start(&world, &id, Some(2)).unwrap();

        let ticks = drive(&mut scheduler, &world, &cli.run, CancellationToken::new()).await;

        assert_eq!(scheduler.active_count(), 0);
        assert!(ticks >= 7);
        assert_eq!(world.region(&id).unwrap().generated_count(), 25);
    }

    #[tokio::test]
    async fn test_drive_stops_when_cancelled() {
        use pregen::scheduler::SchedulerConfig;
        use pregen::store::MemoryStore;
        use std::sync::Arc;

        let cli = TestCli::parse_from(["pregen"]);
        let world = build_world(&cli.run).unwrap();
        let mut scheduler =
            Scheduler::new(SchedulerConfig::default(), Arc::new(MemoryStore::new()));
        scheduler
            .start(&world, &RegionId::new("overworld"), Some(64))
            .unwrap();

        let token = CancellationToken::new();
        token.cancel();
        let ticks = drive(&mut scheduler, &world, &cli.run, token).await;

        assert_eq!(ticks, 0);
        assert_eq!(scheduler.active_count(), 1);
    }
}
