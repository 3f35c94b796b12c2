//! Adaptive throttling against live host performance.
//!
//! Generation competes with the host's own tick work, so every batch first
//! checks three signals and backs off when any of them is unhealthy:
//!
//! | Signal        | Source                               | Throttles when              |
//! |---------------|--------------------------------------|-----------------------------|
//! | Ticks/second  | [`WorldBackend::tick_latency`]       | below `min_tps`             |
//! | Memory        | [`WorldBackend::memory_usage_percent`] | above `max_memory_percent` |
//! | Live users    | [`RegionBackend::has_live_users`]    | present and configured to pause |
//!
//! Memory and user signals are only consulted when the backend declares the
//! matching [`BackendCapabilities`] flag.
//!
//! When not throttled, the batch size is scaled across three TPS bands:
//!
//! ```text
//! tps >= high_tps   full rate
//! tps >= mid_tps    rate - 1 (at least 1)
//! tps >= low_tps    1
//! otherwise         0
//! ```

use std::fmt;
use std::time::Duration;

use crate::backend::{BackendCapabilities, RegionBackend, WorldBackend};
use crate::config;
use crate::progress::GenerationProgress;

/// The host's nominal tick rate. Effective TPS never exceeds this.
pub const NOMINAL_TPS: f64 = 20.0;

/// Converts an average tick duration to an effective ticks-per-second rate.
pub fn effective_tps(tick_latency: Duration) -> f64 {
    let millis = tick_latency.as_secs_f64() * 1000.0;
    if millis <= 0.0 {
        return NOMINAL_TPS;
    }
    (1000.0 / millis).min(NOMINAL_TPS)
}

/// Performance signals sampled once per scheduler tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceSample {
    /// Effective ticks per second.
    pub tps: f64,
    /// Memory usage, `None` when the backend cannot report it.
    pub memory_percent: Option<u8>,
    /// Whether per-region user presence is meaningful.
    pub live_users_supported: bool,
}

impl PerformanceSample {
    /// Reads the current signals from the backend.
    pub fn capture(world: &dyn WorldBackend) -> Self {
        let capabilities = world.capabilities();
        Self::from_signals(
            world.tick_latency(),
            capabilities
                .memory_usage
                .then(|| world.memory_usage_percent()),
            capabilities,
        )
    }

    pub fn from_signals(
        tick_latency: Duration,
        memory_percent: Option<u8>,
        capabilities: BackendCapabilities,
    ) -> Self {
        Self {
            tps: effective_tps(tick_latency),
            memory_percent: if capabilities.memory_usage {
                memory_percent
            } else {
                None
            },
            live_users_supported: capabilities.live_users,
        }
    }

    /// A healthy host at full speed with no optional signals.
    pub fn nominal() -> Self {
        Self {
            tps: NOMINAL_TPS,
            memory_percent: None,
            live_users_supported: false,
        }
    }
}

/// Why a batch was held back.
#[derive(Debug, Clone, PartialEq)]
pub enum ThrottleReason {
    LowTps { tps: f64, min_tps: f64 },
    MemoryPressure { percent: u8, max_percent: u8 },
    UsersPresent,
}

impl fmt::Display for ThrottleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThrottleReason::LowTps { tps, min_tps } => {
                write!(f, "low TPS ({:.1} < {:.1})", tps, min_tps)
            }
            ThrottleReason::MemoryPressure {
                percent,
                max_percent,
            } => write!(f, "memory at {}% (max {}%)", percent, max_percent),
            ThrottleReason::UsersPresent => write!(f, "users present"),
        }
    }
}

/// Thresholds for throttling and batch scaling.
#[derive(Debug, Clone, PartialEq)]
pub struct ThrottleSettings {
    /// Below this TPS generation is throttled entirely.
    pub min_tps: f64,
    /// At or above this TPS the full rate is used.
    pub high_tps: f64,
    /// At or above this TPS the rate drops by one.
    pub mid_tps: f64,
    /// At or above this TPS a single cell is processed.
    pub low_tps: f64,
    /// Memory percentage above which generation is throttled.
    pub max_memory_percent: u8,
    /// Throttle while users are present in the target region.
    pub pause_when_users_present: bool,
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self {
            min_tps: config::DEFAULT_MIN_TPS,
            high_tps: config::DEFAULT_HIGH_TPS,
            mid_tps: config::DEFAULT_MID_TPS,
            low_tps: config::DEFAULT_LOW_TPS,
            max_memory_percent: config::DEFAULT_MAX_MEMORY_PERCENT,
            pause_when_users_present: false,
        }
    }
}

impl ThrottleSettings {
    /// Returns the first reason to hold back, or `None` if generation may run.
    pub fn evaluate(
        &self,
        sample: &PerformanceSample,
        region: &dyn RegionBackend,
    ) -> Option<ThrottleReason> {
        if sample.tps < self.min_tps {
            return Some(ThrottleReason::LowTps {
                tps: sample.tps,
                min_tps: self.min_tps,
            });
        }

        if let Some(percent) = sample.memory_percent {
            if percent > self.max_memory_percent {
                return Some(ThrottleReason::MemoryPressure {
                    percent,
                    max_percent: self.max_memory_percent,
                });
            }
        }

        if self.pause_when_users_present && sample.live_users_supported && region.has_live_users()
        {
            return Some(ThrottleReason::UsersPresent);
        }

        None
    }

    /// Scales a per-invocation rate to the current TPS band.
    pub fn scaled_batch(&self, rate: u32, tps: f64) -> u32 {
        if tps >= self.high_tps {
            rate
        } else if tps >= self.mid_tps {
            rate.saturating_sub(1).max(1)
        } else if tps >= self.low_tps {
            1
        } else {
            0
        }
    }
}

/// Configured generation speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationRate {
    /// Up to `n` cells per invocation.
    PerInvocation(u32),
    /// One cell every `n` invocations.
    EveryNInvocations(u32),
}

impl GenerationRate {
    /// Interprets a cells-per-invocation figure.
    ///
    /// Values of one or more are truncated to whole cells; smaller values
    /// become a cadence of one cell every `round(1 / rate)` invocations.
    /// Returns `None` for non-finite or non-positive input.
    pub fn from_cells_per_invocation(rate: f64) -> Option<Self> {
        if !rate.is_finite() || rate <= 0.0 {
            return None;
        }
        if rate >= 1.0 {
            Some(Self::PerInvocation(rate.min(u32::MAX as f64) as u32))
        } else {
            let every = (1.0 / rate).round().clamp(1.0, u32::MAX as f64) as u32;
            Some(Self::EveryNInvocations(every))
        }
    }

    pub fn cells_per_invocation(&self) -> f64 {
        match self {
            Self::PerInvocation(n) => *n as f64,
            Self::EveryNInvocations(n) => 1.0 / (*n).max(1) as f64,
        }
    }

    /// Number of cells this invocation may process.
    ///
    /// In fractional mode this advances the progress' persisted cadence
    /// counter, so it must be called once per evaluated invocation.
    pub fn batch_size(
        &self,
        settings: &ThrottleSettings,
        tps: f64,
        progress: &GenerationProgress,
    ) -> u32 {
        match *self {
            Self::PerInvocation(n) => settings.scaled_batch(n, tps),
            Self::EveryNInvocations(n) => u32::from(progress.tick_fractional(n)),
        }
    }
}

impl Default for GenerationRate {
    fn default() -> Self {
        Self::PerInvocation(config::DEFAULT_RATE as u32)
    }
}

impl fmt::Display for GenerationRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PerInvocation(n) => write!(f, "{} cells/invocation", n),
            Self::EveryNInvocations(n) => write!(f, "1 cell every {} invocations", n),
        }
    }
}
