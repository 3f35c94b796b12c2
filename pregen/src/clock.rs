//! Wall-clock time source.
//!
//! Timestamps that get persisted (run start, last activity) and pin release
//! deadlines are expressed as milliseconds since the UNIX epoch and read
//! through the [`Clock`] trait, so staleness and deadline logic can be driven
//! deterministically in tests with [`ManualClock`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Source of wall-clock time in epoch milliseconds.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the UNIX epoch.
    fn now_millis(&self) -> u64;
}

/// Clock backed by the system's real time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        Utc::now().timestamp_millis().max(0) as u64
    }
}

/// Manually advanced clock for tests and simulations.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use pregen::clock::{Clock, ManualClock};
///
/// let clock = ManualClock::new(1_000);
/// clock.advance(Duration::from_secs(2));
/// assert_eq!(clock.now_millis(), 3_000);
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicU64,
}

impl ManualClock {
    /// Creates a clock frozen at `start_millis`.
    pub fn new(start_millis: u64) -> Self {
        Self {
            millis: AtomicU64::new(start_millis),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        self.millis
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    /// Jumps to an absolute time.
    pub fn set(&self, millis: u64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}

/// Convert epoch milliseconds to a UTC timestamp.
///
/// Values beyond chrono's representable range fall back to the epoch.
pub fn millis_to_datetime(millis: u64) -> DateTime<Utc> {
    i64::try_from(millis)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Convert a UTC timestamp to epoch milliseconds, clamping pre-epoch times
/// to zero.
pub fn datetime_to_millis(time: &DateTime<Utc>) -> u64 {
    time.timestamp_millis().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_after_2020() {
        // 2020-01-01T00:00:00Z
        assert!(SystemClock.now_millis() > 1_577_836_800_000);
    }

    #[test]
    fn test_manual_clock_advance_and_set() {
        let clock = ManualClock::new(500);
        clock.advance(Duration::from_millis(250));
        assert_eq!(clock.now_millis(), 750);

        clock.set(10);
        assert_eq!(clock.now_millis(), 10);
    }

    #[test]
    fn test_manual_clock_as_trait_object() {
        let clock: Box<dyn Clock> = Box::new(ManualClock::new(42));
        assert_eq!(clock.now_millis(), 42);
    }

    #[test]
    fn test_datetime_roundtrip() {
        let millis = 1_700_000_123_456;
        let time = millis_to_datetime(millis);
        assert_eq!(datetime_to_millis(&time), millis);
    }

    #[test]
    fn test_datetime_before_epoch_clamps_to_zero() {
        let before = DateTime::<Utc>::from_timestamp(-60, 0).unwrap();
        assert_eq!(datetime_to_millis(&before), 0);
    }

    #[test]
    fn test_out_of_range_millis_falls_back_to_epoch() {
        assert_eq!(millis_to_datetime(u64::MAX), DateTime::<Utc>::UNIX_EPOCH);
    }
}
