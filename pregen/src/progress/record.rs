//! Serializable form of [`GenerationProgress`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use super::{GenerationProgress, GenerationStatus};
use crate::clock::{datetime_to_millis, millis_to_datetime};
use crate::coord::{CellCoord, RegionId};
use crate::spiral::{SpiralError, SpiralIterator, SpiralState};

/// A stored record that cannot be turned back into live progress.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Region '{region}' has an invalid spiral state: {source}")]
    Spiral {
        region: String,
        #[source]
        source: SpiralError,
    },

    #[error("Region '{region}' records {generated} generated cells but only {visited} visited")]
    CounterMismatch {
        region: String,
        visited: u64,
        generated: u64,
    },
}

/// One region's progress as written to the progress file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub region: String,
    pub seed: i64,
    pub status: GenerationStatus,
    pub visited: u64,
    pub generated: u64,
    #[serde(default)]
    pub skipped: u64,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub spiral: SpiralState,
    #[serde(default)]
    pub fractional_counter: u32,
    /// Pending retry counts keyed by `"x,z"`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub retries: BTreeMap<String, u32>,
}

impl ProgressRecord {
    pub fn last_activity_millis(&self) -> u64 {
        datetime_to_millis(&self.last_activity)
    }
}

impl GenerationProgress {
    /// Captures the current progress as a record.
    pub fn to_record(&self) -> ProgressRecord {
        ProgressRecord {
            region: self.region.as_str().to_string(),
            seed: self.seed,
            status: self.status(),
            visited: self.visited(),
            generated: self.generated(),
            skipped: self.skipped(),
            started_at: millis_to_datetime(self.started_at),
            last_activity: millis_to_datetime(self.last_activity_millis()),
            last_error: self.last_error(),
            spiral: self.spiral_state(),
            fractional_counter: self.fractional_counter(),
            retries: self
                .pending_retries()
                .into_iter()
                .map(|(coord, count)| (coord.to_string(), count))
                .collect(),
        }
    }

    /// Rebuilds live progress from a stored record.
    ///
    /// Retry entries with unparseable keys or a zero count are dropped.
    pub fn from_record(record: &ProgressRecord) -> Result<Self, RecordError> {
        if record.generated > record.visited {
            return Err(RecordError::CounterMismatch {
                region: record.region.clone(),
                visited: record.visited,
                generated: record.generated,
            });
        }

        let spiral = SpiralIterator::from_state(record.spiral).map_err(|source| {
            RecordError::Spiral {
                region: record.region.clone(),
                source,
            }
        })?;

        let retries = DashMap::new();
        for (key, &count) in &record.retries {
            if count == 0 {
                continue;
            }
            match key.parse::<CellCoord>() {
                Ok(coord) => {
                    retries.insert(coord, count);
                }
                Err(e) => {
                    warn!(region = %record.region, key = %key, error = %e, "Dropping malformed retry entry");
                }
            }
        }

        let total_cells = spiral.total_cells();
        Ok(Self {
            region: RegionId::new(record.region.clone()),
            seed: record.seed,
            status: AtomicU8::new(record.status.to_u8()),
            visited: AtomicU64::new(record.visited),
            generated: AtomicU64::new(record.generated),
            skipped: AtomicU64::new(record.skipped),
            fractional_counter: AtomicU32::new(record.fractional_counter),
            retries,
            started_at: datetime_to_millis(&record.started_at),
            last_activity: AtomicU64::new(datetime_to_millis(&record.last_activity)),
            last_error: RwLock::new(record.last_error.clone()),
            spiral: Mutex::new(spiral),
            total_cells,
        })
    }
}
