//! Durable storage for generation progress.
//!
//! Progress for every active or recently active region lives in one JSON
//! document:
//!
//! ```text
//! {
//!   "version": 1,
//!   "regions": {
//!     "minecraft:overworld": { "status": "RUNNING", "visited": 412, ... },
//!     "minecraft:the_nether": { "status": "COMPLETED", ... }
//!   }
//! }
//! ```
//!
//! Loading is tolerant: a region entry that fails to decode is skipped with a
//! warning and the remaining entries still load. A missing file is an empty
//! store. Saves write a sibling temporary file and rename it over the
//! original, so a crash mid-write never leaves a truncated document.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::coord::RegionId;
use crate::progress::ProgressRecord;

/// Document format version. Increment when the layout changes.
pub const DOCUMENT_VERSION: u64 = 1;

/// Progress records keyed by region.
pub type RecordMap = BTreeMap<RegionId, ProgressRecord>;

/// Errors from progress storage.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to read progress file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write progress file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Progress file {path} is not a valid progress document: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Progress file {path} has unsupported version {version}")]
    UnsupportedVersion { path: PathBuf, version: u64 },

    #[error("Failed to encode progress: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Where progress records are kept between runs.
pub trait ProgressStore: Send + Sync {
    /// Every stored record. Individually malformed records are skipped.
    fn load(&self) -> Result<RecordMap, StoreError>;

    /// Replaces the stored records with `records`.
    fn save(&self, records: &RecordMap) -> Result<(), StoreError>;

    /// Moves an undecodable document out of the way so a fresh one can be
    /// written. Returns where it went, or `None` if the store keeps nothing
    /// that could be moved.
    fn set_aside(&self) -> Result<Option<PathBuf>, StoreError> {
        Ok(None)
    }
}

#[derive(Serialize)]
struct DocumentOut<'a> {
    version: u64,
    regions: BTreeMap<&'a str, &'a ProgressRecord>,
}

#[derive(Deserialize)]
struct DocumentIn {
    version: u64,
    #[serde(default)]
    regions: Map<String, Value>,
}

/// JSON file store.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        self.sibling_path(".tmp")
    }

    /// Where [`ProgressStore::set_aside`] moves an unreadable document.
    pub fn corrupt_path(&self) -> PathBuf {
        self.sibling_path(".corrupt")
    }

    fn sibling_path(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(suffix);
        self.path.with_file_name(name)
    }

    fn write_error(&self, source: io::Error) -> StoreError {
        StoreError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

impl ProgressStore for JsonFileStore {
    fn load(&self) -> Result<RecordMap, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No progress file, starting empty");
                return Ok(RecordMap::new());
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let document: DocumentIn =
            serde_json::from_str(&content).map_err(|source| StoreError::Parse {
                path: self.path.clone(),
                source,
            })?;
        if document.version != DOCUMENT_VERSION {
            return Err(StoreError::UnsupportedVersion {
                path: self.path.clone(),
                version: document.version,
            });
        }

        Ok(decode_regions(document.regions))
    }

    fn save(&self, records: &RecordMap) -> Result<(), StoreError> {
        let document = DocumentOut {
            version: DOCUMENT_VERSION,
            regions: records
                .iter()
                .map(|(id, record)| (id.as_str(), record))
                .collect(),
        };
        let json = serde_json::to_string_pretty(&document).map_err(StoreError::Encode)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.write_error(e))?;
            }
        }

        let temp = self.temp_path();
        fs::write(&temp, json).map_err(|e| self.write_error(e))?;
        fs::rename(&temp, &self.path).map_err(|e| {
            let _ = fs::remove_file(&temp);
            self.write_error(e)
        })?;

        debug!(path = %self.path.display(), regions = records.len(), "Saved generation progress");
        Ok(())
    }

    fn set_aside(&self) -> Result<Option<PathBuf>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let target = self.corrupt_path();
        fs::rename(&self.path, &target).map_err(|e| self.write_error(e))?;
        warn!(path = %self.path.display(), moved_to = %target.display(), "Moved unreadable progress file aside");
        Ok(Some(target))
    }
}

fn decode_regions(regions: Map<String, Value>) -> RecordMap {
    let mut records = RecordMap::new();
    for (key, value) in regions {
        match serde_json::from_value::<ProgressRecord>(value) {
            Ok(record) if record.region == key => {
                records.insert(RegionId::new(key), record);
            }
            Ok(record) => {
                warn!(key = %key, region = %record.region, "Skipping progress record filed under the wrong region");
            }
            Err(e) => {
                warn!(region = %key, error = %e, "Skipping malformed progress record");
            }
        }
    }
    records
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<RecordMap>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn get(&self, region: &RegionId) -> Option<ProgressRecord> {
        self.records.lock().get(region).cloned()
    }

    pub fn insert(&self, record: ProgressRecord) {
        self.records
            .lock()
            .insert(RegionId::new(record.region.clone()), record);
    }
}

impl ProgressStore for MemoryStore {
    fn load(&self) -> Result<RecordMap, StoreError> {
        Ok(self.records.lock().clone())
    }

    fn save(&self, records: &RecordMap) -> Result<(), StoreError> {
        *self.records.lock() = records.clone();
        Ok(())
    }
}
