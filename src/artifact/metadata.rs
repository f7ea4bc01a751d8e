//! Sidecar metadata store
//!
//! Each file in flight has a `<stem>.meta` JSON record next to it:
//!
//! ```json
//! {
//!   "status": "processing",
//!   "last_updated": "2025-01-01T12:00:00.042Z",
//!   "original_filename": "test_20250101_120000_042.txt"
//! }
//! ```
//!
//! Writes go through a temporary file in the same directory and are renamed
//! into place, so readers see either the old record or the new one.

use crate::artifact::naming::{Naming, META_EXTENSION};
use crate::artifact::write_atomic;
use crate::error::{MetadataError, MetadataResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Lifecycle status of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataStatus {
    /// Pipeline started, not finalized
    Processing,
    /// Output written; archival pending or done
    Completed,
    /// A stage failed; see `error_message`
    Failed,
}

impl MetadataStatus {
    /// Lowercase name as stored on disk
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataStatus::Processing => "processing",
            MetadataStatus::Completed => "completed",
            MetadataStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for MetadataStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// On-disk sidecar record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub status: MetadataStatus,
    pub last_updated: DateTime<Utc>,
    pub original_filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl MetadataRecord {
    /// Build a record stamped with the current time
    pub fn new(original_filename: &str, status: MetadataStatus, error: Option<&str>) -> Self {
        Self {
            status,
            last_updated: Utc::now(),
            original_filename: original_filename.to_string(),
            error_message: error.map(str::to_string),
        }
    }
}

/// Reads and writes sidecars in one directory
#[derive(Debug, Clone)]
pub struct MetadataStore {
    /// Directory holding the sidecars (the input directory)
    dir: PathBuf,

    /// Naming scheme used to derive sidecar names
    naming: Naming,
}

impl MetadataStore {
    /// Create a store rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>, naming: Naming) -> Self {
        Self {
            dir: dir.into(),
            naming,
        }
    }

    /// Directory holding the sidecars
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Sidecar path for an original filename
    pub fn path_for(&self, filename: &str) -> PathBuf {
        self.dir.join(self.naming.meta_name(filename))
    }

    /// Check whether a sidecar exists for `filename`
    pub fn exists(&self, filename: &str) -> bool {
        self.path_for(filename).exists()
    }

    /// Atomically create or replace the sidecar for `filename`
    pub fn write(
        &self,
        filename: &str,
        status: MetadataStatus,
        error: Option<&str>,
    ) -> MetadataResult<MetadataRecord> {
        let path = self.path_for(filename);
        let record = MetadataRecord::new(filename, status, error);

        let body = serde_json::to_vec_pretty(&record).map_err(|e| MetadataError::Write {
            path: path.clone(),
            source: io::Error::from(e),
        })?;

        write_atomic(&path, &body).map_err(|source| MetadataError::Write { path, source })?;
        Ok(record)
    }

    /// Read the sidecar for `filename`, `None` if absent
    pub fn read(&self, filename: &str) -> MetadataResult<Option<MetadataRecord>> {
        read_record(&self.path_for(filename))
    }

    /// Remove the sidecar for `filename`; absent is success
    pub fn delete(&self, filename: &str) -> MetadataResult<()> {
        let path = self.path_for(filename);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(MetadataError::Delete { path, source }),
        }
    }

    /// Sidecars in the directory whose original has this store's extension,
    /// sorted by sidecar name
    ///
    /// Unreadable or invalid records are always returned, as errors next to
    /// their sidecar name, instead of aborting the listing.
    pub fn list(&self) -> MetadataResult<Vec<(String, MetadataResult<MetadataRecord>)>> {
        let entries = fs::read_dir(&self.dir).map_err(|source| MetadataError::Read {
            path: self.dir.clone(),
            source,
        })?;

        let mut records = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(META_EXTENSION) {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let record = read_record(&path).and_then(|r| {
                r.ok_or_else(|| MetadataError::Read {
                    path: path.clone(),
                    source: io::Error::from(io::ErrorKind::NotFound),
                })
            });
            if matches!(&record, Ok(r) if !self.naming.matches(&r.original_filename)) {
                continue;
            }
            records.push((name, record));
        }

        records.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(records)
    }
}

fn read_record(path: &Path) -> MetadataResult<Option<MetadataRecord>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(MetadataError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| MetadataError::InvalidRecord {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}
