//! ProcessedStore: the JSON file of message ids already handled.
//!
//! File shape: `{"processed_ids": [...], "last_updated": <unix seconds>}`.
//! Ids are written sorted so the file diffs cleanly between runs.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::StoreError;

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProcessedFile {
    #[serde(default)]
    processed_ids: Vec<String>,
    #[serde(default)]
    last_updated: Option<f64>,
}

/// File-backed set of processed message ids.
#[derive(Debug, Clone)]
pub struct ProcessedStore {
    path: PathBuf,
}

impl ProcessedStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the id set. A missing or unreadable file yields an empty set.
    pub fn load(&self) -> HashSet<String> {
        match self.read_file() {
            Ok(Some(file)) => {
                let ids: HashSet<String> = file.processed_ids.into_iter().collect();
                info!(count = ids.len(), path = %self.path.display(), "Loaded processed message history");
                ids
            }
            Ok(None) => {
                debug!(path = %self.path.display(), "No processed message history yet");
                HashSet::new()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Could not load processed message history, starting empty");
                HashSet::new()
            }
        }
    }

    /// Persist `ids` with `updated_at` as the last-updated timestamp.
    ///
    /// Writes a sibling temp file and renames it over the target, so a
    /// crash mid-write leaves the previous file intact.
    pub fn save(&self, ids: &HashSet<String>, updated_at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut sorted: Vec<String> = ids.iter().cloned().collect();
        sorted.sort();

        let file = ProcessedFile {
            processed_ids: sorted,
            last_updated: Some(updated_at.timestamp_millis() as f64 / 1000.0),
        };
        let json = serde_json::to_string_pretty(&file)?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let tmp = self.temp_path();
        fs::write(&tmp, json).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;

        debug!(count = ids.len(), path = %self.path.display(), "Saved processed message history");
        Ok(())
    }

    /// Replace the history with an empty set stamped `now`.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.save(&HashSet::new(), Utc::now())?;
        info!(path = %self.path.display(), "Cleared processed message history");
        Ok(())
    }

    /// Timestamp of the last save, if the file exists and carries one.
    pub fn read_last_updated(&self) -> Option<DateTime<Utc>> {
        let secs = self.read_file().ok()??.last_updated?;
        DateTime::from_timestamp_millis((secs * 1000.0).round() as i64)
    }

    fn read_file(&self) -> Result<Option<ProcessedFile>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
