//! Bounded, file-backed history of past results.
//!
//! The whole history lives in one JSON array, oldest record first. Reads
//! never fail and write failures are logged, so a broken history file can
//! never prevent a speed test from running.

use crate::errors::SpeedTestError;
use crate::results::ResultRecord;
use log::{debug, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Default number of records kept.
pub const DEFAULT_CAPACITY: usize = 50;

/// File name used when no other location is configured.
pub const DEFAULT_FILE_NAME: &str = "speedtest_history.json";

#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    capacity: usize,
    records: Vec<ResultRecord>,
}

impl HistoryStore {
    /// Load the history at `path`, keeping at most `capacity` records.
    ///
    /// A missing file yields an empty history. So does one that cannot be
    /// read or parsed, with a warning. Files holding more than `capacity`
    /// records are truncated to the newest ones.
    pub fn load(path: impl Into<PathBuf>, capacity: usize) -> Self {
        let path = path.into();
        let capacity = capacity.max(1);

        let mut records = match read_records(&path) {
            Ok(records) => records,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No history at {}, starting empty", path.display());
                Vec::new()
            }
            Err(e) => {
                warn!(
                    "Ignoring unreadable history at {}: {}",
                    path.display(),
                    e
                );
                Vec::new()
            }
        };

        if records.len() > capacity {
            let excess = records.len() - capacity;
            records.drain(..excess);
        }

        Self { path, capacity, records }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// All records, oldest first.
    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    /// The newest `limit` records, newest first.
    pub fn recent(&self, limit: usize) -> impl Iterator<Item = &ResultRecord> {
        self.records.iter().rev().take(limit)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append `record`, evicting the oldest entries beyond capacity, and
    /// rewrite the file.
    pub fn append(&mut self, record: ResultRecord) {
        self.records.push(record);

        if self.records.len() > self.capacity {
            let excess = self.records.len() - self.capacity;
            self.records.drain(..excess);
        }

        self.persist();
    }

    /// Remove every record and rewrite the file.
    pub fn clear(&mut self) {
        self.records.clear();
        self.persist();
    }

    fn persist(&self) {
        match self.save() {
            Ok(()) => debug!(
                "Saved {} records to {}",
                self.records.len(),
                self.path.display()
            ),
            Err(e) => warn!("Could not save history: {}", e),
        }
    }

    fn save(&self) -> Result<(), SpeedTestError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    SpeedTestError::persistence(format!(
                        "cannot create {}: {}",
                        parent.display(),
                        e
                    ))
                    .with_source(e)
                })?;
            }
        }

        let json = serde_json::to_string_pretty(&self.records).map_err(|e| {
            SpeedTestError::persistence(format!("cannot encode history: {}", e))
                .with_source(e)
        })?;

        fs::write(&self.path, json).map_err(|e| {
            SpeedTestError::persistence(format!(
                "cannot write {}: {}",
                self.path.display(),
                e
            ))
            .with_source(e)
        })
    }
}

fn read_records(path: &Path) -> io::Result<Vec<ResultRecord>> {
    let data = fs::read_to_string(path)?;
    serde_json::from_str(&data).map_err(io::Error::from)
}
