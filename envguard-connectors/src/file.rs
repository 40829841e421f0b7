//! File-backed datastore and artifact store
//!
//! [`JsonlDatastore`] reads a JSON-lines export of the readings collection,
//! one [`Reading`] per line. The file is re-read on every query so readings
//! appended by another process show up on the next cycle.
//!
//! [`FileArtifactStore`] keeps one `{key}.json` file per artifact under a
//! root directory. Writes go to a hidden temporary file first and are then
//! renamed over the target, so a crash mid-write leaves the previous blob.

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use envguard_core::{ArtifactStore, ArtifactStoreError, Datastore, DatastoreError, Reading};

use crate::ConnectorStats;

/// Datastore over a JSON-lines file
pub struct JsonlDatastore {
    path: PathBuf,
    stats: Mutex<ConnectorStats>,
}

impl JsonlDatastore {
    /// Datastore reading from `path`; the file need not exist yet
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            stats: Mutex::new(ConnectorStats::default()),
        }
    }

    /// Backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one reading as a new line, creating the file if needed
    pub fn append(&self, reading: &Reading) -> Result<(), DatastoreError> {
        let line = serde_json::to_string(reading).map_err(|e| DatastoreError::Decode(e.to_string()))?;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    /// Query counters so far
    pub fn stats(&self) -> ConnectorStats {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// All readings in timestamp order
    fn load(&self) -> Result<Vec<Reading>, DatastoreError> {
        let result = self.parse_file();
        if result.is_err() {
            self.stats.lock().unwrap_or_else(PoisonError::into_inner).failures += 1;
        }
        result
    }

    fn parse_file(&self) -> Result<Vec<Reading>, DatastoreError> {
        let file = fs::File::open(&self.path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => {
                DatastoreError::Unavailable(format!("{} does not exist", self.path.display()))
            }
            _ => DatastoreError::Io(e),
        })?;

        let mut readings = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let reading: Reading = serde_json::from_str(&line)
                .map_err(|e| DatastoreError::Decode(format!("line {}: {}", index + 1, e)))?;
            readings.push(reading);
        }

        readings.sort_by_key(|r| r.timestamp);
        log::trace!("Loaded {} readings from {}", readings.len(), self.path.display());
        Ok(readings)
    }
}

impl Datastore for JsonlDatastore {
    fn readings_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Reading>, DatastoreError> {
        let window: Vec<Reading> = self
            .load()?
            .into_iter()
            .filter(|r| r.timestamp >= start && r.timestamp <= end)
            .collect();

        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        stats.range_queries += 1;
        stats.readings_served += window.len() as u64;
        Ok(window)
    }

    fn latest_readings(&self, sensor_id: &str, limit: usize) -> Result<Vec<Reading>, DatastoreError> {
        let latest: Vec<Reading> = self
            .load()?
            .into_iter()
            .rev()
            .filter(|r| r.sensor_id == sensor_id)
            .take(limit)
            .collect();

        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        stats.latest_queries += 1;
        stats.readings_served += latest.len() as u64;
        Ok(latest)
    }
}

/// Artifact store over a directory of JSON files
#[derive(Debug, Clone)]
pub struct FileArtifactStore {
    root: PathBuf,
}

impl FileArtifactStore {
    /// Store rooted at `root`, creating the directory if needed
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, ArtifactStoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, ArtifactStoreError> {
        // Keys become file names; anything that could escape the root is refused
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(ArtifactStoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(format!("{}.json", key)))
    }
}

impl ArtifactStore for FileArtifactStore {
    fn exists(&self, key: &str) -> Result<bool, ArtifactStoreError> {
        Ok(self.path_for(key)?.try_exists()?)
    }

    fn write(&self, key: &str, data: &[u8]) -> Result<(), ArtifactStoreError> {
        let target = self.path_for(key)?;
        let staging = self.root.join(format!(".{}.json.tmp", key));

        fs::write(&staging, data)?;
        if let Err(err) = fs::rename(&staging, &target) {
            // Leave no stray staging file behind
            let _ = fs::remove_file(&staging);
            return Err(err.into());
        }
        log::debug!("Wrote {} bytes to {}", data.len(), target.display());
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Vec<u8>, ArtifactStoreError> {
        let path = self.path_for(key)?;
        fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ArtifactStoreError::NotFound(key.to_string()),
            _ => ArtifactStoreError::Io(e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use envguard_core::Quantity;
    use tempfile::TempDir;

    fn reading(hour: u32, sensor: &str, ph: f64) -> Reading {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap();
        Reading::new(ts, sensor, "water").with_value(Quantity::Ph, ph)
    }

    #[test]
    fn test_jsonl_append_and_query() {
        let dir = TempDir::new().unwrap();
        let store = JsonlDatastore::new(dir.path().join("readings.jsonl"));

        for (hour, ph) in [(3, 7.3), (1, 7.1), (2, 7.2)] {
            store.append(&reading(hour, "WATER_001", ph)).unwrap();
        }
        store.append(&reading(4, "WATER_002", 6.9)).unwrap();

        let start = Utc.with_ymd_and_hms(2024, 5, 1, 1, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 5, 1, 3, 0, 0).unwrap();
        let window = store.readings_between(start, end).unwrap();
        let values: Vec<f64> = window.iter().filter_map(|r| r.value(Quantity::Ph)).collect();
        assert_eq!(values, vec![7.1, 7.2, 7.3]);

        let latest = store.latest_readings("WATER_001", 2).unwrap();
        let values: Vec<f64> = latest.iter().filter_map(|r| r.value(Quantity::Ph)).collect();
        assert_eq!(values, vec![7.3, 7.2]);

        let stats = store.stats();
        assert_eq!(stats.range_queries, 1);
        assert_eq!(stats.latest_queries, 1);
    }

    #[test]
    fn test_jsonl_missing_file_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let store = JsonlDatastore::new(dir.path().join("absent.jsonl"));

        assert!(matches!(
            store.latest_readings("WATER_001", 5),
            Err(DatastoreError::Unavailable(_))
        ));
        assert_eq!(store.stats().failures, 1);
    }

    #[test]
    fn test_jsonl_reports_bad_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("readings.jsonl");
        let good = serde_json::to_string(&reading(1, "A", 7.0)).unwrap();
        fs::write(&path, format!("{}\n\nnot json\n", good)).unwrap();

        let store = JsonlDatastore::new(&path);
        match store.latest_readings("A", 1) {
            Err(DatastoreError::Decode(msg)) => assert!(msg.starts_with("line 3")),
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[test]
    fn test_artifact_files() {
        let dir = TempDir::new().unwrap();
        let store = FileArtifactStore::new(dir.path().join("models")).unwrap();

        assert!(!store.exists("ph_model").unwrap());
        store.write("ph_model", b"{\"a\":1}").unwrap();
        store.write("ph_model", b"{\"a\":2}").unwrap();

        assert!(store.exists("ph_model").unwrap());
        assert_eq!(store.read("ph_model").unwrap(), b"{\"a\":2}".to_vec());
        assert!(store.root().join("ph_model.json").is_file());

        // Only the artifact itself remains after the rename
        let entries = fs::read_dir(store.root()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_artifact_missing_and_invalid_keys() {
        let dir = TempDir::new().unwrap();
        let store = FileArtifactStore::new(dir.path()).unwrap();

        assert!(matches!(
            store.read("co2_scaler"),
            Err(ArtifactStoreError::NotFound(_))
        ));
        for key in ["", "../escape", "a/b", "dot.key"] {
            assert!(matches!(
                store.write(key, b"x"),
                Err(ArtifactStoreError::InvalidKey(_))
            ));
        }
    }
}
