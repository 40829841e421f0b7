//! In-memory datastore and artifact store

use std::collections::BTreeMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use envguard_core::{ArtifactStore, ArtifactStoreError, Datastore, DatastoreError, Reading};

use crate::ConnectorStats;

/// Datastore backed by a vector of readings kept in timestamp order
pub struct MemoryDatastore {
    readings: RwLock<Vec<Reading>>,
    available: AtomicBool,
    stats: Mutex<ConnectorStats>,
}

impl MemoryDatastore {
    /// Empty, available datastore
    pub fn new() -> Self {
        Self::with_readings(Vec::new())
    }

    /// Datastore preloaded with readings in any order
    pub fn with_readings(mut readings: Vec<Reading>) -> Self {
        readings.sort_by_key(|r| r.timestamp);
        Self {
            readings: RwLock::new(readings),
            available: AtomicBool::new(true),
            stats: Mutex::new(ConnectorStats::default()),
        }
    }

    /// Ingest one reading
    pub fn push(&self, reading: Reading) {
        let mut readings = self.readings.write().unwrap_or_else(PoisonError::into_inner);
        let at = readings.partition_point(|r| r.timestamp <= reading.timestamp);
        readings.insert(at, reading);
    }

    /// Number of stored readings
    pub fn len(&self) -> usize {
        self.readings.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no readings are stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make every subsequent query fail with [`DatastoreError::Unavailable`]
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Query counters so far
    pub fn stats(&self) -> ConnectorStats {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn record(&self, update: impl FnOnce(&mut ConnectorStats)) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        update(&mut *stats);
    }

    fn check_available(&self) -> Result<(), DatastoreError> {
        if self.available.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.record(|s| s.failures += 1);
        Err(DatastoreError::Unavailable("memory datastore offline".to_string()))
    }
}

impl Default for MemoryDatastore {
    fn default() -> Self {
        Self::new()
    }
}

impl Datastore for MemoryDatastore {
    fn readings_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Reading>, DatastoreError> {
        self.check_available()?;

        let readings = self.readings.read().unwrap_or_else(PoisonError::into_inner);
        let window: Vec<Reading> = readings
            .iter()
            .filter(|r| r.timestamp >= start && r.timestamp <= end)
            .cloned()
            .collect();

        self.record(|s| {
            s.range_queries += 1;
            s.readings_served += window.len() as u64;
        });
        Ok(window)
    }

    fn latest_readings(&self, sensor_id: &str, limit: usize) -> Result<Vec<Reading>, DatastoreError> {
        self.check_available()?;

        let readings = self.readings.read().unwrap_or_else(PoisonError::into_inner);
        let latest: Vec<Reading> = readings
            .iter()
            .rev()
            .filter(|r| r.sensor_id == sensor_id)
            .take(limit)
            .cloned()
            .collect();

        self.record(|s| {
            s.latest_queries += 1;
            s.readings_served += latest.len() as u64;
        });
        Ok(latest)
    }
}

/// Artifact store backed by a map of blobs
pub struct MemoryArtifactStore {
    blobs: RwLock<BTreeMap<String, Vec<u8>>>,
    read_only: AtomicBool,
}

impl MemoryArtifactStore {
    /// Empty, writable store
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(BTreeMap::new()),
            read_only: AtomicBool::new(false),
        }
    }

    /// Number of stored blobs
    pub fn len(&self) -> usize {
        self.blobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored keys in order
    pub fn keys(&self) -> Vec<String> {
        self.blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Copy of a stored blob
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Drop a blob, returning it if present
    pub fn remove(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    /// Reject every subsequent write with a permission error
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }
}

impl Default for MemoryArtifactStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn exists(&self, key: &str) -> Result<bool, ArtifactStoreError> {
        Ok(self
            .blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key))
    }

    fn write(&self, key: &str, data: &[u8]) -> Result<(), ArtifactStoreError> {
        if key.is_empty() {
            return Err(ArtifactStoreError::InvalidKey(key.to_string()));
        }
        if self.read_only.load(Ordering::SeqCst) {
            return Err(ArtifactStoreError::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "memory artifact store is read-only",
            )));
        }
        self.blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Vec<u8>, ArtifactStoreError> {
        self.get(key)
            .ok_or_else(|| ArtifactStoreError::NotFound(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use envguard_core::Quantity;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
    }

    fn reading(hour: u32, sensor: &str) -> Reading {
        Reading::new(at(hour), sensor, "air").with_value(Quantity::Pm25, hour as f64)
    }

    #[test]
    fn test_range_is_inclusive_and_ordered() {
        let store = MemoryDatastore::with_readings(vec![
            reading(5, "A"),
            reading(1, "A"),
            reading(3, "B"),
            reading(8, "A"),
        ]);

        let window = store.readings_between(at(1), at(5)).unwrap();
        let hours: Vec<f64> = window.iter().filter_map(|r| r.value(Quantity::Pm25)).collect();
        assert_eq!(hours, vec![1.0, 3.0, 5.0]);

        assert!(store
            .readings_between(at(9), at(9) + Duration::hours(1))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_latest_newest_first() {
        let store = MemoryDatastore::new();
        for h in [2, 7, 4, 9] {
            store.push(reading(h, "A"));
        }
        store.push(reading(10, "B"));

        let latest = store.latest_readings("A", 3).unwrap();
        let hours: Vec<f64> = latest.iter().filter_map(|r| r.value(Quantity::Pm25)).collect();
        assert_eq!(hours, vec![9.0, 7.0, 4.0]);

        assert!(store.latest_readings("C", 3).unwrap().is_empty());
        assert!(store.latest_readings("A", 0).unwrap().is_empty());
    }

    #[test]
    fn test_unavailable() {
        let store = MemoryDatastore::with_readings(vec![reading(1, "A")]);
        store.set_available(false);

        assert!(matches!(
            store.readings_between(at(0), at(2)),
            Err(DatastoreError::Unavailable(_))
        ));
        assert!(store.latest_readings("A", 1).is_err());

        store.set_available(true);
        assert_eq!(store.latest_readings("A", 1).unwrap().len(), 1);

        let stats = store.stats();
        assert_eq!(stats.failures, 2);
        assert_eq!(stats.range_queries, 0);
        assert_eq!(stats.latest_queries, 1);
        assert_eq!(stats.readings_served, 1);
    }

    #[test]
    fn test_artifact_roundtrip() {
        let store = MemoryArtifactStore::new();
        assert!(!store.exists("ph_model").unwrap());
        assert!(matches!(
            store.read("ph_model"),
            Err(ArtifactStoreError::NotFound(_))
        ));

        store.write("ph_model", b"one").unwrap();
        store.write("ph_model", b"two").unwrap();
        assert_eq!(store.read("ph_model").unwrap(), b"two".to_vec());
        assert_eq!(store.keys(), vec!["ph_model".to_string()]);

        assert_eq!(store.remove("ph_model"), Some(b"two".to_vec()));
        assert!(store.is_empty());
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let store = MemoryArtifactStore::new();
        store.write("co2_scaler", b"x").unwrap();
        store.set_read_only(true);

        match store.write("co2_scaler", b"y") {
            Err(ArtifactStoreError::Io(err)) => {
                assert_eq!(err.kind(), io::ErrorKind::PermissionDenied)
            }
            other => panic!("expected permission error, got {:?}", other),
        }
        // Reads keep working
        assert_eq!(store.read("co2_scaler").unwrap(), b"x".to_vec());
    }
}
