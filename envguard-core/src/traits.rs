//! Collaborator traits for the model lifecycle
//!
//! These traits define the only two things the lifecycle needs from the
//! outside world: a source of readings and a place to keep model artifacts.
//! Both are synchronous; calls are bounded by the size of the query.

use chrono::{DateTime, Utc};

use crate::errors::{ArtifactStoreError, DatastoreError};
use crate::reading::Reading;

/// Time-series datastore holding sensor readings
pub trait Datastore: Send + Sync {
    /// All readings with `start <= timestamp <= end`, oldest first
    fn readings_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Reading>, DatastoreError>;

    /// Up to `limit` most recent readings for a sensor, newest first
    fn latest_readings(&self, sensor_id: &str, limit: usize) -> Result<Vec<Reading>, DatastoreError>;
}

/// Key-value blob store for serialized model artifacts
///
/// Keys look like `"{parameter}_model"`, `"{parameter}_scaler"` and
/// `"{parameter}_anomaly"`.
pub trait ArtifactStore: Send + Sync {
    /// Whether a blob is stored under `key`
    fn exists(&self, key: &str) -> Result<bool, ArtifactStoreError>;

    /// Store a blob, replacing any previous one
    fn write(&self, key: &str, data: &[u8]) -> Result<(), ArtifactStoreError>;

    /// Fetch a blob
    fn read(&self, key: &str) -> Result<Vec<u8>, ArtifactStoreError>;
}
