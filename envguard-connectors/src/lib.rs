//! Collaborator Backends for the EnvGuard Model Lifecycle
//!
//! ## Overview
//!
//! The lifecycle in `envguard-ml` talks to the outside world through two
//! traits from `envguard-core`: [`Datastore`](envguard_core::Datastore) for
//! sensor readings and [`ArtifactStore`](envguard_core::ArtifactStore) for
//! serialized models. This crate provides the backends.
//!
//! ## Backend Selection Guide
//!
//! ### In-memory
//!
//! **When to use:**
//! - Unit and integration tests
//! - Simulations that replay a fixed data set
//!
//! **Characteristics:**
//! - Availability can be toggled to exercise upstream failures
//! - The artifact store can be made read-only to exercise persist failures
//! - Query counters for asserting how often the lifecycle hit the store
//!
//! ### Files
//!
//! **When to use:**
//! - Single-node deployments
//! - Replaying exported readings from disk
//!
//! **Characteristics:**
//! - Readings as JSON lines, one record per line
//! - One `{key}.json` file per artifact, replaced through a rename so a
//!   reader never sees a half-written blob
//!
//! ```text
//! models/
//! ├── ph_model.json
//! ├── ph_scaler.json
//! ├── ph_anomaly.json
//! └── ...
//! ```
//!
//! ## Example Usage
//!
//! ```rust
//! use envguard_connectors::{MemoryArtifactStore, MemoryDatastore};
//! use envguard_core::{ArtifactStore, Datastore};
//!
//! let datastore = MemoryDatastore::new();
//! assert!(datastore.latest_readings("AIR_001", 10)?.is_empty());
//!
//! let artifacts = MemoryArtifactStore::new();
//! artifacts.write("pm25_model", b"{}")?;
//! assert!(artifacts.exists("pm25_model")?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(unsafe_code)]

pub mod file;
pub mod memory;

pub use file::{FileArtifactStore, JsonlDatastore};
pub use memory::{MemoryArtifactStore, MemoryDatastore};

use serde::Serialize;

/// Query statistics common to all datastores
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectorStats {
    /// Time-window queries answered
    pub range_queries: u64,
    /// Latest-readings queries answered
    pub latest_queries: u64,
    /// Queries that returned an error
    pub failures: u64,
    /// Readings returned across all queries
    pub readings_served: u64,
}
