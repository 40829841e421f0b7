//! Core data model for EnvGuard
//!
//! Handles the environmental readings that feed the model lifecycle:
//! monitored parameters, raw sensor records, and the feature construction
//! shared by training and inference.
//!
//! Key constraints:
//! - Training and inference must agree on column order for every parameter
//! - Readings are owned by the datastore; this crate only reads them
//! - Every fallible operation returns a typed error
//!
//! ```no_run
//! use envguard_core::{build_training_table, Parameter, Reading};
//!
//! let readings: Vec<Reading> = Vec::new();
//! let table = build_training_table(&readings);
//!
//! // Per-parameter design matrix with mean-imputed covariates
//! let design = table.design_for(Parameter::Ph)?;
//! assert!(design.is_empty());
//! # Ok::<(), envguard_core::FeatureError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod constants;
pub mod errors;
pub mod features;
pub mod parameter;
pub mod reading;
pub mod time;
pub mod traits;

// Public API
pub use errors::{ArtifactStoreError, DatastoreError, FeatureError, FeatureResult};
pub use features::{
    build_training_table, realtime_vector, DesignMatrix, FeatureLayout, FeatureVector,
    TrainingTable, CALENDAR_FEATURES,
};
pub use parameter::{Parameter, Quantity, StatusLevel};
pub use reading::Reading;
pub use time::{FixedTime, SystemTime, TimeSource};
pub use traits::{ArtifactStore, Datastore};

/// Crate version, reported by status queries
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
