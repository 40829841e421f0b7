//! Error types for model fitting, persistence and the lifecycle operations

use envguard_core::{ArtifactStoreError, DatastoreError, FeatureError, Parameter};
use thiserror::Error;

/// Result type for model operations
pub type MLResult<T> = Result<T, MLError>;

/// Model fitting and scoring errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MLError {
    /// Not enough samples to fit
    #[error("Insufficient data: need {required}, have {available}")]
    InsufficientData {
        /// Minimum samples required
        required: usize,
        /// Samples provided
        available: usize,
    },

    /// Vector width does not match what the model was fitted on
    #[error("Dimension mismatch: expected {expected} features, got {actual}")]
    DimensionMismatch {
        /// Width seen at fit time
        expected: usize,
        /// Width of the offending input
        actual: usize,
    },

    /// Model has never been fitted
    #[error("Model not fitted")]
    NotFitted,

    /// Input contains NaN or infinity
    #[error("Input contains non-finite values")]
    NonFiniteInput,

    /// Invalid hyperparameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// Feature construction failed
    #[error(transparent)]
    Feature(#[from] FeatureError),
}

/// Model artifact persistence errors
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Untrained triples have nothing worth persisting
    #[error("Refusing to persist untrained triple for {0}")]
    Untrained(Parameter),

    /// One or more of the three artifacts is missing
    #[error("Incomplete artifacts for {parameter}: missing {missing:?}")]
    Incomplete {
        /// Parameter being loaded
        parameter: Parameter,
        /// Keys that do not exist
        missing: Vec<String>,
    },

    /// Artifacts exist but do not belong together
    #[error("Inconsistent artifacts for {parameter}: {reason}")]
    Inconsistent {
        /// Parameter being loaded
        parameter: Parameter,
        /// What did not match
        reason: &'static str,
    },

    /// Artifact store failure
    #[error(transparent)]
    Store(#[from] ArtifactStoreError),

    /// Artifact encoding or decoding failure
    #[error("Artifact serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file unreadable
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Config is not valid JSON for [`LifecycleConfig`](crate::LifecycleConfig)
    #[error("Config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Errors that fail a whole lifecycle operation
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// The datastore could not be queried; there is no data to fall back on
    #[error("Upstream unavailable: {0}")]
    Upstream(#[from] DatastoreError),

    /// Forecast horizon does not fit in a timestamp
    #[error("Forecast horizon of {0} hours is out of range")]
    InvalidHorizon(i64),

    /// Training window start does not fit in a timestamp
    #[error("Lookback of {0} days is out of range")]
    InvalidLookback(i64),

    /// Another training cycle holds the cycle lock
    #[error("A training cycle is already running")]
    CycleInProgress,

    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),
}
