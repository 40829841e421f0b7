//! Error Types for Feature Construction and External Collaborators
//!
//! ## Design Philosophy
//!
//! Failures in the model lifecycle are contained at the smallest unit that
//! produced them. The error types here are therefore narrow: each describes
//! one thing that went wrong for one parameter or one collaborator call, and
//! callers decide whether that aborts a whole operation or just one entry.
//!
//! ## Error Categories
//!
//! ### Feature Construction
//! - `FeatureError::NonFinite`: a NaN or infinite value reached a feature column
//! - `FeatureError::LayoutMismatch`: a vector was requested for the wrong target
//!
//! ### External Collaborators
//! - `DatastoreError`: the time-series datastore could not answer a query
//! - `ArtifactStoreError`: a model artifact could not be read or written
//!
//! ## Error Handling Strategy
//!
//! ```rust
//! use envguard_core::{DatastoreError, FeatureError};
//!
//! fn describe(err: &FeatureError) -> &'static str {
//!     match err {
//!         FeatureError::NonFinite { .. } => "degenerate input, skip this parameter",
//!         FeatureError::LayoutMismatch { .. } => "caller bug, wrong layout",
//!     }
//! }
//!
//! fn is_fatal(err: &DatastoreError) -> bool {
//!     // No data to fall back on: the whole operation fails
//!     matches!(err, DatastoreError::Unavailable(_))
//! }
//! ```

use thiserror::Error;

use crate::parameter::{Parameter, Quantity};

/// Result type for feature construction
pub type FeatureResult<T> = Result<T, FeatureError>;

/// Feature construction errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeatureError {
    /// A target or covariate value is NaN or infinite
    #[error("Non-finite value for {quantity} in row {row}")]
    NonFinite {
        /// Column holding the value
        quantity: Quantity,
        /// Row index within the training table
        row: usize,
    },

    /// A layout fitted for one target was asked to build another target's vector
    #[error("Layout for {expected} cannot build features for {actual}")]
    LayoutMismatch {
        /// Target the layout was fitted for
        expected: Parameter,
        /// Target requested by the caller
        actual: Parameter,
    },
}

/// Datastore collaborator errors
#[derive(Error, Debug)]
pub enum DatastoreError {
    /// Datastore unreachable or refused the query
    #[error("Datastore unavailable: {0}")]
    Unavailable(String),

    /// A stored record could not be decoded into a reading
    #[error("Malformed reading: {0}")]
    Decode(String),

    /// Underlying I/O failure
    #[error("Datastore I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Artifact store collaborator errors
#[derive(Error, Debug)]
pub enum ArtifactStoreError {
    /// No artifact stored under the key
    #[error("Artifact not found: {0}")]
    NotFound(String),

    /// Key cannot be used as an artifact name
    #[error("Invalid artifact key: {0}")]
    InvalidKey(String),

    /// Underlying I/O failure
    #[error("Artifact I/O error: {0}")]
    Io(#[from] std::io::Error),
}
