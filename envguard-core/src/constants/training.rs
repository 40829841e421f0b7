//! Training Defaults and Model Hyperparameters
//!
//! Values shared between the training orchestrator and the models it fits.
//! Seeds are fixed so that two cycles over the same window produce the same
//! models.

// ===== DATA REQUIREMENTS =====

/// Minimum rows with a non-null target before a parameter is trained.
///
/// Below this an 80/20 split leaves a test set of one or two rows, which
/// makes the reported R² meaningless.
pub const MIN_TRAINING_ROWS: usize = 10;

/// Fraction of usable rows held out for evaluation.
pub const DEFAULT_TEST_FRACTION: f64 = 0.2;

/// Seed for the train/test shuffle.
pub const DEFAULT_SPLIT_SEED: u64 = 42;

/// Number of recent readings fetched for a forecast.
pub const DEFAULT_RECENT_READINGS_LIMIT: usize = 10;

// ===== REGRESSOR =====

/// Trees in the random forest regressor.
pub const REGRESSOR_NUM_TREES: usize = 100;

/// Maximum depth of each regression tree.
pub const REGRESSOR_MAX_DEPTH: usize = 10;

/// Minimum samples in a node before it may be split.
pub const REGRESSOR_MIN_SAMPLES_SPLIT: usize = 2;

/// Seed for bootstrap sampling.
pub const REGRESSOR_SEED: u64 = 42;

// ===== ANOMALY DETECTOR =====

/// Trees in the isolation forest.
pub const DETECTOR_NUM_TREES: usize = 100;

/// Subsample size drawn for each isolation tree.
pub const DETECTOR_SAMPLE_SIZE: usize = 256;

/// Expected share of outliers in the training data.
///
/// Sets the decision offset: this fraction of training samples scores
/// below zero.
pub const DETECTOR_CONTAMINATION: f64 = 0.1;

/// Seed for isolation tree construction.
pub const DETECTOR_SEED: u64 = 42;
