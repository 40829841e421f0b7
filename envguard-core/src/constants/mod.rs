//! Constants for EnvGuard Core
//!
//! Centralized constants used across the model lifecycle. Numeric values are
//! defined here once, with their units in the name where one applies.
//!
//! ## Organization
//!
//! - **Quality**: Status thresholds for air and water quality parameters
//! - **Time**: Unit conversions, training window and retraining cadence
//! - **Training**: Sample minimums, split ratios and model hyperparameters
//!
//! ## Usage Guidelines
//!
//! 1. Always use these constants instead of magic numbers
//! 2. Reference the regulatory or operational source where one exists
//! 3. Use descriptive names that include units

/// Status thresholds for monitored parameters.
pub mod quality;

/// Time-related constants for windows and scheduling.
pub mod time;

/// Training defaults and model hyperparameters.
pub mod training;

// Re-export commonly used constants for convenience
pub use time::{
    DEFAULT_LOOKBACK_DAYS, DEFAULT_RETRAIN_INTERVAL_SECS, MAX_LOOKBACK_DAYS, SECONDS_PER_HOUR,
};

pub use training::{
    MIN_TRAINING_ROWS, DEFAULT_TEST_FRACTION, DEFAULT_SPLIT_SEED,
    DEFAULT_RECENT_READINGS_LIMIT,
};
