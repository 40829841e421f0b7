//! Lifecycle configuration
//!
//! Every field has a default, so an empty JSON object is a valid config:
//!
//! ```json
//! {
//!   "lookback_days": 30,
//!   "min_training_rows": 10,
//!   "test_fraction": 0.2,
//!   "split_seed": 42,
//!   "recent_readings_limit": 10,
//!   "retrain_interval_secs": 21600,
//!   "regressor": { "num_trees": 100, "max_depth": 10 },
//!   "detector": { "num_trees": 100, "contamination": 0.1 }
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use envguard_core::constants::{
    DEFAULT_LOOKBACK_DAYS, DEFAULT_RECENT_READINGS_LIMIT, DEFAULT_RETRAIN_INTERVAL_SECS,
    DEFAULT_SPLIT_SEED, DEFAULT_TEST_FRACTION, MAX_LOOKBACK_DAYS, MIN_TRAINING_ROWS,
};
use serde::{Deserialize, Serialize};

use crate::{ConfigError, ForestConfig, MLError, RegressorConfig};

/// Tunables for training, inference and the retraining clock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Size of the training window, ending now
    pub lookback_days: i64,
    /// Parameters with fewer usable rows are skipped
    pub min_training_rows: usize,
    /// Share of rows held out for the test R²
    pub test_fraction: f64,
    /// Seed for the train/test shuffle
    pub split_seed: u64,
    /// How many recent readings a forecast fetches for its sensor
    pub recent_readings_limit: usize,
    /// Period between scheduled training cycles
    pub retrain_interval_secs: u64,
    /// Regressor hyperparameters
    pub regressor: RegressorConfig,
    /// Anomaly detector hyperparameters
    pub detector: ForestConfig,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            min_training_rows: MIN_TRAINING_ROWS,
            test_fraction: DEFAULT_TEST_FRACTION,
            split_seed: DEFAULT_SPLIT_SEED,
            recent_readings_limit: DEFAULT_RECENT_READINGS_LIMIT,
            retrain_interval_secs: DEFAULT_RETRAIN_INTERVAL_SECS,
            regressor: RegressorConfig::default(),
            detector: ForestConfig::default(),
        }
    }
}

impl LifecycleConfig {
    /// Parse and validate a JSON config
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_LOOKBACK_DAYS).contains(&self.lookback_days) {
            return Err(ConfigError::Invalid("lookback_days must be in 1..=3650"));
        }
        // The train/test split needs at least two rows
        if self.min_training_rows < 2 {
            return Err(ConfigError::Invalid("min_training_rows must be at least 2"));
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(ConfigError::Invalid("test_fraction must be in (0, 1)"));
        }
        if self.recent_readings_limit == 0 {
            return Err(ConfigError::Invalid("recent_readings_limit must be positive"));
        }
        if self.retrain_interval_secs == 0 {
            return Err(ConfigError::Invalid("retrain_interval_secs must be positive"));
        }
        self.regressor.validate().map_err(invalid)?;
        self.detector.validate().map_err(invalid)?;
        Ok(())
    }

    /// Training window length, `None` if it does not fit in a duration
    pub fn lookback(&self) -> Option<chrono::Duration> {
        chrono::Duration::try_days(self.lookback_days)
    }

    /// Retraining period
    pub fn retrain_interval(&self) -> Duration {
        Duration::from_secs(self.retrain_interval_secs)
    }
}

fn invalid(err: MLError) -> ConfigError {
    match err {
        MLError::InvalidConfig(msg) => ConfigError::Invalid(msg),
        _ => ConfigError::Invalid("invalid model hyperparameters"),
    }
}
