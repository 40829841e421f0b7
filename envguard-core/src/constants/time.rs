//! Time-Related Constants
//!
//! Time intervals and windows used for training and scheduling.

// ===== TIME UNIT CONVERSIONS =====

/// Seconds per minute.
pub const SECONDS_PER_MINUTE: u64 = 60;

/// Minutes per hour.
pub const MINUTES_PER_HOUR: u64 = 60;

/// Seconds per hour.
pub const SECONDS_PER_HOUR: u64 = SECONDS_PER_MINUTE * MINUTES_PER_HOUR;

// ===== TRAINING WINDOW =====

/// Default length of the historical training window (days).
///
/// A month covers weekly cycles several times over while staying small
/// enough to refit every parameter within one retraining period.
pub const DEFAULT_LOOKBACK_DAYS: i64 = 30;

/// Longest accepted training window (days).
pub const MAX_LOOKBACK_DAYS: i64 = 3650;

// ===== SCHEDULING =====

/// Hours between scheduled retraining cycles.
pub const DEFAULT_RETRAIN_INTERVAL_HOURS: u64 = 6;

/// Seconds between scheduled retraining cycles.
pub const DEFAULT_RETRAIN_INTERVAL_SECS: u64 = DEFAULT_RETRAIN_INTERVAL_HOURS * SECONDS_PER_HOUR;
