//! Time management for the model lifecycle
//!
//! Provides a clock abstraction so that training windows, forecast horizons
//! and calendar features can be driven from a fixed instant in tests:
//! - System clock for production
//! - Fixed clock for deterministic tests

use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};

/// Source of time for the system
pub trait TimeSource: Send + Sync {
    /// Current instant
    fn now(&self) -> DateTime<Utc>;

    /// Check if this source follows the wall clock
    fn is_wall_clock(&self) -> bool;
}

/// System time source
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTime;

impl TimeSource for SystemTime {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn is_wall_clock(&self) -> bool {
        true
    }
}

/// Fixed time source for testing
///
/// Returns the same instant until advanced.
#[derive(Debug)]
pub struct FixedTime {
    current: RwLock<DateTime<Utc>>,
}

impl FixedTime {
    /// Create a clock frozen at `at`
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            current: RwLock::new(at),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current += by;
    }

    /// Jump to an instant
    pub fn set(&self, at: DateTime<Utc>) {
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = at;
    }
}

impl TimeSource for FixedTime {
    fn now(&self) -> DateTime<Utc> {
        *self.current.read().unwrap_or_else(|e| e.into_inner())
    }

    fn is_wall_clock(&self) -> bool {
        false
    }
}
