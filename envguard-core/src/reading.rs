//! Sensor readings as stored by the datastore
//!
//! A [`Reading`] mirrors the stored record: a timestamp, the reporting
//! sensor, and a name → optional value map. Values are `None` when the
//! sensor did not report that quantity. Keys outside [`Quantity`] are kept
//! so the record round-trips, but feature construction ignores them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::parameter::Quantity;

/// One ingested sensor record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    /// When the sensor captured the values
    pub timestamp: DateTime<Utc>,
    /// Reporting sensor
    pub sensor_id: String,
    /// Sensor family (e.g. "air", "water")
    pub sensor_type: String,
    /// Reported values by quantity name
    #[serde(default)]
    pub readings: BTreeMap<String, Option<f64>>,
}

impl Reading {
    /// Create a reading with no values
    pub fn new(
        timestamp: DateTime<Utc>,
        sensor_id: impl Into<String>,
        sensor_type: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            sensor_id: sensor_id.into(),
            sensor_type: sensor_type.into(),
            readings: BTreeMap::new(),
        }
    }

    /// Builder-style setter for a reported value
    pub fn with_value(mut self, quantity: Quantity, value: f64) -> Self {
        self.readings.insert(quantity.name().to_string(), Some(value));
        self
    }

    /// Builder-style setter for a quantity the sensor reported as null
    pub fn with_null(mut self, quantity: Quantity) -> Self {
        self.readings.insert(quantity.name().to_string(), None);
        self
    }

    /// Reported value, `None` when absent or null
    pub fn value(&self, quantity: Quantity) -> Option<f64> {
        self.readings.get(quantity.name()).copied().flatten()
    }

    /// Whether the record carries the key at all, even with a null value
    pub fn has_key(&self, quantity: Quantity) -> bool {
        self.readings.contains_key(quantity.name())
    }
}
