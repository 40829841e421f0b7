//! Monitored parameters and auxiliary covariates
//!
//! A [`Parameter`] is a quantity with its own model triple. A [`Quantity`] is
//! any column that can appear in a reading: every parameter plus the
//! environmental covariates (temperature, humidity) that are only ever used
//! as inputs.
//!
//! Declaration order is the canonical column order for feature vectors and
//! must not change, or persisted layouts stop matching.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::quality::*;

/// Monitored quantity with a model triple of its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Parameter {
    /// Fine particulate matter (µg/m³)
    #[serde(rename = "pm25")]
    Pm25,
    /// Coarse particulate matter (µg/m³)
    #[serde(rename = "pm10")]
    Pm10,
    /// Carbon dioxide (ppm)
    #[serde(rename = "co2")]
    Co2,
    /// Nitrogen dioxide (µg/m³)
    #[serde(rename = "no2")]
    No2,
    /// Acidity
    #[serde(rename = "ph")]
    Ph,
    /// Turbidity (NTU)
    #[serde(rename = "turbidity")]
    Turbidity,
    /// Dissolved oxygen (mg/L)
    #[serde(rename = "dissolvedOxygen")]
    DissolvedOxygen,
}

impl Parameter {
    /// Number of parameters
    pub const COUNT: usize = 7;

    /// Every parameter, in canonical order
    pub const ALL: [Parameter; Self::COUNT] = [
        Parameter::Pm25,
        Parameter::Pm10,
        Parameter::Co2,
        Parameter::No2,
        Parameter::Ph,
        Parameter::Turbidity,
        Parameter::DissolvedOxygen,
    ];

    /// Wire name used in readings and artifact keys
    pub fn name(self) -> &'static str {
        self.as_quantity().name()
    }

    /// Position in [`Parameter::ALL`]
    pub fn index(self) -> usize {
        self as usize
    }

    /// The reading column holding this parameter
    pub fn as_quantity(self) -> Quantity {
        match self {
            Parameter::Pm25 => Quantity::Pm25,
            Parameter::Pm10 => Quantity::Pm10,
            Parameter::Co2 => Quantity::Co2,
            Parameter::No2 => Quantity::No2,
            Parameter::Ph => Quantity::Ph,
            Parameter::Turbidity => Quantity::Turbidity,
            Parameter::DissolvedOxygen => Quantity::DissolvedOxygen,
        }
    }

    /// Classify a value of this parameter against its status thresholds
    pub fn classify(self, value: f64) -> StatusLevel {
        let (warning, danger) = match self {
            Parameter::Pm25 => (value >= PM25_WARNING_UG_M3, value >= PM25_DANGER_UG_M3),
            Parameter::Pm10 => (value >= PM10_WARNING_UG_M3, value >= PM10_DANGER_UG_M3),
            Parameter::Co2 => (value >= CO2_WARNING_PPM, value >= CO2_DANGER_PPM),
            Parameter::No2 => (value >= NO2_WARNING_UG_M3, value >= NO2_DANGER_UG_M3),
            Parameter::Ph => (
                value <= PH_WARNING_MIN || value >= PH_WARNING_MAX,
                value <= PH_DANGER_MIN || value >= PH_DANGER_MAX,
            ),
            Parameter::Turbidity => {
                (value >= TURBIDITY_WARNING_NTU, value >= TURBIDITY_DANGER_NTU)
            }
            Parameter::DissolvedOxygen => (
                value <= DISSOLVED_OXYGEN_WARNING_MG_L,
                value <= DISSOLVED_OXYGEN_DANGER_MG_L,
            ),
        };

        if danger {
            StatusLevel::Danger
        } else if warning {
            StatusLevel::Warning
        } else {
            StatusLevel::Safe
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Parameter {
    type Err = UnknownQuantity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<Quantity>()?
            .as_parameter()
            .ok_or_else(|| UnknownQuantity(s.to_string()))
    }
}

/// Any column that can appear in a reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Quantity {
    /// Fine particulate matter (µg/m³)
    #[serde(rename = "pm25")]
    Pm25,
    /// Coarse particulate matter (µg/m³)
    #[serde(rename = "pm10")]
    Pm10,
    /// Carbon dioxide (ppm)
    #[serde(rename = "co2")]
    Co2,
    /// Nitrogen dioxide (µg/m³)
    #[serde(rename = "no2")]
    No2,
    /// Acidity
    #[serde(rename = "ph")]
    Ph,
    /// Turbidity (NTU)
    #[serde(rename = "turbidity")]
    Turbidity,
    /// Dissolved oxygen (mg/L)
    #[serde(rename = "dissolvedOxygen")]
    DissolvedOxygen,
    /// Ambient temperature (°C)
    #[serde(rename = "temperature")]
    Temperature,
    /// Relative humidity (%)
    #[serde(rename = "humidity")]
    Humidity,
}

impl Quantity {
    /// Number of quantities
    pub const COUNT: usize = 9;

    /// Every quantity, in canonical column order
    pub const ALL: [Quantity; Quantity::COUNT] = [
        Quantity::Pm25,
        Quantity::Pm10,
        Quantity::Co2,
        Quantity::No2,
        Quantity::Ph,
        Quantity::Turbidity,
        Quantity::DissolvedOxygen,
        Quantity::Temperature,
        Quantity::Humidity,
    ];

    /// Wire name used in readings
    pub fn name(self) -> &'static str {
        match self {
            Quantity::Pm25 => "pm25",
            Quantity::Pm10 => "pm10",
            Quantity::Co2 => "co2",
            Quantity::No2 => "no2",
            Quantity::Ph => "ph",
            Quantity::Turbidity => "turbidity",
            Quantity::DissolvedOxygen => "dissolvedOxygen",
            Quantity::Temperature => "temperature",
            Quantity::Humidity => "humidity",
        }
    }

    /// Position in the canonical column order
    pub fn index(self) -> usize {
        self as usize
    }

    /// The parameter this column holds, if it is one
    pub fn as_parameter(self) -> Option<Parameter> {
        match self {
            Quantity::Pm25 => Some(Parameter::Pm25),
            Quantity::Pm10 => Some(Parameter::Pm10),
            Quantity::Co2 => Some(Parameter::Co2),
            Quantity::No2 => Some(Parameter::No2),
            Quantity::Ph => Some(Parameter::Ph),
            Quantity::Turbidity => Some(Parameter::Turbidity),
            Quantity::DissolvedOxygen => Some(Parameter::DissolvedOxygen),
            Quantity::Temperature | Quantity::Humidity => None,
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Quantity {
    type Err = UnknownQuantity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Quantity::ALL
            .iter()
            .copied()
            .find(|q| q.name() == s)
            .ok_or_else(|| UnknownQuantity(s.to_string()))
    }
}

/// Name that matches no known quantity
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown quantity: {0}")]
pub struct UnknownQuantity(pub String);

/// Status classification of a parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLevel {
    /// Within normal limits
    Safe,
    /// Outside the comfortable band
    Warning,
    /// Hazardous
    Danger,
}
