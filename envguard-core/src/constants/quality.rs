//! Status Thresholds for Monitored Parameters
//!
//! Breakpoints used to classify a parameter value as safe, warning or danger.
//! Air quality limits follow common ambient guidelines; water limits follow
//! drinking and surface water practice.

// ===== AIR QUALITY =====

/// PM2.5 warning level (µg/m³).
pub const PM25_WARNING_UG_M3: f64 = 35.0;

/// PM2.5 danger level (µg/m³).
pub const PM25_DANGER_UG_M3: f64 = 75.0;

/// PM10 warning level (µg/m³).
pub const PM10_WARNING_UG_M3: f64 = 50.0;

/// PM10 danger level (µg/m³).
pub const PM10_DANGER_UG_M3: f64 = 150.0;

/// CO2 warning level (ppm).
///
/// Indoor air above 1000 ppm is associated with drowsiness and
/// reduced ventilation.
pub const CO2_WARNING_PPM: f64 = 1000.0;

/// CO2 danger level (ppm), the 8-hour occupational exposure limit.
pub const CO2_DANGER_PPM: f64 = 5000.0;

/// NO2 warning level (µg/m³).
pub const NO2_WARNING_UG_M3: f64 = 100.0;

/// NO2 danger level (µg/m³), the one-hour guideline.
pub const NO2_DANGER_UG_M3: f64 = 200.0;

// ===== WATER QUALITY =====

/// Lower bound of the acceptable pH band.
pub const PH_WARNING_MIN: f64 = 6.5;

/// Upper bound of the acceptable pH band.
pub const PH_WARNING_MAX: f64 = 8.5;

/// pH at or below which water is classified as dangerous.
pub const PH_DANGER_MIN: f64 = 6.0;

/// pH at or above which water is classified as dangerous.
pub const PH_DANGER_MAX: f64 = 9.0;

/// Turbidity warning level (NTU).
pub const TURBIDITY_WARNING_NTU: f64 = 4.0;

/// Turbidity danger level (NTU).
pub const TURBIDITY_DANGER_NTU: f64 = 10.0;

/// Dissolved oxygen warning level (mg/L). Lower is worse.
pub const DISSOLVED_OXYGEN_WARNING_MG_L: f64 = 5.0;

/// Dissolved oxygen danger level (mg/L). Aquatic life is stressed below it.
pub const DISSOLVED_OXYGEN_DANGER_MG_L: f64 = 3.0;
