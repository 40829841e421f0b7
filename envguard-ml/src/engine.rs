//! Prediction and anomaly engine
//!
//! Serves forecasts and real-time anomaly checks from whatever triples the
//! registry holds at call time. Each parameter takes its own snapshot of the
//! registry, so a cycle publishing in the background never mixes models
//! within one parameter's answer. Errors for one parameter drop only that
//! parameter from the response.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use envguard_core::{realtime_vector, Datastore, Parameter, Reading, StatusLevel, TimeSource};
use serde::Serialize;

use crate::{LifecycleConfig, LifecycleError, MLResult, ModelRegistry};

/// Forecast for one parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterForecast {
    /// Regressor output at the prediction time
    pub predicted_value: f64,
    /// Value in the sensor's latest reading
    pub current_value: f64,
    /// `predicted_value - current_value`
    pub change: f64,
    /// Detector decision value; negative is anomalous
    pub anomaly_score: f64,
    /// Whether the detector flags the predicted value at the prediction time
    pub is_anomaly: bool,
    /// Time the forecast refers to
    pub prediction_time: DateTime<Utc>,
    /// Status band of the predicted value
    pub predicted_status: StatusLevel,
}

/// Result of [`PredictionEngine::forecast`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastReport {
    /// Sensor the forecast is for
    pub sensor_id: String,
    /// Per-parameter forecasts; empty when the sensor has no readings
    pub predictions: BTreeMap<Parameter, ParameterForecast>,
}

impl ForecastReport {
    /// Whether no parameter could be forecast
    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }
}

/// Anomaly verdict for one submitted value
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnomalyFinding {
    /// Whether the value is flagged
    pub is_anomaly: bool,
    /// Detector decision value; negative is anomalous
    pub anomaly_score: f64,
    /// Submitted value
    pub value: f64,
}

/// Result of [`PredictionEngine::anomaly_check`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyReport {
    /// Instant the calendar fields were taken from
    pub checked_at: DateTime<Utc>,
    /// Per-parameter findings
    pub findings: BTreeMap<Parameter, AnomalyFinding>,
}

/// Serves forecasts and anomaly checks
pub struct PredictionEngine {
    datastore: Arc<dyn Datastore>,
    registry: Arc<ModelRegistry>,
    clock: Arc<dyn TimeSource>,
    recent_limit: usize,
}

impl PredictionEngine {
    /// Wire up an engine
    pub fn new(
        datastore: Arc<dyn Datastore>,
        registry: Arc<ModelRegistry>,
        clock: Arc<dyn TimeSource>,
        config: &LifecycleConfig,
    ) -> Self {
        Self {
            datastore,
            registry,
            clock,
            recent_limit: config.recent_readings_limit,
        }
    }

    /// Forecast every parameter in a sensor's latest reading `hours_ahead`
    /// hours from now
    ///
    /// Calendar features come from the future instant; covariates are the
    /// latest reading's current values.
    pub fn forecast(&self, sensor_id: &str, hours_ahead: i64) -> Result<ForecastReport, LifecycleError> {
        let recent = self.datastore.latest_readings(sensor_id, self.recent_limit)?;

        let mut report = ForecastReport {
            sensor_id: sensor_id.to_string(),
            predictions: BTreeMap::new(),
        };
        let Some(latest) = recent.first() else {
            log::debug!("No readings for sensor {}", sensor_id);
            return Ok(report);
        };

        let prediction_time = Duration::try_hours(hours_ahead)
            .and_then(|ahead| self.clock.now().checked_add_signed(ahead))
            .ok_or(LifecycleError::InvalidHorizon(hours_ahead))?;

        for parameter in Parameter::ALL {
            let Some(current_value) = latest.value(parameter.as_quantity()) else {
                continue;
            };
            match self.forecast_parameter(parameter, latest, current_value, prediction_time) {
                Ok(Some(forecast)) => {
                    report.predictions.insert(parameter, forecast);
                }
                Ok(None) => log::debug!("No trained model for {}, omitted", parameter),
                Err(err) => log::error!("Forecast failed for {} on {}: {}", parameter, sensor_id, err),
            }
        }

        Ok(report)
    }

    fn forecast_parameter(
        &self,
        parameter: Parameter,
        latest: &Reading,
        current_value: f64,
        prediction_time: DateTime<Utc>,
    ) -> MLResult<Option<ParameterForecast>> {
        let triple = self.registry.get(parameter);
        if !triple.is_trained() {
            return Ok(None);
        }

        let vector = triple.layout().vector_for(parameter, latest, prediction_time)?;
        let prediction = triple.predict(&vector)?;

        Ok(Some(ParameterForecast {
            predicted_value: prediction.value,
            current_value,
            change: prediction.value - current_value,
            anomaly_score: prediction.anomaly.decision,
            is_anomaly: prediction.anomaly.is_anomaly(),
            prediction_time,
            predicted_status: parameter.classify(prediction.value),
        }))
    }

    /// Score submitted values against each parameter's detector
    ///
    /// Keys that are not parameters, null values and untrained parameters
    /// are skipped.
    pub fn anomaly_check(&self, values: &BTreeMap<String, Option<f64>>) -> AnomalyReport {
        let checked_at = self.clock.now();
        let mut findings = BTreeMap::new();

        for (key, value) in values {
            let (Ok(parameter), Some(value)) = (key.parse::<Parameter>(), *value) else {
                continue;
            };

            let triple = self.registry.get(parameter);
            if !triple.is_trained() {
                continue;
            }

            match triple.score_realtime(&realtime_vector(value, checked_at)) {
                Ok(score) => {
                    findings.insert(
                        parameter,
                        AnomalyFinding {
                            is_anomaly: score.is_anomaly(),
                            anomaly_score: score.decision,
                            value,
                        },
                    );
                }
                Err(err) => log::error!("Anomaly check failed for {}: {}", parameter, err),
            }
        }

        AnomalyReport {
            checked_at,
            findings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ModelStore, TrainingOrchestrator};
    use chrono::TimeZone;
    use envguard_connectors::{MemoryArtifactStore, MemoryDatastore};
    use envguard_core::{FixedTime, Quantity};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn air(hours_ago: i64, pm25: f64) -> Reading {
        Reading::new(now() - Duration::hours(hours_ago), "AIR_001", "air")
            .with_value(Quantity::Pm25, pm25)
            .with_value(Quantity::Co2, 420.0 + (hours_ago % 5) as f64 * 10.0)
            .with_value(Quantity::Temperature, 20.0 + (hours_ago % 3) as f64)
    }

    fn trained_engine() -> (Arc<MemoryDatastore>, PredictionEngine) {
        let readings: Vec<Reading> = (0..30).map(|h| air(h, 10.0 + (h % 8) as f64)).collect();
        let datastore = Arc::new(MemoryDatastore::with_readings(readings));
        let registry = Arc::new(ModelRegistry::new());
        let clock = Arc::new(FixedTime::new(now()));

        let mut config = LifecycleConfig::default();
        config.regressor.num_trees = 8;
        config.detector.num_trees = 16;

        let trainer = TrainingOrchestrator::new(
            datastore.clone(),
            registry.clone(),
            ModelStore::new(Arc::new(MemoryArtifactStore::new())),
            clock.clone(),
            config.clone(),
        );
        trainer.run_training_cycle().unwrap();

        let engine = PredictionEngine::new(datastore.clone(), registry, clock, &config);
        (datastore, engine)
    }

    #[test]
    fn test_forecast_trained_parameters() {
        let (_, engine) = trained_engine();
        let report = engine.forecast("AIR_001", 2).unwrap();

        let keys: Vec<Parameter> = report.predictions.keys().copied().collect();
        assert_eq!(keys, vec![Parameter::Pm25, Parameter::Co2]);

        let pm25 = &report.predictions[&Parameter::Pm25];
        // Latest reading is the one taken at `now`
        assert_eq!(pm25.current_value, 10.0);
        assert_eq!(pm25.change, pm25.predicted_value - pm25.current_value);
        assert_eq!(pm25.prediction_time, now() + Duration::hours(2));
        assert_eq!(pm25.predicted_status, StatusLevel::Safe);

        // Judged as if the predicted value were read at the prediction time
        let expected = engine
            .registry
            .get(Parameter::Pm25)
            .score_realtime(&realtime_vector(pm25.predicted_value, pm25.prediction_time))
            .unwrap();
        assert_eq!(pm25.anomaly_score, expected.decision);
        assert_eq!(pm25.is_anomaly, expected.is_anomaly());
    }

    #[test]
    fn test_forecast_unknown_sensor_is_empty() {
        let (_, engine) = trained_engine();
        let report = engine.forecast("NOPE", 1).unwrap();
        assert!(report.is_empty());
        assert_eq!(report.sensor_id, "NOPE");
    }

    #[test]
    fn test_forecast_upstream_failure() {
        let (datastore, engine) = trained_engine();
        datastore.set_available(false);
        assert!(matches!(
            engine.forecast("AIR_001", 1),
            Err(LifecycleError::Upstream(_))
        ));
    }

    #[test]
    fn test_forecast_rejects_unrepresentable_horizon() {
        let (_, engine) = trained_engine();
        assert!(matches!(
            engine.forecast("AIR_001", i64::MAX),
            Err(LifecycleError::InvalidHorizon(i64::MAX))
        ));
    }

    #[test]
    fn test_anomaly_check_skips_untrained_and_unknown() {
        let (_, engine) = trained_engine();
        let values: BTreeMap<String, Option<f64>> = [
            ("pm25".to_string(), Some(12.0)),
            ("ph".to_string(), Some(7.0)),
            ("co2".to_string(), None),
            ("temperature".to_string(), Some(21.0)),
            ("bogus".to_string(), Some(1.0)),
        ]
        .into_iter()
        .collect();

        let report = engine.anomaly_check(&values);

        assert_eq!(report.checked_at, now());
        assert_eq!(report.findings.len(), 1);
        let pm25 = report.findings[&Parameter::Pm25];
        assert_eq!(pm25.value, 12.0);

        let expected = engine
            .registry
            .get(Parameter::Pm25)
            .score_realtime(&realtime_vector(12.0, now()))
            .unwrap();
        assert_eq!(pm25.anomaly_score, expected.decision);
        assert_eq!(pm25.is_anomaly, expected.is_anomaly());
    }

    #[test]
    fn test_untrained_registry_answers_nothing() {
        let datastore = Arc::new(MemoryDatastore::with_readings(vec![air(0, 10.0)]));
        let engine = PredictionEngine::new(
            datastore,
            Arc::new(ModelRegistry::new()),
            Arc::new(FixedTime::new(now())),
            &LifecycleConfig::default(),
        );

        assert!(engine.forecast("AIR_001", 1).unwrap().is_empty());
        let values = [("pm25".to_string(), Some(10.0))].into_iter().collect();
        assert!(engine.anomaly_check(&values).findings.is_empty());
    }
}
