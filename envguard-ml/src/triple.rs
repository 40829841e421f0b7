//! Per-parameter model triple
//!
//! A triple is the unit that gets trained, published, persisted and loaded:
//! the fitted column layout, the scaler, the regressor and the anomaly
//! detector, all fitted on the same rows.
//!
//! The scaler sees every training row with the target spliced in right
//! after the calendar fields:
//!
//! ```text
//! scaler:    [hour, day_of_week, month, target, covariates...]
//! regressor: [hour, day_of_week, month,         covariates...]
//! detector:  [hour, day_of_week, month, target]
//! ```
//!
//! The detector therefore judges a value against the time it was observed
//! at, which is exactly the real-time `[hour, day_of_week, month, value]`
//! vector. Forecasts are scored the same way, with the predicted value at
//! the prediction time.

use chrono::{DateTime, Utc};
use envguard_core::{DesignMatrix, FeatureLayout, FeatureVector, Parameter, CALENDAR_FEATURES};
use serde::Serialize;

use crate::{
    r2_score, train_test_split, AnomalyScore, IsolationForest, LifecycleConfig, MLError,
    MLResult, RandomForestRegressor, StandardScaler,
};

/// Scaler column holding the target
const TARGET_COLUMN: usize = CALENDAR_FEATURES.len();

/// Width of the detector input and of the real-time vector
pub(crate) const DETECTOR_WIDTH: usize = TARGET_COLUMN + 1;

/// Fitted models for one parameter
#[derive(Debug, Clone)]
pub struct ModelTriple {
    pub(crate) layout: FeatureLayout,
    pub(crate) scaler: StandardScaler,
    pub(crate) regressor: RandomForestRegressor,
    pub(crate) detector: IsolationForest,
    pub(crate) trained_at: Option<DateTime<Utc>>,
}

/// Fit quality of a freshly trained triple
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FitMetrics {
    /// R² on the training split
    pub train_r2: f64,
    /// R² on the held-out split
    pub test_r2: f64,
    /// Rows in the training split
    pub train_rows: usize,
    /// Rows in the held-out split
    pub test_rows: usize,
}

/// Output of [`ModelTriple::predict`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// Regressor output in the parameter's units
    pub value: f64,
    /// Detector verdict on the same vector
    pub anomaly: AnomalyScore,
}

impl ModelTriple {
    /// Unfitted triple with the full default layout
    pub fn untrained(parameter: Parameter, config: &LifecycleConfig) -> Self {
        Self {
            layout: FeatureLayout::full(parameter),
            scaler: StandardScaler::new(),
            regressor: RandomForestRegressor::new(config.regressor.clone()),
            detector: IsolationForest::new(config.detector.clone()),
            trained_at: None,
        }
    }

    pub(crate) fn from_parts(
        layout: FeatureLayout,
        scaler: StandardScaler,
        regressor: RandomForestRegressor,
        detector: IsolationForest,
        trained_at: DateTime<Utc>,
    ) -> Self {
        Self {
            layout,
            scaler,
            regressor,
            detector,
            trained_at: Some(trained_at),
        }
    }

    /// Fit a new triple on one parameter's design matrix
    ///
    /// Rows are split with the configured seed; the scaler and both models
    /// see only the training split, and R² is measured on both splits.
    pub fn fit(
        design: DesignMatrix,
        config: &LifecycleConfig,
        trained_at: DateTime<Utc>,
    ) -> MLResult<(Self, FitMetrics)> {
        let available = design.len();
        if available < config.min_training_rows {
            return Err(MLError::InsufficientData {
                required: config.min_training_rows,
                available,
            });
        }

        let (layout, features, targets) = design.into_parts();
        let rows: Vec<Vec<f64>> = features
            .iter()
            .zip(&targets)
            .map(|(x, &y)| with_target(x, y))
            .collect();
        let (train_idx, test_idx) =
            train_test_split(rows.len(), config.test_fraction, config.split_seed);

        let pick_rows = |idx: &[usize]| idx.iter().map(|&i| rows[i].clone()).collect::<Vec<_>>();
        let pick_y = |idx: &[usize]| idx.iter().map(|&i| targets[i]).collect::<Vec<_>>();
        let (y_train, y_test) = (pick_y(&train_idx), pick_y(&test_idx));

        let mut scaler = StandardScaler::new();
        let train = scaler.fit_transform(&pick_rows(&train_idx))?;
        let test = scaler.transform_rows(&pick_rows(&test_idx))?;

        let x_train: Vec<Vec<f64>> = train.iter().map(|r| without_target(r)).collect();
        let x_test: Vec<Vec<f64>> = test.iter().map(|r| without_target(r)).collect();

        let mut regressor = RandomForestRegressor::new(config.regressor.clone());
        regressor.fit(&x_train, &y_train)?;

        let timed_values: Vec<Vec<f64>> = train.iter().map(|r| r[..DETECTOR_WIDTH].to_vec()).collect();
        let mut detector = IsolationForest::new(config.detector.clone());
        detector.fit(&timed_values)?;

        let metrics = FitMetrics {
            train_r2: r2_score(&y_train, &regressor.predict_rows(&x_train)?),
            test_r2: r2_score(&y_test, &regressor.predict_rows(&x_test)?),
            train_rows: x_train.len(),
            test_rows: x_test.len(),
        };

        let triple = Self::from_parts(layout, scaler, regressor, detector, trained_at);
        Ok((triple, metrics))
    }

    /// Whether all three components are fitted
    pub fn is_trained(&self) -> bool {
        self.trained_at.is_some()
            && self.scaler.is_fitted()
            && self.regressor.is_fitted()
            && self.detector.is_fitted()
    }

    /// Target parameter
    pub fn parameter(&self) -> Parameter {
        self.layout.target()
    }

    /// Fitted column layout
    pub fn layout(&self) -> &FeatureLayout {
        &self.layout
    }

    /// Training time, `None` when untrained
    pub fn trained_at(&self) -> Option<DateTime<Utc>> {
        self.trained_at
    }

    /// Scaler component
    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    /// Regressor component
    pub fn regressor(&self) -> &RandomForestRegressor {
        &self.regressor
    }

    /// Detector component
    pub fn detector(&self) -> &IsolationForest {
        &self.detector
    }

    /// Forecast and score one full-layout vector
    ///
    /// The anomaly score judges the predicted value at the vector's
    /// calendar fields.
    pub fn predict(&self, vector: &FeatureVector) -> MLResult<Prediction> {
        let features = vector.as_slice();
        let placeholder = self
            .scaler
            .mean()
            .get(TARGET_COLUMN)
            .copied()
            .ok_or(MLError::NotFitted)?;
        if features.len() != self.layout.width() {
            return Err(MLError::DimensionMismatch {
                expected: self.layout.width(),
                actual: features.len(),
            });
        }

        let scaled = self.scaler.transform(&with_target(features, placeholder))?;
        let value = self.regressor.predict(&without_target(&scaled))?;

        let mut timed_value = features[..TARGET_COLUMN].to_vec();
        timed_value.push(value);
        Ok(Prediction {
            value,
            anomaly: self.score_realtime(&FeatureVector::new(timed_value))?,
        })
    }

    /// Score a real-time `[hour, day_of_week, month, value]` vector
    pub fn score_realtime(&self, vector: &FeatureVector) -> MLResult<AnomalyScore> {
        if !self.scaler.is_fitted() {
            return Err(MLError::NotFitted);
        }
        if vector.len() != DETECTOR_WIDTH {
            return Err(MLError::DimensionMismatch {
                expected: DETECTOR_WIDTH,
                actual: vector.len(),
            });
        }
        let scaled = self.scaler.transform_prefix(vector.as_slice())?;
        self.detector.anomaly_score(&scaled)
    }
}

/// Splice the target into a feature row after the calendar fields
fn with_target(features: &[f64], target: f64) -> Vec<f64> {
    let (calendar, covariates) = features.split_at(TARGET_COLUMN.min(features.len()));
    let mut row = Vec::with_capacity(features.len() + 1);
    row.extend_from_slice(calendar);
    row.push(target);
    row.extend_from_slice(covariates);
    row
}

/// Inverse of [`with_target`]
fn without_target(row: &[f64]) -> Vec<f64> {
    row.iter()
        .enumerate()
        .filter(|&(i, _)| i != TARGET_COLUMN)
        .map(|(_, v)| *v)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use envguard_core::{build_training_table, Quantity, Reading};

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap()
    }

    fn fast_config() -> LifecycleConfig {
        let mut config = LifecycleConfig::default();
        config.regressor.num_trees = 10;
        config.detector.num_trees = 25;
        config
    }

    fn water_readings(n: u32) -> Vec<Reading> {
        (0..n)
            .map(|i| {
                let ts = at(1 + i / 24, i % 24);
                Reading::new(ts, "WATER_001", "water")
                    .with_value(Quantity::Ph, 7.0 + (i % 5) as f64 * 0.1)
                    .with_value(Quantity::Turbidity, 1.0 + (i % 3) as f64)
                    .with_value(Quantity::Temperature, 15.0 + (i % 4) as f64)
            })
            .collect()
    }

    #[test]
    fn test_untrained_triple() {
        let triple = ModelTriple::untrained(Parameter::Ph, &fast_config());
        assert!(!triple.is_trained());
        assert_eq!(triple.trained_at(), None);
        assert_eq!(triple.layout().covariates().len(), 8);

        let vector = FeatureVector::new(vec![0.0; 11]);
        assert_eq!(triple.predict(&vector), Err(MLError::NotFitted));
        assert_eq!(triple.score_realtime(&vector), Err(MLError::NotFitted));
    }

    #[test]
    fn test_fit_and_predict() {
        let table = build_training_table(&water_readings(40));
        let design = table.design_for(Parameter::Ph).unwrap();

        let (triple, metrics) = ModelTriple::fit(design, &fast_config(), at(3, 0)).unwrap();

        assert!(triple.is_trained());
        assert_eq!(triple.parameter(), Parameter::Ph);
        assert_eq!(triple.trained_at(), Some(at(3, 0)));
        assert_eq!(metrics.test_rows, 8);
        assert_eq!(metrics.train_rows, 32);
        assert!(metrics.train_r2.is_finite());
        assert!(metrics.test_r2.is_finite());

        // calendar + temperature + turbidity
        assert_eq!(triple.layout().width(), 5);
        let reading = water_readings(1).remove(0);
        let vector = triple.layout().vector_for(Parameter::Ph, &reading, at(3, 1)).unwrap();
        let prediction = triple.predict(&vector).unwrap();
        assert!((6.9..=7.5).contains(&prediction.value));
        assert!(prediction.anomaly.score > 0.0 && prediction.anomaly.score <= 1.0);

        let realtime = envguard_core::realtime_vector(7.2, at(3, 1));
        assert!(triple.score_realtime(&realtime).is_ok());
    }

    #[test]
    fn test_detector_sees_time_and_target() {
        let table = build_training_table(&water_readings(40));
        let design = table.design_for(Parameter::Ph).unwrap();
        let (triple, _) = ModelTriple::fit(design, &fast_config(), at(3, 0)).unwrap();

        // calendar + ph + turbidity + temperature
        assert_eq!(triple.scaler().width(), 6);
        assert_eq!(triple.regressor().num_features(), 5);
        assert_eq!(triple.detector().num_features(), DETECTOR_WIDTH);

        // A forecast is judged like a real-time reading of the predicted value
        let reading = water_readings(2).remove(1);
        let vector = triple.layout().vector_for(Parameter::Ph, &reading, at(4, 9)).unwrap();
        let prediction = triple.predict(&vector).unwrap();
        let realtime = envguard_core::realtime_vector(prediction.value, at(4, 9));
        assert_eq!(prediction.anomaly, triple.score_realtime(&realtime).unwrap());

        assert!(matches!(
            triple.score_realtime(&FeatureVector::new(vec![9.0, 3.0, 5.0])),
            Err(MLError::DimensionMismatch { expected: 4, actual: 3 })
        ));
    }

    #[test]
    fn test_target_splice_roundtrip() {
        let row = with_target(&[1.0, 2.0, 3.0, 10.0, 11.0], 7.5);
        assert_eq!(row, vec![1.0, 2.0, 3.0, 7.5, 10.0, 11.0]);
        assert_eq!(without_target(&row), vec![1.0, 2.0, 3.0, 10.0, 11.0]);
    }

    #[test]
    fn test_fit_insufficient_rows() {
        let table = build_training_table(&water_readings(9));
        let design = table.design_for(Parameter::Ph).unwrap();

        assert_eq!(
            ModelTriple::fit(design, &fast_config(), at(1, 0)).map(|_| ()),
            Err(MLError::InsufficientData {
                required: 10,
                available: 9
            })
        );
    }

    #[test]
    fn test_wrong_width_rejected() {
        let table = build_training_table(&water_readings(20));
        let design = table.design_for(Parameter::Ph).unwrap();
        let (triple, _) = ModelTriple::fit(design, &fast_config(), at(1, 0)).unwrap();

        let short = FeatureVector::new(vec![0.0; 3]);
        assert!(matches!(
            triple.predict(&short),
            Err(MLError::DimensionMismatch { expected: 5, actual: 3 })
        ));
    }
}
