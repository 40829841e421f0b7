//! Feature construction shared by training and inference
//!
//! ## Layout
//!
//! Every feature vector starts with three calendar features derived from a
//! timestamp, followed by covariate values in canonical [`Quantity`] order:
//!
//! ```text
//! [hour, day_of_week, month, cov_0, cov_1, ..., cov_k]
//!  0-23  Mon=0..Sun=6  1-12   every quantity except the target that
//!                             appeared as a column in the training table
//! ```
//!
//! The covariate list is fixed when a parameter is trained and stored in its
//! [`FeatureLayout`]. Inference builds vectors from that layout, never from
//! the current reading's keys, so the scaler and regressor always see the
//! columns they were fitted on.
//!
//! ## Imputation
//!
//! Missing covariates are handled differently on each side:
//!
//! | Side      | Missing covariate becomes                       |
//! |-----------|-------------------------------------------------|
//! | Training  | mean of that column over the target's rows      |
//! | Inference | `0.0`                                           |
//!
//! Training means are recomputed from the current table on every call and
//! never cached across cycles. A column with no values at all among the
//! target's rows has no mean and falls back to `0.0`.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{FeatureError, FeatureResult};
use crate::parameter::{Parameter, Quantity};
use crate::reading::Reading;

/// Names of the leading calendar features
pub const CALENDAR_FEATURES: [&str; 3] = ["hour", "day_of_week", "month"];

/// Calendar features for an instant: hour, day of week (Monday = 0), month
pub fn calendar_features(at: DateTime<Utc>) -> [f64; 3] {
    [
        at.hour() as f64,
        at.weekday().num_days_from_monday() as f64,
        at.month() as f64,
    ]
}

/// Ordered numeric encoding of one reading or synthetic point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    /// Wrap raw values
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    /// Feature values
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Number of features
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the vector has no features
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Unwrap into the raw values
    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

/// The 4-field `[hour, day_of_week, month, value]` vector used for
/// real-time anomaly checks
///
/// Narrower than the training layout. The value takes the place of the
/// target, which a fitted triple keeps right after the calendar fields.
pub fn realtime_vector(value: f64, as_of: DateTime<Utc>) -> FeatureVector {
    let [hour, day, month] = calendar_features(as_of);
    FeatureVector(vec![hour, day, month, value])
}

/// Column order fitted for one target parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureLayout {
    target: Parameter,
    covariates: Vec<Quantity>,
}

impl FeatureLayout {
    /// Layout using every other quantity as a covariate
    ///
    /// This is the layout of an untrained triple.
    pub fn full(target: Parameter) -> Self {
        Self::from_columns(target, &Quantity::ALL)
    }

    /// Layout over the given columns, excluding the target, in canonical order
    pub fn from_columns(target: Parameter, columns: &[Quantity]) -> Self {
        let covariates = Quantity::ALL
            .iter()
            .copied()
            .filter(|q| *q != target.as_quantity() && columns.contains(q))
            .collect();
        Self { target, covariates }
    }

    /// Target parameter
    pub fn target(&self) -> Parameter {
        self.target
    }

    /// Covariate columns after the calendar features
    pub fn covariates(&self) -> &[Quantity] {
        &self.covariates
    }

    /// Total vector width
    pub fn width(&self) -> usize {
        CALENDAR_FEATURES.len() + self.covariates.len()
    }

    /// Column names in vector order
    pub fn feature_names(&self) -> Vec<String> {
        CALENDAR_FEATURES
            .iter()
            .map(|name| name.to_string())
            .chain(self.covariates.iter().map(|q| q.name().to_string()))
            .collect()
    }

    /// Inference vector for `target` as of `as_of`
    ///
    /// Calendar fields come from `as_of`; covariates come from the reading,
    /// with missing or null values imputed as zero.
    pub fn vector_for(
        &self,
        target: Parameter,
        reading: &Reading,
        as_of: DateTime<Utc>,
    ) -> FeatureResult<FeatureVector> {
        if target != self.target {
            return Err(FeatureError::LayoutMismatch {
                expected: self.target,
                actual: target,
            });
        }

        let mut values = Vec::with_capacity(self.width());
        values.extend_from_slice(&calendar_features(as_of));
        values.extend(
            self.covariates
                .iter()
                .map(|q| reading.value(*q).unwrap_or(0.0)),
        );

        Ok(FeatureVector(values))
    }
}

/// One flattened reading
#[derive(Debug, Clone)]
pub struct TableRow {
    /// Original timestamp
    pub timestamp: DateTime<Utc>,
    /// Reporting sensor
    pub sensor_id: String,
    /// Sensor family
    pub sensor_type: String,
    /// hour, day_of_week, month
    pub calendar: [f64; 3],
    /// Values indexed by [`Quantity::index`]
    pub values: [Option<f64>; Quantity::COUNT],
}

/// Flattened training window shared by every parameter in a cycle
#[derive(Debug, Clone, Default)]
pub struct TrainingTable {
    rows: Vec<TableRow>,
    columns: Vec<Quantity>,
}

/// Flatten readings into a training table
///
/// A quantity becomes a column when any reading carries its key, even with
/// a null value.
pub fn build_training_table(readings: &[Reading]) -> TrainingTable {
    let mut present = [false; Quantity::COUNT];

    let rows = readings
        .iter()
        .map(|reading| {
            let mut values = [None; Quantity::COUNT];
            for q in Quantity::ALL {
                if reading.has_key(q) {
                    present[q.index()] = true;
                }
                values[q.index()] = reading.value(q);
            }
            TableRow {
                timestamp: reading.timestamp,
                sensor_id: reading.sensor_id.clone(),
                sensor_type: reading.sensor_type.clone(),
                calendar: calendar_features(reading.timestamp),
                values,
            }
        })
        .collect();

    let columns = Quantity::ALL
        .iter()
        .copied()
        .filter(|q| present[q.index()])
        .collect();

    TrainingTable { rows, columns }
}

impl TrainingTable {
    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows in datastore order
    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    /// Quantities present as columns
    pub fn columns(&self) -> &[Quantity] {
        &self.columns
    }

    /// Rows with a non-null value for `target`
    pub fn usable_rows(&self, target: Parameter) -> usize {
        let idx = target.as_quantity().index();
        self.rows.iter().filter(|r| r.values[idx].is_some()).count()
    }

    /// Design matrix for one target
    ///
    /// Drops rows without a target value, then mean-imputes missing
    /// covariates over the remaining rows.
    pub fn design_for(&self, target: Parameter) -> FeatureResult<DesignMatrix> {
        let layout = FeatureLayout::from_columns(target, &self.columns);
        let target_idx = target.as_quantity().index();

        let kept: Vec<(usize, &TableRow)> = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.values[target_idx].is_some())
            .collect();

        // Column means over the kept rows only
        let mut means = Vec::with_capacity(layout.covariates.len());
        for &q in &layout.covariates {
            let mut sum = 0.0;
            let mut count = 0usize;
            for &(row_idx, row) in &kept {
                if let Some(v) = row.values[q.index()] {
                    if !v.is_finite() {
                        return Err(FeatureError::NonFinite { quantity: q, row: row_idx });
                    }
                    sum += v;
                    count += 1;
                }
            }
            means.push(if count > 0 { sum / count as f64 } else { 0.0 });
        }

        let mut features = Vec::with_capacity(kept.len());
        let mut targets = Vec::with_capacity(kept.len());
        for &(row_idx, row) in &kept {
            let y = row.values[target_idx].unwrap_or_default();
            if !y.is_finite() {
                return Err(FeatureError::NonFinite {
                    quantity: target.as_quantity(),
                    row: row_idx,
                });
            }

            let mut x = Vec::with_capacity(layout.width());
            x.extend_from_slice(&row.calendar);
            for (q, mean) in layout.covariates.iter().zip(&means) {
                x.push(row.values[q.index()].unwrap_or(*mean));
            }

            features.push(x);
            targets.push(y);
        }

        Ok(DesignMatrix {
            layout,
            features,
            targets,
            imputed_means: means,
        })
    }
}

/// Feature rows and targets for one parameter
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    layout: FeatureLayout,
    features: Vec<Vec<f64>>,
    targets: Vec<f64>,
    imputed_means: Vec<f64>,
}

impl DesignMatrix {
    /// Layout the rows follow
    pub fn layout(&self) -> &FeatureLayout {
        &self.layout
    }

    /// Feature rows
    pub fn features(&self) -> &[Vec<f64>] {
        &self.features
    }

    /// Target values, aligned with [`features`](Self::features)
    pub fn targets(&self) -> &[f64] {
        &self.targets
    }

    /// Means used to impute each covariate, in layout order
    pub fn imputed_means(&self) -> &[f64] {
        &self.imputed_means
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether no rows survived filtering
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Split into owned parts
    pub fn into_parts(self) -> (FeatureLayout, Vec<Vec<f64>>, Vec<f64>) {
        (self.layout, self.features, self.targets)
    }
}
