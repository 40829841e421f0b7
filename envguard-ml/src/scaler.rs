//! Per-feature standardization
//!
//! Stores the training mean and population standard deviation of every
//! column and maps `x` to `(x - mean) / scale`.

use serde::{Deserialize, Serialize};

use crate::forest::check_matrix;
use crate::{MLError, MLResult};

/// Below this a column is treated as constant and left unscaled
const MIN_SCALE: f64 = 1e-12;

/// Standard scaler fitted on a feature matrix
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    /// Create an unfitted scaler
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether [`fit`](Self::fit) has completed
    pub fn is_fitted(&self) -> bool {
        !self.mean.is_empty()
    }

    /// Fit column statistics
    pub fn fit(&mut self, rows: &[Vec<f64>]) -> MLResult<()> {
        let width = check_matrix(rows)?;
        let n = rows.len() as f64;

        let mut mean = vec![0.0; width];
        for row in rows {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut var = vec![0.0; width];
        for row in rows {
            for ((s, v), m) in var.iter_mut().zip(row).zip(&mean) {
                *s += (v - m).powi(2);
            }
        }

        self.scale = var
            .into_iter()
            .map(|s| {
                let std = (s / n).sqrt();
                if std < MIN_SCALE {
                    1.0
                } else {
                    std
                }
            })
            .collect();
        self.mean = mean;

        Ok(())
    }

    /// Fit, then transform the same rows
    pub fn fit_transform(&mut self, rows: &[Vec<f64>]) -> MLResult<Vec<Vec<f64>>> {
        self.fit(rows)?;
        self.transform_rows(rows)
    }

    /// Scale one vector of the fitted width
    pub fn transform(&self, row: &[f64]) -> MLResult<Vec<f64>> {
        if !self.is_fitted() {
            return Err(MLError::NotFitted);
        }
        if row.len() != self.mean.len() {
            return Err(MLError::DimensionMismatch {
                expected: self.mean.len(),
                actual: row.len(),
            });
        }
        self.apply(row)
    }

    /// Scale a vector that covers only the leading columns
    ///
    /// Column `i` of the input uses the statistics of fitted column `i`.
    pub fn transform_prefix(&self, row: &[f64]) -> MLResult<Vec<f64>> {
        if !self.is_fitted() {
            return Err(MLError::NotFitted);
        }
        if row.is_empty() || row.len() > self.mean.len() {
            return Err(MLError::DimensionMismatch {
                expected: self.mean.len(),
                actual: row.len(),
            });
        }
        self.apply(row)
    }

    /// Scale many rows of the fitted width
    pub fn transform_rows(&self, rows: &[Vec<f64>]) -> MLResult<Vec<Vec<f64>>> {
        rows.iter().map(|row| self.transform(row)).collect()
    }

    fn apply(&self, row: &[f64]) -> MLResult<Vec<f64>> {
        if row.iter().any(|v| !v.is_finite()) {
            return Err(MLError::NonFiniteInput);
        }
        Ok(row
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(v, (m, s))| (v - m) / s)
            .collect())
    }

    /// Fitted column means
    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    /// Fitted column scales
    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    /// Number of fitted columns
    pub fn width(&self) -> usize {
        self.mean.len()
    }
}
