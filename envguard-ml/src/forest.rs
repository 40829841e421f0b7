//! Isolation Forest implementation
//!
//! Combines many isolation trees, each fitted on a random subsample, and
//! calibrates a decision threshold so that a `contamination` fraction of
//! the training data scores as anomalous.

use envguard_core::constants::training::{
    DETECTOR_CONTAMINATION, DETECTOR_NUM_TREES, DETECTOR_SAMPLE_SIZE, DETECTOR_SEED,
};
use serde::{Deserialize, Serialize};

use crate::{
    calculate_anomaly_score, percentile, AnomalyScore, IsolationTree, MLError, MLResult, Rng,
    TreeConfig,
};

/// Configuration for Isolation Forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    /// Number of trees in the forest
    pub num_trees: usize,
    /// Subsample size per tree, capped at the number of training rows
    pub sample_size: usize,
    /// Expected share of anomalies in the training data, in `(0, 0.5]`
    pub contamination: f64,
    /// Random seed
    pub seed: u64,
    /// Maximum tree depth; `None` uses `ceil(log2(sample_size))`
    pub max_depth: Option<usize>,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            num_trees: DETECTOR_NUM_TREES,
            sample_size: DETECTOR_SAMPLE_SIZE,
            contamination: DETECTOR_CONTAMINATION,
            seed: DETECTOR_SEED,
            max_depth: None,
        }
    }
}

impl ForestConfig {
    /// Check hyperparameter ranges
    pub fn validate(&self) -> MLResult<()> {
        if self.num_trees == 0 {
            return Err(MLError::InvalidConfig("detector num_trees must be positive"));
        }
        if self.sample_size == 0 {
            return Err(MLError::InvalidConfig("detector sample_size must be positive"));
        }
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(MLError::InvalidConfig("detector contamination must be in (0, 0.5]"));
        }
        if self.max_depth == Some(0) {
            return Err(MLError::InvalidConfig("detector max_depth must be positive"));
        }
        Ok(())
    }
}

/// Isolation Forest for anomaly detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    /// Individual trees
    trees: Vec<IsolationTree>,
    /// Configuration
    config: ForestConfig,
    /// Subsample size actually used; normalizes path lengths
    num_samples: usize,
    /// Feature width seen at fit time
    num_features: usize,
    /// Contamination percentile of training scores
    offset: f64,
}

impl IsolationForest {
    /// Create a new, unfitted Isolation Forest
    pub fn new(config: ForestConfig) -> Self {
        Self {
            trees: Vec::new(),
            config,
            num_samples: 0,
            num_features: 0,
            offset: 0.0,
        }
    }

    /// Whether [`fit`](Self::fit) has completed
    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    /// Train the forest on samples
    ///
    /// Rows must share one width and contain only finite values.
    pub fn fit(&mut self, samples: &[Vec<f64>]) -> MLResult<()> {
        self.config.validate()?;
        let num_features = check_matrix(samples)?;

        let sample_size = self.config.sample_size.min(samples.len());
        let max_depth = self
            .config
            .max_depth
            .unwrap_or_else(|| default_max_depth(sample_size));

        let rows: Vec<&[f64]> = samples.iter().map(|s| s.as_slice()).collect();
        let mut rng = Rng::new(self.config.seed);
        let mut trees = Vec::with_capacity(self.config.num_trees);

        for _ in 0..self.config.num_trees {
            let tree_config = TreeConfig {
                max_depth,
                seed: rng.next_u64(),
            };
            let subset = sample_subset(&rows, sample_size, &mut rng);

            let mut tree = IsolationTree::new(tree_config);
            tree.fit(&subset)?;
            trees.push(tree);
        }

        self.trees = trees;
        self.num_samples = sample_size;
        self.num_features = num_features;

        // Threshold at the contamination percentile of training scores
        let training_scores: Vec<f64> = rows.iter().map(|row| -self.raw_score(row).0).collect();
        self.offset = percentile(&training_scores, 100.0 * self.config.contamination)
            .ok_or(MLError::InsufficientData {
                required: 1,
                available: 0,
            })?;

        log::debug!(
            "Isolation forest fitted: {} trees, {} of {} rows per tree, depth <= {}, offset {:.4}",
            self.trees.len(),
            sample_size,
            samples.len(),
            max_depth,
            self.offset
        );

        Ok(())
    }

    /// Average path length and raw score for a sample
    fn raw_score(&self, sample: &[f64]) -> (f64, f64) {
        let total_path_length: f64 = self.trees.iter().map(|tree| tree.path_length(sample)).sum();
        let avg_path_length = total_path_length / self.trees.len() as f64;
        (
            calculate_anomaly_score(avg_path_length, self.num_samples),
            avg_path_length,
        )
    }

    /// Calculate anomaly score for a sample of the fitted width
    pub fn anomaly_score(&self, sample: &[f64]) -> MLResult<AnomalyScore> {
        if !self.is_fitted() {
            return Err(MLError::NotFitted);
        }
        if sample.len() != self.num_features {
            return Err(MLError::DimensionMismatch {
                expected: self.num_features,
                actual: sample.len(),
            });
        }
        if sample.iter().any(|v| !v.is_finite()) {
            return Err(MLError::NonFiniteInput);
        }
        let (score, avg_path_length) = self.raw_score(sample);
        Ok(AnomalyScore::new(score, self.offset, avg_path_length, self.trees.len()))
    }

    /// Check if a sample is an anomaly
    pub fn is_anomaly(&self, sample: &[f64]) -> MLResult<bool> {
        Ok(self.anomaly_score(sample)?.is_anomaly())
    }

    /// Score many samples
    pub fn predict(&self, samples: &[Vec<f64>]) -> MLResult<Vec<AnomalyScore>> {
        samples.iter().map(|sample| self.anomaly_score(sample)).collect()
    }

    /// Fitted decision offset
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Feature width seen at fit time
    pub fn num_features(&self) -> usize {
        self.num_features
    }
}

/// `ceil(log2(n))`, at least 1
fn default_max_depth(sample_size: usize) -> usize {
    (sample_size.max(2) as f64).log2().ceil() as usize
}

/// Validate a feature matrix and return its width
pub(crate) fn check_matrix(samples: &[Vec<f64>]) -> MLResult<usize> {
    let Some(first) = samples.first() else {
        return Err(MLError::InsufficientData {
            required: 1,
            available: 0,
        });
    };
    let width = first.len();
    if width == 0 {
        return Err(MLError::DimensionMismatch {
            expected: 1,
            actual: 0,
        });
    }
    for row in samples {
        if row.len() != width {
            return Err(MLError::DimensionMismatch {
                expected: width,
                actual: row.len(),
            });
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(MLError::NonFiniteInput);
        }
    }
    Ok(width)
}

/// Draw `sample_size` rows without replacement
fn sample_subset<'a>(rows: &[&'a [f64]], sample_size: usize, rng: &mut Rng) -> Vec<&'a [f64]> {
    // If sample size >= data size, use all data
    if sample_size >= rows.len() {
        return rows.to_vec();
    }

    let mut indices: Vec<usize> = (0..rows.len()).collect();

    // Partial Fisher-Yates shuffle
    for i in 0..sample_size {
        let j = i + rng.next_range(rows.len() - i);
        indices.swap(i, j);
    }

    indices[..sample_size].iter().map(|&i| rows[i]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_data() -> Vec<Vec<f64>> {
        let mut samples = Vec::new();

        // Normal data cluster
        for i in 0..30 {
            let temp = 20.0 + (i % 10) as f64 * 0.1;
            let humidity = 50.0 + (i / 10) as f64 * 0.2;
            samples.push(vec![temp, humidity]);
        }

        // Anomalies
        samples.push(vec![35.0, 90.0]);
        samples.push(vec![5.0, 20.0]);

        samples
    }

    fn small_config() -> ForestConfig {
        ForestConfig {
            num_trees: 50,
            sample_size: 256,
            contamination: 0.1,
            seed: 123,
            max_depth: None,
        }
    }

    #[test]
    fn test_forest_creation() {
        let forest = IsolationForest::new(small_config());
        assert!(!forest.is_fitted());
        assert_eq!(forest.num_features(), 0);
    }

    #[test]
    fn test_forest_fit() {
        let mut forest = IsolationForest::new(small_config());
        let samples = create_test_data();

        forest.fit(&samples).unwrap();

        assert!(forest.is_fitted());
        assert_eq!(forest.trees.len(), 50);
        assert_eq!(forest.num_samples, samples.len());
        assert_eq!(forest.num_features(), 2);
        // ceil(log2(32))
        assert!(forest.trees.iter().all(|t| t.depth() <= 5 && t.node_count() > 0));
    }

    #[test]
    fn test_anomaly_detection() {
        let mut forest = IsolationForest::new(small_config());
        let samples = create_test_data();
        forest.fit(&samples).unwrap();

        let normal = forest.anomaly_score(&[20.4, 50.2]).unwrap();
        let anomaly = forest.anomaly_score(&[35.0, 90.0]).unwrap();

        assert!(anomaly.score > normal.score);
        assert!(anomaly.is_anomaly());
        assert!(!normal.is_anomaly());
    }

    #[test]
    fn test_contamination_share() {
        let mut forest = IsolationForest::new(small_config());
        let samples = create_test_data();
        forest.fit(&samples).unwrap();

        let flagged = forest
            .predict(&samples)
            .unwrap()
            .iter()
            .filter(|s| s.is_anomaly())
            .count();

        // The offset sits at the 10th percentile, so at most ~10% fall below it
        assert!(flagged <= (samples.len() as f64 * 0.1).ceil() as usize);
        assert!(flagged >= 1);
    }

    #[test]
    fn test_not_fitted() {
        let forest = IsolationForest::new(small_config());
        assert_eq!(forest.anomaly_score(&[1.0, 2.0]), Err(MLError::NotFitted));
    }

    #[test]
    fn test_dimension_checks() {
        let mut forest = IsolationForest::new(small_config());
        forest.fit(&create_test_data()).unwrap();

        assert!(matches!(
            forest.anomaly_score(&[1.0]),
            Err(MLError::DimensionMismatch { expected: 2, actual: 1 })
        ));
        assert!(matches!(
            forest.anomaly_score(&[1.0, 2.0, 3.0]),
            Err(MLError::DimensionMismatch { expected: 2, actual: 3 })
        ));
        assert_eq!(
            forest.anomaly_score(&[f64::NAN, 1.0]),
            Err(MLError::NonFiniteInput)
        );
    }

    #[test]
    fn test_fit_rejects_bad_input() {
        let mut forest = IsolationForest::new(small_config());
        assert!(matches!(
            forest.fit(&[]),
            Err(MLError::InsufficientData { .. })
        ));
        assert_eq!(
            forest.fit(&[vec![1.0, 2.0], vec![f64::INFINITY, 1.0]]),
            Err(MLError::NonFiniteInput)
        );
        assert!(matches!(
            forest.fit(&[vec![1.0, 2.0], vec![1.0]]),
            Err(MLError::DimensionMismatch { .. })
        ));

        let mut bad = IsolationForest::new(ForestConfig {
            contamination: 0.9,
            ..small_config()
        });
        assert!(matches!(
            bad.fit(&create_test_data()),
            Err(MLError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_seeded_fit_is_reproducible() {
        let samples = create_test_data();
        let mut a = IsolationForest::new(small_config());
        let mut b = IsolationForest::new(small_config());
        a.fit(&samples).unwrap();
        b.fit(&samples).unwrap();

        assert_eq!(a.offset(), b.offset());
        assert_eq!(
            a.anomaly_score(&[21.0, 50.0]).unwrap(),
            b.anomaly_score(&[21.0, 50.0]).unwrap()
        );
    }

    #[test]
    fn test_serde_roundtrip_preserves_scores() {
        let mut forest = IsolationForest::new(small_config());
        forest.fit(&create_test_data()).unwrap();

        let json = serde_json::to_string(&forest).unwrap();
        let restored: IsolationForest = serde_json::from_str(&json).unwrap();

        let outlier = [35.0, 90.0];
        assert_eq!(
            forest.anomaly_score(&outlier).unwrap(),
            restored.anomaly_score(&outlier).unwrap()
        );
    }
}
