//! Random forest regressor
//!
//! Bagged CART regression trees. Each tree is grown on a bootstrap sample
//! of the training rows and considers every feature at every split,
//! choosing the threshold that minimizes the summed squared error of the
//! two children. The forest predicts the mean of its trees.

use envguard_core::constants::training::{
    REGRESSOR_MAX_DEPTH, REGRESSOR_MIN_SAMPLES_SPLIT, REGRESSOR_NUM_TREES, REGRESSOR_SEED,
};
use serde::{Deserialize, Serialize};

use crate::forest::check_matrix;
use crate::{MLError, MLResult, Rng};

/// Squared-error floor below which a node counts as pure
const PURE_SSE: f64 = 1e-12;

/// Configuration for the random forest regressor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressorConfig {
    /// Number of trees
    pub num_trees: usize,
    /// Maximum depth of each tree
    pub max_depth: usize,
    /// Nodes with fewer rows become leaves
    pub min_samples_split: usize,
    /// Random seed for bootstrap draws
    pub seed: u64,
}

impl Default for RegressorConfig {
    fn default() -> Self {
        Self {
            num_trees: REGRESSOR_NUM_TREES,
            max_depth: REGRESSOR_MAX_DEPTH,
            min_samples_split: REGRESSOR_MIN_SAMPLES_SPLIT,
            seed: REGRESSOR_SEED,
        }
    }
}

impl RegressorConfig {
    /// Check hyperparameter ranges
    pub fn validate(&self) -> MLResult<()> {
        if self.num_trees == 0 {
            return Err(MLError::InvalidConfig("regressor num_trees must be positive"));
        }
        if self.max_depth == 0 {
            return Err(MLError::InvalidConfig("regressor max_depth must be positive"));
        }
        if self.min_samples_split < 2 {
            return Err(MLError::InvalidConfig("regressor min_samples_split must be at least 2"));
        }
        Ok(())
    }
}

/// Regression tree node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RegressionNode {
    /// `x[feature] <= threshold` goes left
    Split {
        /// Feature index
        feature: usize,
        /// Midpoint between adjacent distinct training values
        threshold: f64,
        /// Left child index
        left: usize,
        /// Right child index
        right: usize,
    },
    /// Mean target of the rows that reached this leaf
    Leaf {
        /// Predicted value
        value: f64,
    },
}

/// Single CART regression tree
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<RegressionNode>,
}

/// Best split candidate for one node
struct Split {
    feature: usize,
    threshold: f64,
    sse: f64,
}

impl RegressionTree {
    /// Grow a tree over the rows selected by `indices`
    ///
    /// `indices` may repeat rows, as bootstrap samples do.
    pub fn fit(
        features: &[Vec<f64>],
        targets: &[f64],
        indices: &[usize],
        config: &RegressorConfig,
    ) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        let mut indices = indices.to_vec();
        tree.grow(features, targets, &mut indices, 0, config);
        tree
    }

    fn grow(
        &mut self,
        features: &[Vec<f64>],
        targets: &[f64],
        indices: &mut [usize],
        depth: usize,
        config: &RegressorConfig,
    ) -> usize {
        let node_index = self.nodes.len();
        let (mean, sse) = mean_and_sse(targets, indices);
        self.nodes.push(RegressionNode::Leaf { value: mean });

        if depth >= config.max_depth || indices.len() < config.min_samples_split || sse <= PURE_SSE {
            return node_index;
        }

        let Some(split) = best_split(features, targets, indices) else {
            return node_index;
        };
        if split.sse >= sse {
            return node_index;
        }

        let mut mid = 0;
        for i in 0..indices.len() {
            if features[indices[i]][split.feature] <= split.threshold {
                indices.swap(i, mid);
                mid += 1;
            }
        }
        let (left_indices, right_indices) = indices.split_at_mut(mid);

        let left = self.grow(features, targets, left_indices, depth + 1, config);
        let right = self.grow(features, targets, right_indices, depth + 1, config);

        self.nodes[node_index] = RegressionNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node_index
    }

    /// Predict one row
    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut current = 0;
        loop {
            match self.nodes.get(current) {
                Some(RegressionNode::Leaf { value }) => return *value,
                Some(RegressionNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    current = if row.get(*feature).is_some_and(|v| v <= threshold) {
                        *left
                    } else {
                        *right
                    };
                }
                None => return 0.0,
            }
        }
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// Mean target and summed squared error of a node
fn mean_and_sse(targets: &[f64], indices: &[usize]) -> (f64, f64) {
    if indices.is_empty() {
        return (0.0, 0.0);
    }
    let n = indices.len() as f64;
    let mean = indices.iter().map(|&i| targets[i]).sum::<f64>() / n;
    let sse = indices.iter().map(|&i| (targets[i] - mean).powi(2)).sum();
    (mean, sse)
}

/// Exhaustive search over every feature and every boundary between
/// distinct sorted values, using prefix sums of `y` and `y²`
fn best_split(features: &[Vec<f64>], targets: &[f64], indices: &[usize]) -> Option<Split> {
    let width = features[indices[0]].len();
    let n = indices.len();
    let total_sum: f64 = indices.iter().map(|&i| targets[i]).sum();
    let total_sq: f64 = indices.iter().map(|&i| targets[i] * targets[i]).sum();

    let mut best: Option<Split> = None;
    let mut order = indices.to_vec();

    for feature in 0..width {
        order.sort_by(|&a, &b| features[a][feature].total_cmp(&features[b][feature]));

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for k in 1..n {
            let y = targets[order[k - 1]];
            left_sum += y;
            left_sq += y * y;

            let lo = features[order[k - 1]][feature];
            let hi = features[order[k]][feature];
            if lo >= hi {
                continue;
            }

            let left_n = k as f64;
            let right_n = (n - k) as f64;
            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let sse = (left_sq - left_sum * left_sum / left_n)
                + (right_sq - right_sum * right_sum / right_n);

            if best.as_ref().map_or(true, |b| sse < b.sse) {
                let mut threshold = lo + (hi - lo) / 2.0;
                // Midpoint can round up to `hi` for adjacent floats
                if threshold >= hi {
                    threshold = lo;
                }
                best = Some(Split {
                    feature,
                    threshold,
                    sse,
                });
            }
        }
    }

    best
}

/// Random forest regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    config: RegressorConfig,
    trees: Vec<RegressionTree>,
    num_features: usize,
}

impl RandomForestRegressor {
    /// Create an unfitted regressor
    pub fn new(config: RegressorConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            num_features: 0,
        }
    }

    /// Whether [`fit`](Self::fit) has completed
    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    /// Fit on a feature matrix and aligned targets
    pub fn fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> MLResult<()> {
        self.config.validate()?;
        let num_features = check_matrix(features)?;
        if targets.len() != features.len() {
            return Err(MLError::DimensionMismatch {
                expected: features.len(),
                actual: targets.len(),
            });
        }
        if targets.iter().any(|v| !v.is_finite()) {
            return Err(MLError::NonFiniteInput);
        }

        let n = features.len();
        let mut rng = Rng::new(self.config.seed);
        let mut trees = Vec::with_capacity(self.config.num_trees);
        let mut bootstrap = vec![0usize; n];

        for _ in 0..self.config.num_trees {
            bootstrap.iter_mut().for_each(|i| *i = rng.next_range(n));
            trees.push(RegressionTree::fit(features, targets, &bootstrap, &self.config));
        }

        self.trees = trees;
        self.num_features = num_features;

        log::debug!(
            "Regressor fitted: {} trees on {} rows x {} features",
            self.trees.len(),
            n,
            num_features
        );

        Ok(())
    }

    /// Predict one row of the fitted width
    pub fn predict(&self, row: &[f64]) -> MLResult<f64> {
        if !self.is_fitted() {
            return Err(MLError::NotFitted);
        }
        if row.len() != self.num_features {
            return Err(MLError::DimensionMismatch {
                expected: self.num_features,
                actual: row.len(),
            });
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(MLError::NonFiniteInput);
        }

        let total: f64 = self.trees.iter().map(|t| t.predict(row)).sum();
        Ok(total / self.trees.len() as f64)
    }

    /// Predict many rows
    pub fn predict_rows(&self, rows: &[Vec<f64>]) -> MLResult<Vec<f64>> {
        rows.iter().map(|row| self.predict(row)).collect()
    }

    /// Number of fitted trees
    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Feature width seen at fit time
    pub fn num_features(&self) -> usize {
        self.num_features
    }
}
