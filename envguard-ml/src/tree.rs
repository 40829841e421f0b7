//! Isolation tree implementation
//!
//! Trees are built by recursively partitioning a subsample on a random
//! feature at a random threshold until every point is isolated or the
//! depth limit is reached.

use serde::{Deserialize, Serialize};

use crate::{MLError, MLResult, Node, NodeType, Rng};

/// Configuration for isolation tree
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Maximum depth of tree
    pub max_depth: usize,
    /// Random seed for this tree
    pub seed: u64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 8, // ceil(log2(256))
            seed: 42,
        }
    }
}

/// Isolation tree structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationTree {
    /// Tree nodes in array representation, root at index 0
    nodes: Vec<Node>,
    /// Configuration
    config: TreeConfig,
}

impl IsolationTree {
    /// Create a new, empty isolation tree
    pub fn new(config: TreeConfig) -> Self {
        Self {
            nodes: Vec::new(),
            config,
        }
    }

    /// Train the tree on samples
    ///
    /// All samples must have the same width.
    pub fn fit(&mut self, samples: &[&[f64]]) -> MLResult<()> {
        if samples.is_empty() {
            return Err(MLError::InsufficientData {
                required: 1,
                available: 0,
            });
        }

        self.nodes.clear();
        let mut rng = Rng::new(self.config.seed);
        let mut indices: Vec<usize> = (0..samples.len()).collect();
        self.build_tree(samples, &mut indices, 0, &mut rng);

        Ok(())
    }

    /// Build the subtree over `indices`, returning its root index
    fn build_tree(
        &mut self,
        samples: &[&[f64]],
        indices: &mut [usize],
        depth: usize,
        rng: &mut Rng,
    ) -> usize {
        let node_index = self.nodes.len();

        if depth >= self.config.max_depth || indices.len() <= 1 {
            self.nodes.push(Node::external(indices.len(), depth));
            return node_index;
        }

        let Some((feature, split_value)) = self.select_split(samples, indices, rng) else {
            // Every feature is constant over this partition
            self.nodes.push(Node::external(indices.len(), depth));
            return node_index;
        };

        // Reserve the slot so children land after their parent
        self.nodes.push(Node::external(indices.len(), depth));

        let size = indices.len();
        let mid = partition(samples, indices, feature, split_value);
        let (left_indices, right_indices) = indices.split_at_mut(mid);

        let left = self.build_tree(samples, left_indices, depth + 1, rng);
        let right = self.build_tree(samples, right_indices, depth + 1, rng);

        self.nodes[node_index] = Node::internal(feature, split_value, left, right, size, depth);
        node_index
    }

    /// Select a random non-constant feature and a threshold inside its range
    ///
    /// Features are tried in random order. The threshold is drawn uniformly
    /// from `[min, max)`; a draw equal to `min` would leave the left side
    /// empty, so it falls back to the midpoint.
    fn select_split(
        &self,
        samples: &[&[f64]],
        indices: &[usize],
        rng: &mut Rng,
    ) -> Option<(usize, f64)> {
        let num_features = samples[indices[0]].len();
        let mut features: Vec<usize> = (0..num_features).collect();
        rng.shuffle(&mut features);

        for feature in features {
            let (min_val, max_val) = feature_range(samples, indices, feature);
            if max_val <= min_val {
                continue;
            }

            let mut split_value = rng.next_f64_range(min_val, max_val);
            if split_value <= min_val {
                split_value = min_val + (max_val - min_val) / 2.0;
            }
            return Some((feature, split_value));
        }

        None
    }

    /// Calculate path length for a sample
    ///
    /// A sample narrower than the training data has no route at splits on
    /// the features it does not carry. There the path length is the average
    /// over both subtrees, weighted by how many training samples each one
    /// received.
    pub fn path_length(&self, sample: &[f64]) -> f64 {
        self.path_length_from(0, sample)
    }

    fn path_length_from(&self, mut current_index: usize, sample: &[f64]) -> f64 {
        loop {
            let Some(node) = self.nodes.get(current_index) else {
                return 0.0;
            };

            match node.node_type {
                NodeType::External { .. } => return node.path_length(),
                NodeType::Internal { left, right, .. } => match node.traverse(sample) {
                    Some(next_index) => current_index = next_index,
                    None => {
                        let left_size = self.nodes.get(left).map_or(0, Node::size) as f64;
                        let right_size = self.nodes.get(right).map_or(0, Node::size) as f64;
                        let total = left_size + right_size;
                        if total == 0.0 {
                            return node.path_length();
                        }
                        return (left_size * self.path_length_from(left, sample)
                            + right_size * self.path_length_from(right, sample))
                            / total;
                    }
                },
            }
        }
    }

    /// Get the number of nodes in the tree
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Get tree depth
    pub fn depth(&self) -> usize {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }

    /// Tree configuration
    pub fn config(&self) -> &TreeConfig {
        &self.config
    }
}

/// Min and max of one feature over a partition
fn feature_range(samples: &[&[f64]], indices: &[usize], feature: usize) -> (f64, f64) {
    indices
        .iter()
        .map(|&i| samples[i][feature])
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        })
}

/// Reorder `indices` so values below the split come first; returns the
/// boundary
fn partition(samples: &[&[f64]], indices: &mut [usize], feature: usize, split_value: f64) -> usize {
    let mut mid = 0;
    for i in 0..indices.len() {
        if samples[indices[i]][feature] < split_value {
            indices.swap(i, mid);
            mid += 1;
        }
    }
    mid
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_samples() -> Vec<Vec<f64>> {
        vec![
            // Normal samples
            vec![20.0, 50.0, 1013.0],
            vec![22.0, 55.0, 1012.0],
            vec![21.0, 52.0, 1014.0],
            vec![19.0, 48.0, 1013.0],
            // Anomaly
            vec![35.0, 90.0, 1000.0],
        ]
    }

    fn as_rows(samples: &[Vec<f64>]) -> Vec<&[f64]> {
        samples.iter().map(|s| s.as_slice()).collect()
    }

    #[test]
    fn test_tree_creation() {
        let tree = IsolationTree::new(TreeConfig::default());

        assert_eq!(tree.node_count(), 0);
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.path_length(&[1.0]), 0.0);
    }

    #[test]
    fn test_tree_fit() {
        let config = TreeConfig {
            max_depth: 5,
            seed: 123,
        };
        let mut tree = IsolationTree::new(config);

        let samples = create_test_samples();
        tree.fit(&as_rows(&samples)).unwrap();

        assert!(tree.node_count() > 0);
        assert!(tree.depth() <= 5);
    }

    #[test]
    fn test_fit_empty() {
        let mut tree = IsolationTree::new(TreeConfig::default());
        assert!(matches!(
            tree.fit(&[]),
            Err(MLError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_full_isolation_without_depth_limit() {
        let config = TreeConfig {
            max_depth: 64,
            seed: 7,
        };
        let mut tree = IsolationTree::new(config);
        let samples = create_test_samples();
        tree.fit(&as_rows(&samples)).unwrap();

        // Every distinct point ends in its own leaf
        let leaves: Vec<_> = tree.nodes.iter().filter(|n| n.is_leaf()).collect();
        assert_eq!(leaves.len(), samples.len());
        assert!(leaves
            .iter()
            .all(|n| matches!(n.node_type, NodeType::External { size: 1 })));
    }

    #[test]
    fn test_constant_data_is_single_leaf() {
        let samples = vec![vec![1.0, 2.0]; 6];
        let mut tree = IsolationTree::new(TreeConfig::default());
        tree.fit(&as_rows(&samples)).unwrap();

        assert_eq!(tree.node_count(), 1);
        assert!(tree.nodes[0].is_leaf());
    }

    #[test]
    fn test_path_length() {
        let mut tree = IsolationTree::new(TreeConfig::default());
        let samples = create_test_samples();
        tree.fit(&as_rows(&samples)).unwrap();

        assert!(tree.path_length(&samples[0]) > 0.0);
        assert!(tree.path_length(&samples[4]) > 0.0);
    }

    #[test]
    fn test_path_length_short_sample() {
        let mut tree = IsolationTree::new(TreeConfig::default());
        let samples = create_test_samples();
        tree.fit(&as_rows(&samples)).unwrap();

        let short = tree.path_length(&[20.0]);
        assert!(short > 0.0);
        assert!(short <= tree.depth() as f64 + crate::average_path_length(samples.len()));
    }

    #[test]
    fn test_empty_sample_averages_every_leaf() {
        let config = TreeConfig {
            max_depth: 2,
            seed: 11,
        };
        let mut tree = IsolationTree::new(config);
        let samples = create_test_samples();
        tree.fit(&as_rows(&samples)).unwrap();

        // No feature is known, so every leaf counts by its training share
        let expected: f64 = tree
            .nodes
            .iter()
            .filter(|n| n.is_leaf())
            .map(|n| n.size() as f64 * n.path_length())
            .sum::<f64>()
            / samples.len() as f64;
        assert!((tree.path_length(&[]) - expected).abs() < 1e-9);
        assert!(tree.path_length(&[]) > tree.nodes[0].depth as f64);
    }

    #[test]
    fn test_internal_nodes_record_partition_size() {
        let mut tree = IsolationTree::new(TreeConfig::default());
        let samples = create_test_samples();
        tree.fit(&as_rows(&samples)).unwrap();

        assert_eq!(tree.nodes[0].size(), samples.len());
        for node in &tree.nodes {
            if let NodeType::Internal { left, right, size, .. } = node.node_type {
                assert_eq!(tree.nodes[left].size() + tree.nodes[right].size(), size);
            }
        }
    }

    #[test]
    fn test_same_seed_same_tree() {
        let samples = create_test_samples();
        let mut a = IsolationTree::new(TreeConfig::default());
        let mut b = IsolationTree::new(TreeConfig::default());
        a.fit(&as_rows(&samples)).unwrap();
        b.fit(&as_rows(&samples)).unwrap();

        assert_eq!(a.nodes, b.nodes);
    }
}
