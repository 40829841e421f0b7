//! Isolation tree node implementation
//!
//! Nodes live in a flat array inside their tree and refer to children by
//! index, so a fitted tree serializes as a plain list.

use serde::{Deserialize, Serialize};

/// Euler-Mascheroni constant
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Node type in the isolation tree
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum NodeType {
    /// Internal node with split condition
    Internal {
        /// Feature index to split on
        feature: usize,
        /// Split value; `x < split_value` goes left
        split_value: f64,
        /// Left child index
        left: usize,
        /// Right child index
        right: usize,
        /// Number of training samples that reached this node
        size: usize,
    },
    /// Leaf node (external)
    External {
        /// Number of training samples that reached this leaf
        size: usize,
    },
}

/// Tree node with its depth from the root
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Node type and data
    pub node_type: NodeType,
    /// Path length from root
    pub depth: usize,
}

impl Node {
    /// Create an internal node
    pub fn internal(
        feature: usize,
        split_value: f64,
        left: usize,
        right: usize,
        size: usize,
        depth: usize,
    ) -> Self {
        Self {
            node_type: NodeType::Internal {
                feature,
                split_value,
                left,
                right,
                size,
            },
            depth,
        }
    }

    /// Create an external (leaf) node
    pub fn external(size: usize, depth: usize) -> Self {
        Self {
            node_type: NodeType::External { size },
            depth,
        }
    }

    /// Check if node is a leaf
    pub fn is_leaf(&self) -> bool {
        matches!(self.node_type, NodeType::External { .. })
    }

    /// Number of training samples that reached this node
    pub fn size(&self) -> usize {
        match self.node_type {
            NodeType::Internal { size, .. } | NodeType::External { size } => size,
        }
    }

    /// Path length when a sample terminates at this node
    ///
    /// Leaves add the expected depth of the unbuilt subtree below them.
    pub fn path_length(&self) -> f64 {
        self.depth as f64 + average_path_length(self.size())
    }

    /// Child index to visit next, or `None` at a leaf or when the sample
    /// does not carry the split feature
    pub fn traverse(&self, sample: &[f64]) -> Option<usize> {
        match self.node_type {
            NodeType::Internal {
                feature,
                split_value,
                left,
                right,
                ..
            } => {
                let value = *sample.get(feature)?;
                Some(if value < split_value { left } else { right })
            }
            NodeType::External { .. } => None,
        }
    }
}

/// Average path length of an unsuccessful BST search over `n` points, c(n)
///
/// ```text
/// c(n) = 2·H(n-1) - 2(n-1)/n,   H(i) ≈ ln(i) + γ
/// ```
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}
