//! Anomaly scoring
//!
//! Converts average isolation path lengths into the raw score `s(x)` and
//! the contamination-relative decision value returned to callers.

use serde::{Deserialize, Serialize};

use crate::average_path_length;

/// Anomaly score result
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnomalyScore {
    /// Raw isolation score `s(x)` in `(0, 1]`; higher is more anomalous
    pub score: f64,
    /// Signed distance to the contamination threshold; negative is anomalous
    pub decision: f64,
    /// Average path length across trees
    pub avg_path_length: f64,
    /// Number of trees used
    pub num_trees: usize,
}

impl AnomalyScore {
    /// Build a score from the raw value and the fitted offset
    ///
    /// `decision = -score - offset`, matching the sign convention where
    /// inliers are positive.
    pub fn new(score: f64, offset: f64, avg_path_length: f64, num_trees: usize) -> Self {
        Self {
            score,
            decision: -score - offset,
            avg_path_length,
            num_trees,
        }
    }

    /// Check if the score falls beyond the contamination threshold
    pub fn is_anomaly(&self) -> bool {
        self.decision < 0.0
    }
}

/// Calculate anomaly score from path lengths
///
/// Uses the formula: score = 2^(-E(h(x))/c(n))
/// where E(h(x)) is expected path length and c(n) is average path length
pub fn calculate_anomaly_score(avg_path_length: f64, num_samples: usize) -> f64 {
    let expected_path = average_path_length(num_samples);
    if expected_path == 0.0 {
        return 0.5; // Neutral score
    }

    2.0_f64.powf(-avg_path_length / expected_path)
}

/// Percentile with linear interpolation between closest ranks
///
/// `q` is in percent. Returns `None` for an empty slice.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;

    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}
