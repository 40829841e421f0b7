//! Seeded train/test partitioning

use crate::Rng;

/// Shuffle `0..n` with a seeded generator and split it into
/// `(train, test)` index sets
///
/// The test set holds `ceil(test_fraction · n)` indices, clamped so the
/// training set keeps at least one row when `n > 0`.
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    Rng::new(seed).shuffle(&mut indices);

    let n_test = ((test_fraction * n as f64).ceil() as usize).min(n.saturating_sub(1));
    let train = indices.split_off(n_test);

    (train, indices)
}
