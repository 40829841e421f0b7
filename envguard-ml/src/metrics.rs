//! Regression fit metrics

/// Coefficient of determination (R²)
///
/// `1 - SS_res / SS_tot`. Best possible score is 1.0; it can be negative
/// for a model worse than predicting the mean. A constant `actual` scores
/// 1.0 when predicted perfectly and 0.0 otherwise. Mismatched or empty
/// inputs return NaN.
///
/// ```rust
/// use envguard_ml::r2_score;
///
/// let actual = [1.0, 2.0, 3.0];
/// assert_eq!(r2_score(&actual, &actual), 1.0);
/// ```
pub fn r2_score(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.len() != predicted.len() || actual.is_empty() {
        return f64::NAN;
    }

    let mean = actual.iter().sum::<f64>() / actual.len() as f64;

    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    let ss_res: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).powi(2))
        .sum();

    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }

    1.0 - ss_res / ss_tot
}
