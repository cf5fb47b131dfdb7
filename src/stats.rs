//! Small numeric helpers shared by the analyzers
//!
//! Every ratio here is total: a zero denominator yields 0.0 rather than
//! NaN or infinity, so aggregates over empty batches stay well-defined.

/// `num / den`, or 0.0 when `den` is zero
pub fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// `num / den * 100`, or 0.0 when `den` is zero
pub fn percent(num: f64, den: f64) -> f64 {
    ratio(num, den) * 100.0
}

/// Clamp a score to [0, 1], mapping NaN to 0
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Clamp a percentage to [0, 100], mapping NaN to 0
pub fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// Arithmetic mean, 0.0 for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    ratio(values.iter().sum(), values.len() as f64)
}

/// Population variance, 0.0 for an empty slice
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let avg = mean(values);
    mean(&values.iter().map(|v| (v - avg).powi(2)).collect::<Vec<_>>())
}

/// Ordinary least-squares fit of `values` against their indices 0..n-1
///
/// Returns `(slope, intercept)`. With fewer than two points the line is
/// flat through the single value (or zero).
pub fn linear_regression(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    if values.len() < 2 {
        return (0.0, values.first().copied().unwrap_or(0.0));
    }

    let sum_x: f64 = (0..values.len()).map(|i| i as f64).sum();
    let sum_y: f64 = values.iter().sum();
    let sum_xy: f64 = values.iter().enumerate().map(|(i, y)| i as f64 * y).sum();
    let sum_x_squared: f64 = (0..values.len()).map(|i| (i as f64).powi(2)).sum();

    let denominator = n * sum_x_squared - sum_x * sum_x;
    let slope = ratio(n * sum_xy - sum_x * sum_y, denominator);
    let intercept = (sum_y - slope * sum_x) / n;

    (slope, intercept)
}

/// Percentile by nearest rank over an already sorted slice
pub fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((pct / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_zero_denominator() {
        assert_eq!(ratio(5.0, 0.0), 0.0);
        assert_eq!(percent(3.0, 0.0), 0.0);
        assert_eq!(percent(1.0, 4.0), 25.0);
    }

    #[test]
    fn test_variance() {
        assert_eq!(variance(&[]), 0.0);
        assert_eq!(variance(&[50.0, 50.0, 50.0]), 0.0);
        // Population variance of 80/100 alternating is 100
        assert!((variance(&[80.0, 100.0]) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_linear_regression_exact_line() {
        let (slope, intercept) = linear_regression(&[1.0, 3.0, 5.0, 7.0]);
        assert!((slope - 2.0).abs() < 1e-9);
        assert!((intercept - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_linear_regression_single_point() {
        assert_eq!(linear_regression(&[42.0]), (0.0, 42.0));
        assert_eq!(linear_regression(&[]), (0.0, 0.0));
    }

    #[test]
    fn test_percentile() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        assert_eq!(percentile(&sorted, 50.0), 5.0);
        assert_eq!(percentile(&sorted, 95.0), 10.0);
        assert_eq!(percentile(&[], 95.0), 0.0);
    }

    #[test]
    fn test_clamps() {
        assert_eq!(clamp_unit(1.4), 1.0);
        assert_eq!(clamp_unit(f64::NAN), 0.0);
        assert_eq!(clamp_percent(-3.0), 0.0);
        assert_eq!(clamp_percent(140.0), 100.0);
    }
}
