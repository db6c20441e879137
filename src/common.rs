//! Common numeric helpers shared by the backtest modules
//!
//! Every helper follows the same convention: an undefined result is `f64::NAN`,
//! never `0.0` and never a panic.

/// Initialize a result vector with NaN values
#[inline]
pub fn nan_vec(len: usize) -> Vec<f64> {
    vec![f64::NAN; len]
}

/// Check if we have enough data for the given lookback
#[inline]
pub fn has_enough_data(len: usize, period: usize) -> bool {
    len >= period && period > 0
}

/// Calculate the sum of a slice
#[inline]
pub fn sum(values: &[f64]) -> f64 {
    values.iter().sum()
}

/// Calculate the mean of a slice
#[inline]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    sum(values) / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator).
///
/// NaN for fewer than two values.
pub fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1) as f64;
    var.sqrt()
}

/// Percentile with linear interpolation between closest ranks.
///
/// `pct` is in `[0, 100]`. Matches numpy's default `percentile`.
pub fn percentile(values: &[f64], pct: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let idx = (pct / 100.0) * (sorted.len() - 1) as f64;
    let lo = idx.floor() as usize;
    let hi = idx.ceil() as usize;
    if lo == hi || hi >= sorted.len() {
        return sorted[lo.min(sorted.len() - 1)];
    }
    let frac = idx - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Period-over-period fractional change.
///
/// Output has the same length as the input; the first entry is NaN and any
/// step touching a NaN stays NaN.
pub fn pct_change(values: &[f64]) -> Vec<f64> {
    let mut result = nan_vec(values.len());
    for i in 1..values.len() {
        result[i] = values[i] / values[i - 1] - 1.0;
    }
    result
}

/// Cumulative product of `1 + r`
pub fn cumulative_growth(returns: &[f64]) -> Vec<f64> {
    let mut acc = 1.0;
    returns
        .iter()
        .map(|r| {
            acc *= 1.0 + r;
            acc
        })
        .collect()
}

/// Dot product of two equally sized slices
#[inline]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nan_vec() {
        let v = nan_vec(5);
        assert_eq!(v.len(), 5);
        assert!(v.iter().all(|x| x.is_nan()));
    }

    #[test]
    fn test_sum() {
        assert_eq!(sum(&[1.0, 2.0, 3.0]), 6.0);
        assert_eq!(sum(&[]), 0.0);
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[2.0, 4.0, 6.0]), 4.0);
        assert!(mean(&[]).is_nan());
    }

    #[test]
    fn test_sample_std() {
        // var = ((1-2.5)^2 + (2-2.5)^2 + (3-2.5)^2 + (4-2.5)^2) / 3 = 5/3
        let s = sample_std(&[1.0, 2.0, 3.0, 4.0]);
        assert!((s - (5.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert!(sample_std(&[1.0]).is_nan());
        assert_eq!(sample_std(&[0.5, 0.5, 0.5]), 0.0);
    }

    #[test]
    fn test_percentile_interpolates() {
        let v = vec![4.0, 1.0, 3.0, 2.0, 5.0];
        assert_eq!(percentile(&v, 0.0), 1.0);
        assert_eq!(percentile(&v, 100.0), 5.0);
        assert_eq!(percentile(&v, 50.0), 3.0);
        // idx = 0.05 * 4 = 0.2 -> 1 + 0.2 * (2 - 1)
        assert!((percentile(&v, 5.0) - 1.2).abs() < 1e-12);
        assert!(percentile(&[], 5.0).is_nan());
    }

    #[test]
    fn test_pct_change() {
        let r = pct_change(&[100.0, 110.0, 99.0]);
        assert!(r[0].is_nan());
        assert!((r[1] - 0.10).abs() < 1e-12);
        assert!((r[2] + 0.10).abs() < 1e-12);

        let gap = pct_change(&[1.0, f64::NAN, 2.0]);
        assert!(gap[1].is_nan() && gap[2].is_nan());
    }

    #[test]
    fn test_cumulative_growth() {
        let g = cumulative_growth(&[0.1, -0.5, 1.0]);
        assert!((g[0] - 1.1).abs() < 1e-12);
        assert!((g[1] - 0.55).abs() < 1e-12);
        assert!((g[2] - 1.1).abs() < 1e-12);
    }
}
