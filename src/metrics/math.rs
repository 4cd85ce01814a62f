//! Numeric helpers shared by the statistics and comparison modules.
//!
//! All zero-division handling for ratios lives in [`safe_ratio`]: a zero
//! denominator yields `0.0`. Callers that must tell "no baseline" apart from
//! "no change" have to check the denominator themselves.

/// Return `numer / denom`, or `0.0` when `denom` is zero.
#[must_use]
pub fn safe_ratio(numer: f64, denom: f64) -> f64 {
    if denom == 0.0 {
        0.0
    } else {
        numer / denom
    }
}

/// [`safe_ratio`] scaled to a percentage.
#[must_use]
pub fn safe_percentage(numer: f64, denom: f64) -> f64 {
    safe_ratio(numer, denom) * 100.0
}

/// Arithmetic mean; `0.0` for an empty slice.
#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample (N-1) standard deviation; NaN for fewer than two values.
#[must_use]
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / (values.len() as f64 - 1.0)).sqrt()
}

/// Smallest value; `0.0` for an empty slice.
#[must_use]
pub fn min(values: &[f64]) -> f64 {
    values.iter().copied().reduce(f64::min).unwrap_or(0.0)
}

/// Largest value; `0.0` for an empty slice.
#[must_use]
pub fn max(values: &[f64]) -> f64 {
    values.iter().copied().reduce(f64::max).unwrap_or(0.0)
}

/// Median; `0.0` for an empty slice.
#[must_use]
pub fn median(values: &[f64]) -> f64 {
    percentile(&sorted(values), 50.0)
}

/// Ascending copy of `values`.
#[must_use]
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(f64::total_cmp);
    out
}

/// Return the `pct` percentile (0-100) of an ascending-sorted slice.
///
/// Interpolates linearly between the two closest ranks, so `pct = 0` is the
/// minimum and `pct = 100` the maximum. `0.0` for an empty slice.
#[must_use]
pub fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (pct / 100.0) * (sorted.len() as f64 - 1.0);
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let lo = lo.min(sorted.len() - 1);
    let hi = hi.min(sorted.len() - 1);
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

/// Ordinary least squares slope of `values` against their 0-based index.
///
/// `0.0` for fewer than two values.
#[must_use]
pub fn ols_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let x_mean = (n as f64 - 1.0) / 2.0;
    let y_mean = mean(values);
    let mut num = 0.0;
    let mut den = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }
    safe_ratio(num, den)
}
