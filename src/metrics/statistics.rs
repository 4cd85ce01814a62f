//! Descriptive statistics, percentiles, trends, outliers, and aggregation
//! over a metric table.

use std::collections::BTreeMap;

use serde::Serialize;

use super::math;
use super::{metric_values, GroupKey, Observation};
use crate::error::{AnalyticsError, AnalyticsResult};

/// Percentiles reported when the caller does not choose any.
pub const DEFAULT_PERCENTILES: [f64; 5] = [25.0, 50.0, 75.0, 90.0, 95.0];

/// Minimum number of observations for a trend fit.
pub const MIN_TREND_POINTS: usize = 2;

/// Z-score above which a value is flagged as an outlier.
pub const ZSCORE_THRESHOLD: f64 = 3.0;

/// Multiplier applied to the IQR when deriving outlier fences.
pub const IQR_FENCE: f64 = 1.5;

/// Descriptive statistics for a set of values.
///
/// `std` is the sample standard deviation and is NaN for fewer than two
/// values. With `count == 0` every other field is meaningless; check the count
/// before trusting them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Statistics {
    /// Number of observations.
    pub count: usize,
    /// Arithmetic mean.
    pub mean: f64,
    /// Sample standard deviation.
    pub std: f64,
    /// Minimum value.
    pub min: f64,
    /// Maximum value.
    pub max: f64,
    /// Median value.
    pub median: f64,
}

impl Statistics {
    /// Compute statistics for a set of values.
    pub fn from_values(values: &[f64]) -> Self {
        Self {
            count: values.len(),
            mean: math::mean(values),
            std: math::sample_std(values),
            min: math::min(values),
            max: math::max(values),
            median: math::median(values),
        }
    }

    /// Whether no observations contributed.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Statistics for every observation of `metric`.
pub fn statistics(observations: &[Observation], metric: &str) -> Statistics {
    Statistics::from_values(&metric_values(observations, metric))
}

/// Statistics for `metric`, one entry per distinct value of `group_by`.
///
/// Observations without a value for the grouping key are left out.
pub fn grouped_statistics(
    observations: &[Observation],
    metric: &str,
    group_by: GroupKey,
) -> BTreeMap<String, Statistics> {
    let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for obs in observations.iter().filter(|o| o.metric == metric) {
        if let Some(key) = obs.key(group_by) {
            groups.entry(key.to_string()).or_default().push(obs.value);
        }
    }
    groups
        .into_iter()
        .map(|(key, values)| (key, Statistics::from_values(&values)))
        .collect()
}

/// A single percentile result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PercentileValue {
    /// Requested percentile (0-100).
    pub percentile: f64,
    /// Interpolated value at that percentile.
    pub value: f64,
}

/// Percentile results in the order they were requested.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Percentiles(Vec<PercentileValue>);

impl Percentiles {
    /// Value computed for percentile `p`, if it was requested.
    pub fn get(&self, p: f64) -> Option<f64> {
        self.0.iter().find(|pv| pv.percentile == p).map(|pv| pv.value)
    }

    /// Number of percentiles computed.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing was computed (no observations).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the results.
    pub fn iter(&self) -> impl Iterator<Item = &PercentileValue> {
        self.0.iter()
    }
}

/// Percentiles of `metric` using linear interpolation between ranks.
///
/// Returns an empty result when there are no observations.
///
/// # Errors
/// `InvalidPercentile` when a requested percentile is outside 0-100.
pub fn percentiles(
    observations: &[Observation],
    metric: &str,
    requested: &[f64],
) -> AnalyticsResult<Percentiles> {
    if let Some(bad) = requested.iter().find(|p| !(0.0..=100.0).contains(*p)) {
        return Err(AnalyticsError::InvalidPercentile { value: *bad });
    }

    let sorted = math::sorted(&metric_values(observations, metric));
    if sorted.is_empty() {
        return Ok(Percentiles::default());
    }

    Ok(Percentiles(
        requested
            .iter()
            .map(|&p| PercentileValue {
                percentile: p,
                value: math::percentile(&sorted, p),
            })
            .collect(),
    ))
}

/// Direction of a fitted trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    /// Positive slope.
    Increasing,
    /// Negative slope.
    Decreasing,
    /// Zero slope.
    Stable,
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendDirection::Increasing => write!(f, "increasing"),
            TrendDirection::Decreasing => write!(f, "decreasing"),
            TrendDirection::Stable => write!(f, "stable"),
        }
    }
}

/// Trend analysis of a metric over time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trend {
    /// Sign of the slope.
    pub direction: TrendDirection,
    /// OLS slope of value per observation step.
    pub slope: f64,
    /// Mean of the earlier half of the sorted sequence.
    pub first_half_mean: f64,
    /// Mean of the later half of the sorted sequence.
    pub second_half_mean: f64,
    /// Change between the half means, in percent; 0 when the first half mean is 0.
    pub percentage_change: f64,
    /// Number of observations used.
    pub data_points: usize,
}

/// Fit a linear trend to `metric` over time.
///
/// Observations are ordered by date (undated ones last, input order kept for
/// ties) and regressed against their position, so the spacing between dates
/// does not affect the slope.
///
/// # Errors
/// - `MissingDate` when no observation of the metric carries a date
/// - `InsufficientData` when fewer than two observations match
pub fn trend(observations: &[Observation], metric: &str) -> AnalyticsResult<Trend> {
    let mut slice: Vec<&Observation> = observations.iter().filter(|o| o.metric == metric).collect();

    if !slice.is_empty() && slice.iter().all(|o| o.date.is_none()) {
        return Err(AnalyticsError::MissingDate {
            metric: metric.to_string(),
        });
    }
    if slice.len() < MIN_TREND_POINTS {
        return Err(AnalyticsError::InsufficientData {
            metric: metric.to_string(),
            required: MIN_TREND_POINTS,
            found: slice.len(),
        });
    }

    slice.sort_by_key(|o| (o.date.is_none(), o.date));
    let values: Vec<f64> = slice.iter().map(|o| o.value).collect();

    let slope = math::ols_slope(&values);
    let direction = if slope > 0.0 {
        TrendDirection::Increasing
    } else if slope < 0.0 {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    };

    let mid = values.len() / 2;
    let first_half_mean = math::mean(&values[..mid]);
    let second_half_mean = math::mean(&values[mid..]);

    Ok(Trend {
        direction,
        slope,
        first_half_mean,
        second_half_mean,
        percentage_change: math::safe_percentage(
            second_half_mean - first_half_mean,
            first_half_mean,
        ),
        data_points: values.len(),
    })
}

/// Outlier detection method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierMethod {
    /// Tukey fences at 1.5 IQR beyond the quartiles.
    #[default]
    Iqr,
    /// Absolute z-score above 3.
    ZScore,
}

impl std::fmt::Display for OutlierMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutlierMethod::Iqr => write!(f, "iqr"),
            OutlierMethod::ZScore => write!(f, "zscore"),
        }
    }
}

impl std::str::FromStr for OutlierMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "iqr" => Ok(OutlierMethod::Iqr),
            "zscore" | "z-score" => Ok(OutlierMethod::ZScore),
            _ => Err(format!("Unknown outlier method: {}", s)),
        }
    }
}

/// An observation tagged with its outlier flag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlaggedObservation {
    /// The original observation.
    #[serde(flatten)]
    pub observation: Observation,
    /// Whether the value falls outside the method's bounds.
    pub is_outlier: bool,
}

/// Flag outliers among the observations of `metric`.
///
/// Bounds are computed over the whole metric slice, not per team. Only
/// observations of `metric` are returned, in input order.
pub fn detect_outliers(
    observations: &[Observation],
    metric: &str,
    method: OutlierMethod,
) -> Vec<FlaggedObservation> {
    let slice: Vec<&Observation> = observations.iter().filter(|o| o.metric == metric).collect();
    let values: Vec<f64> = slice.iter().map(|o| o.value).collect();

    let is_outlier: Box<dyn Fn(f64) -> bool> = match method {
        OutlierMethod::Iqr => {
            let sorted = math::sorted(&values);
            let q1 = math::percentile(&sorted, 25.0);
            let q3 = math::percentile(&sorted, 75.0);
            let iqr = q3 - q1;
            let lower = q1 - IQR_FENCE * iqr;
            let upper = q3 + IQR_FENCE * iqr;
            Box::new(move |v| v < lower || v > upper)
        }
        OutlierMethod::ZScore => {
            let mean = math::mean(&values);
            let std = math::sample_std(&values);
            // NaN std (single value) or zero spread: nothing can stand out.
            if std.is_nan() || std == 0.0 {
                Box::new(|_| false)
            } else {
                Box::new(move |v| ((v - mean) / std).abs() > ZSCORE_THRESHOLD)
            }
        }
    };

    slice
        .into_iter()
        .map(|obs| FlaggedObservation {
            is_outlier: is_outlier(obs.value),
            observation: obs.clone(),
        })
        .collect()
}

/// Aggregation function applied to grouped values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Arithmetic mean.
    #[default]
    Mean,
    /// Sum of values.
    Sum,
    /// Largest value.
    Max,
    /// Smallest value.
    Min,
    /// Number of values.
    Count,
}

impl Aggregation {
    /// Apply the aggregation to a non-empty set of values.
    pub fn apply(&self, values: &[f64]) -> f64 {
        match self {
            Aggregation::Mean => math::mean(values),
            Aggregation::Sum => values.iter().sum(),
            Aggregation::Max => math::max(values),
            Aggregation::Min => math::min(values),
            Aggregation::Count => values.len() as f64,
        }
    }
}

impl std::fmt::Display for Aggregation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Aggregation::Mean => write!(f, "mean"),
            Aggregation::Sum => write!(f, "sum"),
            Aggregation::Max => write!(f, "max"),
            Aggregation::Min => write!(f, "min"),
            Aggregation::Count => write!(f, "count"),
        }
    }
}

impl std::str::FromStr for Aggregation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mean" => Ok(Aggregation::Mean),
            "sum" => Ok(Aggregation::Sum),
            "max" => Ok(Aggregation::Max),
            "min" => Ok(Aggregation::Min),
            "count" => Ok(Aggregation::Count),
            _ => Err(format!("Unknown aggregation: {}", s)),
        }
    }
}

/// One aggregated group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    /// Group key values, in the order the keys were requested.
    pub key: Vec<String>,
    /// Aggregated value.
    pub value: f64,
    /// Number of observations in the group.
    pub count: usize,
}

/// Aggregate values grouped by one or more observation attributes.
///
/// Rows are sorted by key. Observations missing any requested key are left out.
pub fn aggregate(
    observations: &[Observation],
    group_by: &[GroupKey],
    aggregation: Aggregation,
) -> Vec<AggregateRow> {
    let mut groups: BTreeMap<Vec<String>, Vec<f64>> = BTreeMap::new();
    for obs in observations {
        let key: Option<Vec<String>> = group_by
            .iter()
            .map(|k| obs.key(*k).map(str::to_string))
            .collect();
        if let Some(key) = key {
            groups.entry(key).or_default().push(obs.value);
        }
    }
    groups
        .into_iter()
        .map(|(key, values)| AggregateRow {
            key,
            value: aggregation.apply(&values),
            count: values.len(),
        })
        .collect()
}

#[cfg(test)]
#[path = "statistics_tests.rs"]
mod statistics_tests;
