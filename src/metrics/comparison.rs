//! Team comparisons, benchmark gap analysis, and normalized rankings.
//!
//! Every operation here is stateless: it reads a borrowed metric table and
//! returns plain rows. Percentages go through [`math::safe_percentage`], so a
//! zero denominator always reports `0.0` rather than infinity or NaN.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use super::math;
use super::statistics::{Aggregation, Statistics};
use super::{team_metric_values, DateRange, Observation};
use crate::error::{AnalyticsError, AnalyticsResult};

/// Minimum number of teams for a team-vs-team comparison.
pub const MIN_COMPARISON_TEAMS: usize = 2;

/// Score given to every team on a metric where all teams tie.
pub const NEUTRAL_SCORE: f64 = 50.0;

/// Multiplier applied to a plan's current value to suggest a target.
pub const DEFAULT_TARGET_UPLIFT: f64 = 1.1;

/// Descriptive statistics for one team on one metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamComparison {
    /// Metric name.
    pub metric: String,
    /// Team name.
    pub team: String,
    /// Statistics over the team's observations.
    #[serde(flatten)]
    pub stats: Statistics,
}

/// Compare teams across metrics.
///
/// Rows come out grouped by metric (in `metrics` order), then by team (in
/// `teams` order). A team with no observations for a metric gets no row.
///
/// # Errors
/// `InsufficientTeams` when fewer than two teams are requested.
pub fn team_vs_team(
    observations: &[Observation],
    teams: &[String],
    metrics: &[String],
) -> AnalyticsResult<Vec<TeamComparison>> {
    if teams.len() < MIN_COMPARISON_TEAMS {
        return Err(AnalyticsError::InsufficientTeams {
            required: MIN_COMPARISON_TEAMS,
            found: teams.len(),
        });
    }

    let mut rows = Vec::new();
    for metric in metrics {
        for team in teams {
            let values = team_metric_values(observations, team, metric);
            if values.is_empty() {
                continue;
            }
            rows.push(TeamComparison {
                metric: metric.clone(),
                team: team.clone(),
                stats: Statistics::from_values(&values),
            });
        }
    }
    Ok(rows)
}

/// Difference between a team and the baseline team on one metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamDifference {
    /// Metric name.
    pub metric: String,
    /// Compared team.
    pub team: String,
    /// Baseline team.
    pub baseline_team: String,
    /// Baseline mean (0 when the baseline has no observations).
    pub baseline_value: f64,
    /// Team mean (0 when the team has no observations).
    pub team_value: f64,
    /// `team_value - baseline_value`.
    pub absolute_difference: f64,
    /// Relative difference in percent; 0 when `baseline_value` is 0.
    pub percentage_difference: f64,
}

/// Differences of each compared team relative to a baseline team.
///
/// A zero baseline reports `percentage_difference == 0`, the same as "no
/// change". Callers alerting on this value must check `baseline_value == 0`
/// themselves.
pub fn calculate_differences(
    observations: &[Observation],
    baseline_team: &str,
    compare_teams: &[String],
    metrics: &[String],
) -> Vec<TeamDifference> {
    let mut rows = Vec::with_capacity(metrics.len() * compare_teams.len());
    for metric in metrics {
        let baseline_value = math::mean(&team_metric_values(observations, baseline_team, metric));
        for team in compare_teams {
            let team_value = math::mean(&team_metric_values(observations, team, metric));
            let absolute_difference = team_value - baseline_value;
            rows.push(TeamDifference {
                metric: metric.clone(),
                team: team.clone(),
                baseline_team: baseline_team.to_string(),
                baseline_value,
                team_value,
                absolute_difference,
                percentage_difference: math::safe_percentage(absolute_difference, baseline_value),
            });
        }
    }
    rows
}

/// Best and worst team on a metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestWorst {
    /// Metric name.
    pub metric: String,
    /// Team with the best mean.
    pub best_team: String,
    /// Best team's mean.
    pub best_value: f64,
    /// Team with the worst mean.
    pub worst_team: String,
    /// Worst team's mean.
    pub worst_value: f64,
    /// Spread between the highest and lowest team means.
    pub range: f64,
}

/// Team mean per team for `metric`, keyed and ordered by team name.
fn team_means(observations: &[Observation], metric: &str) -> BTreeMap<String, f64> {
    let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for obs in observations.iter().filter(|o| o.metric == metric) {
        groups.entry(obs.team.clone()).or_default().push(obs.value);
    }
    groups
        .into_iter()
        .map(|(team, values)| (team, math::mean(&values)))
        .collect()
}

/// First entry holding the extreme value; `better` decides whether a
/// candidate replaces the current pick.
fn pick_extreme<'a>(
    means: &'a BTreeMap<String, f64>,
    better: impl Fn(f64, f64) -> bool,
) -> Option<(&'a String, f64)> {
    let mut picked: Option<(&String, f64)> = None;
    for (team, value) in means {
        match picked {
            Some((_, current)) if !better(*value, current) => {}
            _ => picked = Some((team, *value)),
        }
    }
    picked
}

/// Identify the best and worst team for each metric by team mean.
///
/// `higher_is_better` defaults to `true` for metrics it does not mention.
/// Metrics with no observations are skipped. On ties the team that sorts
/// first by name is reported; the tie-break carries no meaning.
pub fn identify_best_worst(
    observations: &[Observation],
    metrics: &[String],
    higher_is_better: &HashMap<String, bool>,
) -> Vec<BestWorst> {
    let mut rows = Vec::new();
    for metric in metrics {
        let means = team_means(observations, metric);
        let (Some((max_team, max_value)), Some((min_team, min_value))) = (
            pick_extreme(&means, |a, b| a > b),
            pick_extreme(&means, |a, b| a < b),
        ) else {
            continue;
        };

        let ((best_team, best_value), (worst_team, worst_value)) =
            if higher_is_better.get(metric).copied().unwrap_or(true) {
                ((max_team, max_value), (min_team, min_value))
            } else {
                ((min_team, min_value), (max_team, max_value))
            };

        rows.push(BestWorst {
            metric: metric.clone(),
            best_team: best_team.clone(),
            best_value,
            worst_team: worst_team.clone(),
            worst_value,
            range: max_value - min_value,
        });
    }
    rows
}

/// Actual performance against a benchmark for one metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkResult {
    /// Metric name.
    pub metric: String,
    /// Mean over the (optionally team-filtered) observations.
    pub actual_mean: f64,
    /// Benchmark target (0 when none was supplied).
    pub benchmark: f64,
    /// `actual_mean - benchmark`.
    pub gap: f64,
    /// Gap relative to the benchmark, in percent.
    pub gap_percentage: f64,
    /// Actual mean relative to the benchmark, in percent.
    pub achievement_percentage: f64,
    /// Whether the benchmark is met. A benchmark of zero or below is never met.
    pub meets_benchmark: bool,
}

/// Compare metric means against benchmark targets.
///
/// A metric missing from `benchmarks` is compared against 0. When `teams` is
/// given only those teams' observations count. Metrics with no matching
/// observations are skipped.
pub fn benchmark_comparison(
    observations: &[Observation],
    benchmarks: &HashMap<String, f64>,
    metrics: &[String],
    teams: Option<&[String]>,
) -> Vec<BenchmarkResult> {
    let in_scope = |obs: &&Observation| match teams {
        Some(teams) if !teams.is_empty() => teams.iter().any(|t| *t == obs.team),
        _ => true,
    };

    let mut rows = Vec::new();
    for metric in metrics {
        let values: Vec<f64> = observations
            .iter()
            .filter(|o| o.metric == *metric)
            .filter(in_scope)
            .map(|o| o.value)
            .collect();
        if values.is_empty() {
            continue;
        }

        let actual_mean = math::mean(&values);
        let benchmark = benchmarks.get(metric).copied().unwrap_or(0.0);
        let gap = actual_mean - benchmark;

        rows.push(BenchmarkResult {
            metric: metric.clone(),
            actual_mean,
            benchmark,
            gap,
            gap_percentage: math::safe_percentage(gap, benchmark),
            achievement_percentage: math::safe_percentage(actual_mean, benchmark),
            meets_benchmark: benchmark > 0.0 && actual_mean >= benchmark,
        });
    }
    rows
}

/// A team's position in the cross-metric ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamRanking {
    /// Team name.
    pub team: String,
    /// Mean of the team's per-metric normalized scores (0-100).
    pub normalized_score: f64,
    /// 1-based rank; no two teams share a rank.
    pub rank: usize,
}

/// Rank teams by their normalized scores across metrics.
///
/// Each team's values are aggregated per metric, min-max scaled to 0-100
/// across teams, then averaged over the metrics the team has data for. A
/// metric on which every team ties scores [`NEUTRAL_SCORE`] for all of them.
/// Teams with equal scores keep the order in which they first appear in
/// `observations`.
pub fn performance_ranking(
    observations: &[Observation],
    metrics: &[String],
    aggregation: Aggregation,
) -> Vec<TeamRanking> {
    let mut team_order: Vec<&str> = Vec::new();
    for obs in observations.iter().filter(|o| metrics.contains(&o.metric)) {
        if !team_order.contains(&obs.team.as_str()) {
            team_order.push(obs.team.as_str());
        }
    }

    let mut scores: HashMap<&str, Vec<f64>> = HashMap::new();
    for metric in metrics {
        let aggregated: Vec<(&str, f64)> = team_order
            .iter()
            .filter_map(|team| {
                let values = team_metric_values(observations, team, metric);
                (!values.is_empty()).then(|| (*team, aggregation.apply(&values)))
            })
            .collect();
        if aggregated.is_empty() {
            continue;
        }

        let values: Vec<f64> = aggregated.iter().map(|(_, v)| *v).collect();
        let (lo, hi) = (math::min(&values), math::max(&values));
        let range = hi - lo;

        for (team, value) in aggregated {
            let score = if range == 0.0 {
                NEUTRAL_SCORE
            } else {
                (value - lo) / range * 100.0
            };
            scores.entry(team).or_default().push(score);
        }
    }

    let mut ranked: Vec<(&str, f64)> = team_order
        .into_iter()
        .filter_map(|team| scores.get(team).map(|s| (team, math::mean(s))))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    ranked
        .into_iter()
        .enumerate()
        .map(|(i, (team, normalized_score))| TeamRanking {
            team: team.to_string(),
            normalized_score,
            rank: i + 1,
        })
        .collect()
}

/// Comparison of a metric between two date ranges.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodComparison {
    /// Metric name.
    pub metric: String,
    /// First period.
    pub period1: DateRange,
    /// Mean in the first period (0 when empty).
    pub period1_mean: f64,
    /// Observations in the first period.
    pub period1_count: usize,
    /// Second period.
    pub period2: DateRange,
    /// Mean in the second period (0 when empty).
    pub period2_mean: f64,
    /// Observations in the second period.
    pub period2_count: usize,
    /// Change from period 1 to period 2, in percent of period 1. Signed by
    /// `period1_mean`, so a negative first-period mean flips the sign; 0 when
    /// `period1_mean` is 0.
    pub change_percentage: f64,
    /// `period2_mean - period1_mean`.
    pub absolute_change: f64,
}

/// Compare a metric across two inclusive date ranges.
///
/// An empty period, or a table with no rows for the metric, reports mean 0
/// and count 0. Undated observations belong to neither period.
/// `change_percentage` is `absolute_change / period1_mean * 100`, so it is 0
/// for a zero first-period mean and keeps the divisor's sign otherwise.
///
/// # Errors
/// `MissingDate` when the metric has observations but none of them is dated.
pub fn time_period_comparison(
    observations: &[Observation],
    metric: &str,
    period1: DateRange,
    period2: DateRange,
) -> AnalyticsResult<PeriodComparison> {
    let slice: Vec<&Observation> = observations.iter().filter(|o| o.metric == metric).collect();

    if !slice.is_empty() && slice.iter().all(|o| o.date.is_none()) {
        return Err(AnalyticsError::MissingDate {
            metric: metric.to_string(),
        });
    }

    let in_period = |range: &DateRange| -> Vec<f64> {
        slice
            .iter()
            .filter(|o| o.date.as_ref().is_some_and(|d| range.contains(d)))
            .map(|o| o.value)
            .collect()
    };

    let first = in_period(&period1);
    let second = in_period(&period2);
    let period1_mean = math::mean(&first);
    let period2_mean = math::mean(&second);
    let absolute_change = period2_mean - period1_mean;

    Ok(PeriodComparison {
        metric: metric.to_string(),
        period1,
        period1_mean,
        period1_count: first.len(),
        period2,
        period2_mean,
        period2_count: second.len(),
        change_percentage: math::safe_percentage(absolute_change, period1_mean),
        absolute_change,
    })
}

/// Current observed value of a team on a metric: the mean of its
/// observations, or 0 when there are none. Used to seed mitigation plans.
pub fn current_value(observations: &[Observation], team: &str, metric: &str) -> f64 {
    math::mean(&team_metric_values(observations, team, metric))
}

/// Suggested target for a plan starting at `current`.
pub fn default_target(current: f64) -> f64 {
    current * DEFAULT_TARGET_UPLIFT
}

#[cfg(test)]
#[path = "comparison_tests.rs"]
mod comparison_tests;
