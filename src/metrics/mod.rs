//! Metric observations and the analytics computed over them.
//!
//! This module provides:
//! - `Observation`: one numeric reading for a team and metric
//! - `statistics`: descriptive statistics, percentiles, trends, and outliers
//! - `comparison`: team comparisons, benchmark gaps, and normalized rankings
//! - `benchmarks`: the static benchmark catalog
//!
//! Every analytics function is pure and synchronous. They take a borrowed
//! slice of observations and never touch storage.

pub mod benchmarks;
pub mod comparison;
pub mod math;
pub mod statistics;

pub use benchmarks::{BenchmarkCatalog, BenchmarkEntry};
pub use comparison::*;
pub use statistics::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single numeric metric reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Team that produced the reading.
    pub team: String,
    /// Metric name (e.g., "velocity").
    pub metric: String,
    /// Observed value.
    pub value: f64,
    /// When the value was observed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    /// Optional metric category (e.g., "quality").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Optional unit of measure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Optional project the reading belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Observation {
    /// Create an undated observation.
    pub fn new(team: impl Into<String>, metric: impl Into<String>, value: f64) -> Self {
        Self {
            team: team.into(),
            metric: metric.into(),
            value,
            date: None,
            category: None,
            unit: None,
            project: None,
            notes: None,
        }
    }

    /// Set the observation date
    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    /// Set the category
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Set the unit
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Set the project
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Set notes
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Whether the row satisfies the observation invariants: non-empty team
    /// and metric, finite value.
    pub fn is_valid(&self) -> bool {
        !self.team.trim().is_empty() && !self.metric.trim().is_empty() && self.value.is_finite()
    }

    /// Value of a grouping key for this observation, if present.
    pub fn key(&self, key: GroupKey) -> Option<&str> {
        match key {
            GroupKey::Team => Some(self.team.as_str()),
            GroupKey::Metric => Some(self.metric.as_str()),
            GroupKey::Category => self.category.as_deref(),
            GroupKey::Unit => self.unit.as_deref(),
            GroupKey::Project => self.project.as_deref(),
        }
    }
}

/// Observation attribute used for grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKey {
    /// Group by team.
    Team,
    /// Group by metric name.
    Metric,
    /// Group by category.
    Category,
    /// Group by unit.
    Unit,
    /// Group by project.
    Project,
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupKey::Team => write!(f, "team"),
            GroupKey::Metric => write!(f, "metric"),
            GroupKey::Category => write!(f, "category"),
            GroupKey::Unit => write!(f, "unit"),
            GroupKey::Project => write!(f, "project"),
        }
    }
}

impl std::str::FromStr for GroupKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "team" => Ok(GroupKey::Team),
            "metric" => Ok(GroupKey::Metric),
            "category" => Ok(GroupKey::Category),
            "unit" => Ok(GroupKey::Unit),
            "project" => Ok(GroupKey::Project),
            _ => Err(format!("Unknown group key: {}", s)),
        }
    }
}

/// Inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// First instant included.
    pub start: DateTime<Utc>,
    /// Last instant included.
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// Create a new inclusive range
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Whether `date` falls inside the range, bounds included.
    pub fn contains(&self, date: &DateTime<Utc>) -> bool {
        *date >= self.start && *date <= self.end
    }
}

/// Filter applied by an observation source.
///
/// Empty lists and `None` bounds do not filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricFilter {
    /// Restrict to these teams.
    #[serde(default)]
    pub teams: Vec<String>,
    /// Restrict to these metrics.
    #[serde(default)]
    pub metrics: Vec<String>,
    /// Restrict to these projects.
    #[serde(default)]
    pub projects: Vec<String>,
    /// Earliest date (inclusive).
    pub start: Option<DateTime<Utc>>,
    /// Latest date (inclusive).
    pub end: Option<DateTime<Utc>>,
}

impl MetricFilter {
    /// Filter that matches everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to the given teams
    pub fn with_teams<I, S>(mut self, teams: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.teams = teams.into_iter().map(Into::into).collect();
        self
    }

    /// Restrict to the given metrics
    pub fn with_metrics<I, S>(mut self, metrics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metrics = metrics.into_iter().map(Into::into).collect();
        self
    }

    /// Restrict to the given projects
    pub fn with_projects<I, S>(mut self, projects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projects = projects.into_iter().map(Into::into).collect();
        self
    }

    /// Restrict to an inclusive date window
    pub fn between(mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    /// Whether an observation passes the filter.
    ///
    /// A date bound excludes undated observations.
    pub fn matches(&self, obs: &Observation) -> bool {
        if !self.teams.is_empty() && !self.teams.iter().any(|t| *t == obs.team) {
            return false;
        }
        if !self.metrics.is_empty() && !self.metrics.iter().any(|m| *m == obs.metric) {
            return false;
        }
        if !self.projects.is_empty() {
            match &obs.project {
                Some(p) if self.projects.iter().any(|x| x == p) => {}
                _ => return false,
            }
        }
        if let Some(start) = self.start {
            match obs.date {
                Some(d) if d >= start => {}
                _ => return false,
            }
        }
        if let Some(end) = self.end {
            match obs.date {
                Some(d) if d <= end => {}
                _ => return false,
            }
        }
        true
    }
}

/// Values recorded for `metric`, in input order.
pub(crate) fn metric_values(observations: &[Observation], metric: &str) -> Vec<f64> {
    observations
        .iter()
        .filter(|o| o.metric == metric)
        .map(|o| o.value)
        .collect()
}

/// Values recorded for `metric` by `team`, in input order.
pub(crate) fn team_metric_values(observations: &[Observation], team: &str, metric: &str) -> Vec<f64> {
    observations
        .iter()
        .filter(|o| o.metric == metric && o.team == team)
        .map(|o| o.value)
        .collect()
}
