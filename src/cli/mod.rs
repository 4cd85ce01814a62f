//! Command-line front end.
//!
//! Every command runs against a [`CliContext`] and returns a [`CliResult`]
//! holding pretty JSON on success. Analytics conditions such as too few teams
//! or undated data come back as warnings with exit code 1.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use crate::error::{AnalyticsError, StorageError};
use crate::metrics::{
    self, Aggregation, BenchmarkCatalog, DateRange, GroupKey, MetricFilter, Observation,
    OutlierMethod, DEFAULT_PERCENTILES,
};
use crate::mitigation::{
    ActionItem, ActionItemUpdate, MitigationPlan, MitigationStore, NewActionItem, NewPlan,
    PlanUpdate, Priority, Progress, Status,
};
use crate::storage::{ObservationSource, SqliteStorage};

/// Team metrics analytics and mitigation tracking.
#[derive(Parser, Debug)]
#[command(name = "metricboard", version, about)]
pub struct Cli {
    /// Command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Observation selection shared by the analytics commands.
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Restrict to these teams (comma separated or repeated)
    #[arg(long = "team", value_delimiter = ',')]
    pub teams: Vec<String>,

    /// Restrict to these metrics (comma separated or repeated)
    #[arg(long = "metric", value_delimiter = ',')]
    pub metrics: Vec<String>,

    /// Restrict to these projects (comma separated or repeated)
    #[arg(long = "project", value_delimiter = ',')]
    pub projects: Vec<String>,

    /// Earliest date, inclusive (YYYY-MM-DD or RFC 3339)
    #[arg(long, value_parser = parse_date)]
    pub start: Option<DateTime<Utc>>,

    /// Latest date, inclusive (YYYY-MM-DD or RFC 3339)
    #[arg(long, value_parser = parse_date)]
    pub end: Option<DateTime<Utc>>,
}

impl FilterArgs {
    fn to_filter(&self) -> MetricFilter {
        MetricFilter::new()
            .with_teams(self.teams.iter().cloned())
            .with_metrics(self.metrics.iter().cloned())
            .with_projects(self.projects.iter().cloned())
            .between(self.start, self.end)
    }
}

/// Top-level commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Record one observation
    Record {
        /// Team name
        team: String,
        /// Metric name
        metric: String,
        /// Observed value
        #[arg(allow_negative_numbers = true)]
        value: f64,
        /// Observation date (YYYY-MM-DD or RFC 3339)
        #[arg(long, value_parser = parse_date)]
        date: Option<DateTime<Utc>>,
        /// Metric category
        #[arg(long)]
        category: Option<String>,
        /// Unit of measure
        #[arg(long)]
        unit: Option<String>,
        /// Project name
        #[arg(long)]
        project: Option<String>,
        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
    },

    /// List recorded teams
    Teams,

    /// List recorded metrics
    Metrics,

    /// List recorded projects
    Projects,

    /// Show record counts
    Summary,

    /// Descriptive statistics for a metric
    Stats {
        /// Metric name
        name: String,
        /// Report one entry per team, category, unit, or project
        #[arg(long)]
        group_by: Option<GroupKey>,
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Percentiles of a metric
    Percentiles {
        /// Metric name
        name: String,
        /// Percentiles to compute, 0-100
        #[arg(long = "at", value_delimiter = ',', allow_negative_numbers = true)]
        at: Vec<f64>,
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Linear trend of a metric over time
    Trend {
        /// Metric name
        name: String,
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Flag outliers of a metric
    Outliers {
        /// Metric name
        name: String,
        /// Detection method: iqr or zscore
        #[arg(long, default_value = "iqr")]
        method: OutlierMethod,
        /// Only print flagged observations
        #[arg(long)]
        only_flagged: bool,
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Aggregate values grouped by observation attributes
    Aggregate {
        /// Grouping keys (comma separated)
        #[arg(long, value_delimiter = ',', required = true)]
        group_by: Vec<GroupKey>,
        /// Aggregation: mean, sum, max, min, count
        #[arg(long, default_value = "mean")]
        agg: Aggregation,
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Compare statistics of the selected teams
    Compare {
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Differences of teams against a baseline team
    Diff {
        /// Baseline team
        baseline: String,
        /// Teams to compare (default: every other team); use instead of --team
        #[arg(long, value_delimiter = ',')]
        against: Vec<String>,
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Best and worst team per metric
    BestWorst {
        /// Metrics where a lower value is better
        #[arg(long, value_delimiter = ',')]
        lower_is_better: Vec<String>,
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Compare metric means against the benchmark catalog
    Benchmark {
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Rank teams by normalized score
    Rank {
        /// Aggregation applied per team before normalizing
        #[arg(long, default_value = "mean")]
        agg: Aggregation,
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Compare a metric between two date ranges
    Periods {
        /// Metric name
        name: String,
        /// First period start
        #[arg(long, value_parser = parse_date)]
        from1: DateTime<Utc>,
        /// First period end
        #[arg(long, value_parser = parse_date)]
        to1: DateTime<Utc>,
        /// Second period start
        #[arg(long, value_parser = parse_date)]
        from2: DateTime<Utc>,
        /// Second period end
        #[arg(long, value_parser = parse_date)]
        to2: DateTime<Utc>,
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Manage mitigation plans
    #[command(subcommand)]
    Plan(PlanCommands),
}

/// Mitigation plan subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum PlanCommands {
    /// Create a plan for a team and metric
    Create {
        /// Metric name
        metric: String,
        /// Team name
        team: String,
        /// What the plan is about
        #[arg(long, default_value = "")]
        description: String,
        /// Current value (default: the team's recorded mean)
        #[arg(long, allow_negative_numbers = true)]
        current: Option<f64>,
        /// Target value (default: 10% above current)
        #[arg(long, allow_negative_numbers = true)]
        target: Option<f64>,
    },

    /// List plans
    List {
        /// Only plans for this metric
        #[arg(long)]
        metric: Option<String>,
        /// Only plans for this team
        #[arg(long)]
        team: Option<String>,
    },

    /// Show one plan with its progress
    Show {
        /// Plan id
        plan_id: String,
    },

    /// Search plans by metric, team, or description
    Search {
        /// Text to look for, case-insensitive
        query: String,
    },

    /// Update plan fields
    Update {
        /// Plan id
        plan_id: String,
        /// New metric
        #[arg(long)]
        metric: Option<String>,
        /// New team
        #[arg(long)]
        team: Option<String>,
        /// New description
        #[arg(long)]
        description: Option<String>,
        /// New current value
        #[arg(long, allow_negative_numbers = true)]
        current: Option<f64>,
        /// New target value
        #[arg(long, allow_negative_numbers = true)]
        target: Option<f64>,
    },

    /// Delete a plan and its action items
    Delete {
        /// Plan id
        plan_id: String,
    },

    /// Add an action item to a plan
    AddItem {
        /// Plan id
        plan_id: String,
        /// Item title
        title: String,
        /// What needs to happen
        #[arg(long, default_value = "")]
        description: String,
        /// Low, Medium, High, or Critical
        #[arg(long, default_value = "Medium")]
        priority: Priority,
        /// Person responsible
        #[arg(long)]
        assignee: Option<String>,
        /// Due date (YYYY-MM-DD or RFC 3339)
        #[arg(long, value_parser = parse_date)]
        due: Option<DateTime<Utc>>,
    },

    /// Update an action item
    UpdateItem {
        /// Plan id
        plan_id: String,
        /// Item id
        item_id: String,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New description
        #[arg(long)]
        description: Option<String>,
        /// New priority
        #[arg(long)]
        priority: Option<Priority>,
        /// New status: "To Do", "In Progress", Done, Blocked, Cancelled
        #[arg(long)]
        status: Option<Status>,
        /// New assignee
        #[arg(long)]
        assignee: Option<String>,
        /// New due date
        #[arg(long, value_parser = parse_date, conflicts_with = "clear_due")]
        due: Option<DateTime<Utc>>,
        /// Remove the due date
        #[arg(long)]
        clear_due: bool,
        /// Replace tags (comma separated)
        #[arg(long, value_delimiter = ',')]
        tags: Option<Vec<String>>,
        /// New notes
        #[arg(long)]
        notes: Option<String>,
    },

    /// Delete an action item
    DeleteItem {
        /// Plan id
        plan_id: String,
        /// Item id
        item_id: String,
    },

    /// Progress over every plan's action items
    Progress,
}

/// Result of CLI command execution.
pub struct CliResult {
    /// Exit code (0 = success)
    pub exit_code: i32,
    /// Output message
    pub message: String,
}

impl CliResult {
    /// Create a success result with the given message.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            message: message.into(),
        }
    }

    /// Create an error result with the given message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            message: message.into(),
        }
    }
}

/// Everything a command may touch.
pub struct CliContext<'a> {
    /// Observation database
    pub storage: &'a SqliteStorage,
    /// Mitigation plans
    pub plans: &'a MitigationStore,
    /// Benchmark targets
    pub benchmarks: &'a BenchmarkCatalog,
}

/// Execute a CLI command.
pub async fn execute_command(command: Commands, ctx: &CliContext<'_>) -> CliResult {
    match command {
        Commands::Record {
            team,
            metric,
            value,
            date,
            category,
            unit,
            project,
            notes,
        } => {
            let observation = Observation {
                team,
                metric,
                value,
                date,
                category,
                unit,
                project,
                notes,
            };
            execute_record(ctx.storage, observation).await
        }
        Commands::Teams => storage_output(ctx.storage.teams().await),
        Commands::Metrics => storage_output(ctx.storage.metrics().await),
        Commands::Projects => storage_output(ctx.storage.projects().await),
        Commands::Summary => storage_output(ctx.storage.summary().await),
        Commands::Stats {
            name,
            group_by,
            filter,
        } => {
            let observations = match load(ctx.storage, &filter).await {
                Ok(o) => o,
                Err(result) => return result,
            };
            match group_by {
                Some(key) => json_output(&metrics::grouped_statistics(&observations, &name, key)),
                None => json_output(&metrics::statistics(&observations, &name)),
            }
        }
        Commands::Percentiles { name, at, filter } => {
            let observations = match load(ctx.storage, &filter).await {
                Ok(o) => o,
                Err(result) => return result,
            };
            let requested = if at.is_empty() {
                DEFAULT_PERCENTILES.to_vec()
            } else {
                at
            };
            analytics_output(metrics::percentiles(&observations, &name, &requested))
        }
        Commands::Trend { name, filter } => {
            let observations = match load(ctx.storage, &filter).await {
                Ok(o) => o,
                Err(result) => return result,
            };
            analytics_output(metrics::trend(&observations, &name))
        }
        Commands::Outliers {
            name,
            method,
            only_flagged,
            filter,
        } => {
            let observations = match load(ctx.storage, &filter).await {
                Ok(o) => o,
                Err(result) => return result,
            };
            let mut flagged = metrics::detect_outliers(&observations, &name, method);
            if only_flagged {
                flagged.retain(|f| f.is_outlier);
            }
            json_output(&flagged)
        }
        Commands::Aggregate {
            group_by,
            agg,
            filter,
        } => {
            let observations = match load(ctx.storage, &filter).await {
                Ok(o) => o,
                Err(result) => return result,
            };
            json_output(&metrics::aggregate(&observations, &group_by, agg))
        }
        Commands::Compare { filter } => execute_compare(ctx.storage, filter).await,
        Commands::Diff {
            baseline,
            against,
            filter,
        } => execute_diff(ctx.storage, baseline, against, filter).await,
        Commands::BestWorst {
            lower_is_better,
            filter,
        } => execute_best_worst(ctx.storage, lower_is_better, filter).await,
        Commands::Benchmark { filter } => {
            execute_benchmark(ctx.storage, ctx.benchmarks, filter).await
        }
        Commands::Rank { agg, filter } => execute_rank(ctx.storage, agg, filter).await,
        Commands::Periods {
            name,
            from1,
            to1,
            from2,
            to2,
            filter,
        } => {
            let observations = match load(ctx.storage, &filter).await {
                Ok(o) => o,
                Err(result) => return result,
            };
            analytics_output(metrics::time_period_comparison(
                &observations,
                &name,
                DateRange::new(from1, to1),
                DateRange::new(from2, to2),
            ))
        }
        Commands::Plan(command) => execute_plan_command(command, ctx).await,
    }
}

async fn execute_record(storage: &SqliteStorage, observation: Observation) -> CliResult {
    let observation = vec![observation];
    match storage.insert_observations(&observation).await {
        Ok(_) => json_output(&observation[0]),
        Err(e) => storage_error(e),
    }
}

async fn execute_compare(storage: &SqliteStorage, filter: FilterArgs) -> CliResult {
    let metric_names = match metrics_or_all(storage, &filter).await {
        Ok(m) => m,
        Err(e) => return storage_error(e),
    };
    let observations = match load(storage, &filter).await {
        Ok(o) => o,
        Err(result) => return result,
    };
    analytics_output(metrics::team_vs_team(
        &observations,
        &filter.teams,
        &metric_names,
    ))
}

async fn execute_diff(
    storage: &SqliteStorage,
    baseline: String,
    against: Vec<String>,
    filter: FilterArgs,
) -> CliResult {
    if !filter.teams.is_empty() {
        return CliResult::error("diff takes the baseline and --against, not --team");
    }
    let metric_names = match metrics_or_all(storage, &filter).await {
        Ok(m) => m,
        Err(e) => return storage_error(e),
    };
    let compare_teams = if against.is_empty() {
        match storage.teams().await {
            Ok(teams) => teams.into_iter().filter(|t| *t != baseline).collect(),
            Err(e) => return storage_error(e),
        }
    } else {
        against
    };

    let observations = match load(storage, &filter).await {
        Ok(o) => o,
        Err(result) => return result,
    };
    json_output(&metrics::calculate_differences(
        &observations,
        &baseline,
        &compare_teams,
        &metric_names,
    ))
}

async fn execute_best_worst(
    storage: &SqliteStorage,
    lower_is_better: Vec<String>,
    filter: FilterArgs,
) -> CliResult {
    let metric_names = match metrics_or_all(storage, &filter).await {
        Ok(m) => m,
        Err(e) => return storage_error(e),
    };
    let observations = match load(storage, &filter).await {
        Ok(o) => o,
        Err(result) => return result,
    };
    let higher_is_better: HashMap<String, bool> =
        lower_is_better.into_iter().map(|m| (m, false)).collect();
    json_output(&metrics::identify_best_worst(
        &observations,
        &metric_names,
        &higher_is_better,
    ))
}

async fn execute_benchmark(
    storage: &SqliteStorage,
    catalog: &BenchmarkCatalog,
    filter: FilterArgs,
) -> CliResult {
    let metric_names = if filter.metrics.is_empty() {
        match storage.metrics().await {
            Ok(all) => all.into_iter().filter(|m| catalog.get(m).is_some()).collect(),
            Err(e) => return storage_error(e),
        }
    } else {
        filter.metrics.clone()
    };
    let observations = match load(storage, &filter).await {
        Ok(o) => o,
        Err(result) => return result,
    };
    let teams = (!filter.teams.is_empty()).then_some(filter.teams.as_slice());
    json_output(&metrics::benchmark_comparison(
        &observations,
        &catalog.values(),
        &metric_names,
        teams,
    ))
}

async fn execute_rank(storage: &SqliteStorage, agg: Aggregation, filter: FilterArgs) -> CliResult {
    let metric_names = match metrics_or_all(storage, &filter).await {
        Ok(m) => m,
        Err(e) => return storage_error(e),
    };
    let observations = match load(storage, &filter).await {
        Ok(o) => o,
        Err(result) => return result,
    };
    json_output(&metrics::performance_ranking(&observations, &metric_names, agg))
}

/// A plan as printed by `plan show`.
#[derive(Serialize)]
struct PlanView<'a> {
    #[serde(flatten)]
    plan: &'a MitigationPlan,
    progress: Progress,
    gap: f64,
    overdue_items: Vec<&'a ActionItem>,
}

async fn execute_plan_command(command: PlanCommands, ctx: &CliContext<'_>) -> CliResult {
    let plans = ctx.plans;
    match command {
        PlanCommands::Create {
            metric,
            team,
            description,
            current,
            target,
        } => {
            let current = match current {
                Some(value) => value,
                None => {
                    let filter = MetricFilter::new()
                        .with_teams([team.clone()])
                        .with_metrics([metric.clone()]);
                    match ctx.storage.query(&filter).await {
                        Ok(obs) => metrics::current_value(&obs, &team, &metric),
                        Err(e) => return storage_error(e),
                    }
                }
            };
            let target = target.unwrap_or_else(|| metrics::default_target(current));
            let plan = plans
                .create_plan(
                    NewPlan::new(metric, team)
                        .with_description(description)
                        .with_values(current, target),
                )
                .await;
            mutation_output(plans, &plan).await
        }
        PlanCommands::List { metric, team } => {
            let mut found = match &metric {
                Some(metric) => plans.get_plans_by_metric(metric).await,
                None => plans.get_all_plans().await,
            };
            if let Some(team) = team {
                found.retain(|p| p.team == team);
            }
            json_output(&found)
        }
        PlanCommands::Show { plan_id } => match plans.get_plan(&plan_id).await {
            Some(plan) => json_output(&PlanView {
                plan: &plan,
                progress: plan.progress(),
                gap: plan.gap(),
                overdue_items: plan.overdue_items(Utc::now()),
            }),
            None => not_found("Plan", &plan_id),
        },
        PlanCommands::Search { query } => json_output(&plans.search_plans(&query).await),
        PlanCommands::Update {
            plan_id,
            metric,
            team,
            description,
            current,
            target,
        } => {
            let update = PlanUpdate {
                metric,
                team,
                description,
                current_value: current,
                target_value: target,
            };
            match plans.update_plan(&plan_id, update).await {
                Some(plan) => mutation_output(plans, &plan).await,
                None => not_found("Plan", &plan_id),
            }
        }
        PlanCommands::Delete { plan_id } => {
            if plans.delete_plan(&plan_id).await {
                mutation_output(plans, &serde_json::json!({ "deleted": plan_id })).await
            } else {
                not_found("Plan", &plan_id)
            }
        }
        PlanCommands::AddItem {
            plan_id,
            title,
            description,
            priority,
            assignee,
            due,
        } => {
            let mut new_item = NewActionItem::new(title, description).with_priority(priority);
            if let Some(assignee) = assignee {
                new_item = new_item.with_assignee(assignee);
            }
            if let Some(due) = due {
                new_item = new_item.with_due_date(due);
            }
            match plans.add_action_item(&plan_id, new_item).await {
                Some(item) => mutation_output(plans, &item).await,
                None => not_found("Plan", &plan_id),
            }
        }
        PlanCommands::UpdateItem {
            plan_id,
            item_id,
            title,
            description,
            priority,
            status,
            assignee,
            due,
            clear_due,
            tags,
            notes,
        } => {
            let due_date = if clear_due { Some(None) } else { due.map(Some) };
            let update = ActionItemUpdate {
                title,
                description,
                priority,
                status,
                assigned_to: assignee,
                due_date,
                tags,
                notes,
            };
            match plans.update_action_item(&plan_id, &item_id, update).await {
                Some(item) => mutation_output(plans, &item).await,
                None => not_found("Action item", &format!("{}/{}", plan_id, item_id)),
            }
        }
        PlanCommands::DeleteItem { plan_id, item_id } => {
            if plans.delete_action_item(&plan_id, &item_id).await {
                mutation_output(plans, &serde_json::json!({ "deleted": item_id })).await
            } else {
                not_found("Plan", &plan_id)
            }
        }
        PlanCommands::Progress => json_output(&plans.overall_progress().await),
    }
}

// Helper functions

/// Parse `YYYY-MM-DD` (midnight UTC) or a full RFC 3339 timestamp.
pub fn parse_date(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| format!("Invalid date '{}': expected YYYY-MM-DD or RFC 3339", raw))
}

async fn load(storage: &SqliteStorage, filter: &FilterArgs) -> Result<Vec<Observation>, CliResult> {
    storage
        .query(&filter.to_filter())
        .await
        .map_err(storage_error)
}

async fn metrics_or_all(
    storage: &SqliteStorage,
    filter: &FilterArgs,
) -> Result<Vec<String>, StorageError> {
    if filter.metrics.is_empty() {
        storage.metrics().await
    } else {
        Ok(filter.metrics.clone())
    }
}

fn json_output<T: Serialize + ?Sized>(value: &T) -> CliResult {
    match serde_json::to_string_pretty(value) {
        Ok(json) => CliResult::success(json),
        Err(e) => CliResult::error(format!("Failed to serialize output: {}", e)),
    }
}

fn analytics_output<T: Serialize>(result: Result<T, AnalyticsError>) -> CliResult {
    match result {
        Ok(value) => json_output(&value),
        Err(e) => CliResult::error(format!("Warning: {}", e)),
    }
}

fn storage_output<T: Serialize>(result: Result<T, StorageError>) -> CliResult {
    match result {
        Ok(value) => json_output(&value),
        Err(e) => storage_error(e),
    }
}

fn storage_error(e: StorageError) -> CliResult {
    CliResult::error(format!("Storage error: {}", e))
}

fn not_found(kind: &str, id: &str) -> CliResult {
    CliResult::error(format!("{} not found: {}", kind, id))
}

/// Print the mutated value, failing the command if it did not reach storage.
async fn mutation_output<T: Serialize + ?Sized>(plans: &MitigationStore, value: &T) -> CliResult {
    let result = json_output(value);
    let status = plans.persistence_status().await;
    if result.exit_code != 0 || status.is_durable() {
        return result;
    }
    CliResult::error(format!(
        "{}\nWarning: change not persisted: {}",
        result.message,
        status.last_error.as_deref().unwrap_or("unknown error")
    ))
}
