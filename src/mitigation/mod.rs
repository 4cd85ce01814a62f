//! Mitigation plans and their action items.
//!
//! A [`MitigationPlan`] tracks one team/metric pair from its current value
//! toward a target through a list of [`ActionItem`]s. Plans own their items
//! exclusively. Progress is always derived from the items on demand.
//!
//! [`MitigationStore`] is the keyed, persisted collection of plans.

mod store;


pub use store::{MitigationStore, PersistenceStatus};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Action item priority levels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    /// Nice to have.
    Low,
    /// Default priority.
    #[default]
    Medium,
    /// Needs attention soon.
    High,
    /// Blocks the target.
    Critical,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "Low"),
            Priority::Medium => write!(f, "Medium"),
            Priority::High => write!(f, "High"),
            Priority::Critical => write!(f, "Critical"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

/// Action item status.
///
/// Any status may be set from any other; there is no enforced workflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    /// Not started.
    #[default]
    #[serde(rename = "To Do")]
    ToDo,
    /// Being worked on.
    #[serde(rename = "In Progress")]
    InProgress,
    /// Finished; counts toward progress.
    Done,
    /// Waiting on something else.
    Blocked,
    /// Dropped.
    Cancelled,
}

impl Status {
    /// Whether the item needs no further work.
    pub fn is_closed(&self) -> bool {
        matches!(self, Status::Done | Status::Cancelled)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::ToDo => write!(f, "To Do"),
            Status::InProgress => write!(f, "In Progress"),
            Status::Done => write!(f, "Done"),
            Status::Blocked => write!(f, "Blocked"),
            Status::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect();
        match normalized.as_str() {
            "todo" => Ok(Status::ToDo),
            "inprogress" => Ok(Status::InProgress),
            "done" => Ok(Status::Done),
            "blocked" => Ok(Status::Blocked),
            "cancelled" | "canceled" => Ok(Status::Cancelled),
            _ => Err(format!("Unknown status: {}", s)),
        }
    }
}

/// A discrete task within a mitigation plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionItem {
    /// Unique item identifier.
    pub id: String,
    /// Short title.
    pub title: String,
    /// What needs to happen.
    pub description: String,
    /// Metric of the owning plan.
    pub metric: String,
    /// Team of the owning plan.
    pub team: String,
    /// Priority level.
    #[serde(default)]
    pub priority: Priority,
    /// Current status.
    #[serde(default)]
    pub status: Status,
    /// Person responsible.
    #[serde(default)]
    pub assigned_to: String,
    /// When the item is due.
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    /// When the item was created.
    pub created_at: DateTime<Utc>,
    /// When the item was last changed.
    pub updated_at: DateTime<Utc>,
    /// Tags, unique, in insertion order.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Free-form notes.
    #[serde(default)]
    pub notes: String,
}

impl ActionItem {
    /// Create a new item in the `ToDo` state with medium priority.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        metric: impl Into<String>,
        team: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            description: description.into(),
            metric: metric.into(),
            team: team.into(),
            priority: Priority::default(),
            status: Status::default(),
            assigned_to: String::new(),
            due_date: None,
            created_at: now,
            updated_at: now,
            tags: Vec::new(),
            notes: String::new(),
        }
    }

    /// Set priority
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the assignee
    pub fn with_assignee(mut self, assigned_to: impl Into<String>) -> Self {
        self.assigned_to = assigned_to.into();
        self
    }

    /// Set the due date
    pub fn with_due_date(mut self, due_date: Option<DateTime<Utc>>) -> Self {
        self.due_date = due_date;
        self
    }

    /// Set the status and refresh `updated_at`.
    pub fn set_status(&mut self, status: Status) {
        self.status = status;
        self.touch();
    }

    /// Add a tag unless already present. Returns whether it was added.
    pub fn add_tag(&mut self, tag: impl Into<String>) -> bool {
        let tag = tag.into();
        if self.tags.contains(&tag) {
            return false;
        }
        self.tags.push(tag);
        self.touch();
        true
    }

    /// Remove a tag. Returns whether it was present.
    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let before = self.tags.len();
        self.tags.retain(|t| t != tag);
        let removed = self.tags.len() != before;
        if removed {
            self.touch();
        }
        removed
    }

    /// Apply every field set in `update`, then refresh `updated_at`.
    pub fn apply(&mut self, update: ActionItemUpdate) {
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(priority) = update.priority {
            self.priority = priority;
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(assigned_to) = update.assigned_to {
            self.assigned_to = assigned_to;
        }
        if let Some(due_date) = update.due_date {
            self.due_date = due_date;
        }
        if let Some(tags) = update.tags {
            self.tags.clear();
            for tag in tags {
                if !self.tags.contains(&tag) {
                    self.tags.push(tag);
                }
            }
        }
        if let Some(notes) = update.notes {
            self.notes = notes;
        }
        self.touch();
    }

    /// Whether the item is past due and still open at `now`.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.status.is_closed() && self.due_date.is_some_and(|due| due < now)
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Derived progress of a plan's action items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Progress {
    /// Share of items that are done, in percent (0 with no items).
    pub percentage: f64,
    /// Items with status `Done`.
    pub completed: usize,
    /// All items.
    pub total: usize,
    /// Items with status `InProgress`.
    pub in_progress: usize,
    /// Items with status `ToDo`.
    pub todo: usize,
}

impl Progress {
    /// Tally progress over a set of items.
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a ActionItem>) -> Self {
        let mut progress = Progress::default();
        for item in items {
            progress.total += 1;
            match item.status {
                Status::Done => progress.completed += 1,
                Status::InProgress => progress.in_progress += 1,
                Status::ToDo => progress.todo += 1,
                Status::Blocked | Status::Cancelled => {}
            }
        }
        progress.percentage =
            crate::metrics::math::safe_percentage(progress.completed as f64, progress.total as f64);
        progress
    }
}

/// A remediation plan for one team and metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MitigationPlan {
    /// Unique plan identifier, stable for the plan's lifetime.
    pub id: String,
    /// Metric being remediated.
    pub metric: String,
    /// Team that owns the plan.
    pub team: String,
    /// What the plan is about.
    pub description: String,
    /// Metric value when the plan was created.
    pub current_value: f64,
    /// Value the plan aims for.
    pub target_value: f64,
    /// Action items, in insertion order.
    #[serde(default)]
    pub action_items: Vec<ActionItem>,
    /// When the plan was created.
    pub created_at: DateTime<Utc>,
    /// When the plan or one of its items last changed.
    pub updated_at: DateTime<Utc>,
}

impl MitigationPlan {
    /// Create an empty plan with a fresh id.
    pub fn new(plan: NewPlan) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            metric: plan.metric,
            team: plan.team,
            description: plan.description,
            current_value: plan.current_value,
            target_value: plan.target_value,
            action_items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append an item and refresh `updated_at`.
    pub fn add_action_item(&mut self, item: ActionItem) {
        self.action_items.push(item);
        self.touch();
    }

    /// Remove the item with `item_id` and refresh `updated_at`.
    ///
    /// Returns whether an item was removed.
    pub fn remove_action_item(&mut self, item_id: &str) -> bool {
        let before = self.action_items.len();
        self.action_items.retain(|item| item.id != item_id);
        self.touch();
        self.action_items.len() != before
    }

    /// Item with `item_id`, if present.
    pub fn action_item(&self, item_id: &str) -> Option<&ActionItem> {
        self.action_items.iter().find(|item| item.id == item_id)
    }

    /// Mutable item with `item_id`, if present.
    pub fn action_item_mut(&mut self, item_id: &str) -> Option<&mut ActionItem> {
        self.action_items.iter_mut().find(|item| item.id == item_id)
    }

    /// Progress over the current action items. Recomputed on every call.
    pub fn progress(&self) -> Progress {
        Progress::from_items(&self.action_items)
    }

    /// Distance still to cover: `target_value - current_value`.
    pub fn gap(&self) -> f64 {
        self.target_value - self.current_value
    }

    /// Open items past their due date at `now`.
    pub fn overdue_items(&self, now: DateTime<Utc>) -> Vec<&ActionItem> {
        self.action_items
            .iter()
            .filter(|item| item.is_overdue(now))
            .collect()
    }

    /// Apply every field set in `update`, then refresh `updated_at`.
    pub fn apply(&mut self, update: PlanUpdate) {
        if let Some(metric) = update.metric {
            self.metric = metric;
        }
        if let Some(team) = update.team {
            self.team = team;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(current_value) = update.current_value {
            self.current_value = current_value;
        }
        if let Some(target_value) = update.target_value {
            self.target_value = target_value;
        }
        self.touch();
    }

    /// Case-insensitive substring match on metric, team, or description.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.metric.to_lowercase().contains(&query)
            || self.team.to_lowercase().contains(&query)
            || self.description.to_lowercase().contains(&query)
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Fields for a new plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewPlan {
    /// Metric being remediated.
    pub metric: String,
    /// Owning team.
    pub team: String,
    /// What the plan is about.
    pub description: String,
    /// Current observed value.
    pub current_value: f64,
    /// Target value.
    pub target_value: f64,
}

impl NewPlan {
    /// Plan for `team` on `metric`
    pub fn new(metric: impl Into<String>, team: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            team: team.into(),
            ..Default::default()
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set current and target values
    pub fn with_values(mut self, current_value: f64, target_value: f64) -> Self {
        self.current_value = current_value;
        self.target_value = target_value;
        self
    }
}

/// Fields for a new action item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewActionItem {
    /// Short title.
    pub title: String,
    /// What needs to happen.
    pub description: String,
    /// Priority level.
    #[serde(default)]
    pub priority: Priority,
    /// Person responsible.
    #[serde(default)]
    pub assigned_to: String,
    /// When the item is due.
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
}

impl NewActionItem {
    /// Item with a title and description
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    /// Set priority
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the assignee
    pub fn with_assignee(mut self, assigned_to: impl Into<String>) -> Self {
        self.assigned_to = assigned_to.into();
        self
    }

    /// Set the due date
    pub fn with_due_date(mut self, due_date: DateTime<Utc>) -> Self {
        self.due_date = Some(due_date);
        self
    }
}

/// Partial update of a plan; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanUpdate {
    /// New metric name.
    pub metric: Option<String>,
    /// New owning team.
    pub team: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New current value.
    pub current_value: Option<f64>,
    /// New target value.
    pub target_value: Option<f64>,
}

/// Partial update of an action item; `None` fields are left unchanged.
///
/// `due_date: Some(None)` clears the due date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct ActionItemUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<Status>,
    pub assigned_to: Option<String>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub tags: Option<Vec<String>>,
    pub notes: Option<String>,
}

impl ActionItemUpdate {
    /// Update that only changes the status
    pub fn status(status: Status) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}
