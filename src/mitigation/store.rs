//! Keyed, persisted collection of mitigation plans.
//!
//! The whole collection lives in memory and is written back through a
//! [`PlanStorage`] port after every mutation. Writes are O(total plans); there
//! is no incremental persistence and no transaction log.
//!
//! All mutations, including the write-back, run under a single write lock, so
//! a snapshot is never serialized while another mutation is half applied.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use super::{
    ActionItem, ActionItemUpdate, MitigationPlan, NewActionItem, NewPlan, PlanUpdate, Progress,
};
use crate::error::StorageResult;
use crate::storage::PlanStorage;

/// Outcome of the most recent storage round-trips.
///
/// A failed write does not undo the in-memory mutation. Until a later write
/// succeeds the stored copy is behind memory, and this status says so.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PersistenceStatus {
    /// Error from the initial load, if it failed and the store started empty.
    pub load_error: Option<String>,
    /// Error from the most recent failed write, cleared by a successful one.
    pub last_error: Option<String>,
    /// Mutations applied in memory since the last successful write.
    pub unsaved_mutations: u64,
}

impl PersistenceStatus {
    /// Whether storage holds everything that memory holds.
    pub fn is_durable(&self) -> bool {
        self.last_error.is_none() && self.unsaved_mutations == 0
    }
}

struct StoreState {
    plans: HashMap<String, MitigationPlan>,
    status: PersistenceStatus,
}

/// System of record for mitigation plans.
pub struct MitigationStore {
    storage: Arc<dyn PlanStorage>,
    state: RwLock<StoreState>,
}

impl MitigationStore {
    /// Load every plan from `storage`.
    ///
    /// A load failure is logged and the store starts empty; the failure is
    /// kept in [`PersistenceStatus::load_error`].
    pub async fn open(storage: Arc<dyn PlanStorage>) -> Self {
        let (plans, load_error) = match storage.load().await {
            Ok(plans) => {
                info!(plans = plans.len(), "Loaded mitigation plans");
                (plans, None)
            }
            Err(e) => {
                error!(error = %e, "Failed to load mitigation plans, starting empty");
                (HashMap::new(), Some(e.to_string()))
            }
        };

        Self {
            storage,
            state: RwLock::new(StoreState {
                plans,
                status: PersistenceStatus {
                    load_error,
                    ..Default::default()
                },
            }),
        }
    }

    /// Write the full collection now.
    ///
    /// # Errors
    /// Returns the storage error; the status is updated either way.
    pub async fn save(&self) -> StorageResult<()> {
        let mut state = self.state.write().await;
        let result = self.storage.save(&state.plans).await;
        match &result {
            Ok(()) => {
                state.status.last_error = None;
                state.status.unsaved_mutations = 0;
            }
            Err(e) => {
                state.status.last_error = Some(e.to_string());
            }
        }
        result
    }

    /// Current persistence status.
    pub async fn persistence_status(&self) -> PersistenceStatus {
        self.state.read().await.status.clone()
    }

    /// Create a plan with a fresh id and no action items.
    pub async fn create_plan(&self, new_plan: NewPlan) -> MitigationPlan {
        let plan = MitigationPlan::new(new_plan);

        let mut state = self.state.write().await;
        state.plans.insert(plan.id.clone(), plan.clone());
        self.persist(&mut state).await;

        debug!(plan_id = %plan.id, metric = %plan.metric, team = %plan.team, "Created mitigation plan");
        plan
    }

    /// Plan by id.
    pub async fn get_plan(&self, plan_id: &str) -> Option<MitigationPlan> {
        self.state.read().await.plans.get(plan_id).cloned()
    }

    /// All plans for `metric`.
    pub async fn get_plans_by_metric(&self, metric: &str) -> Vec<MitigationPlan> {
        self.collect(|plan| plan.metric == metric).await
    }

    /// All plans for `team`.
    pub async fn get_plans_by_team(&self, team: &str) -> Vec<MitigationPlan> {
        self.collect(|plan| plan.team == team).await
    }

    /// Every plan, oldest first.
    pub async fn get_all_plans(&self) -> Vec<MitigationPlan> {
        self.collect(|_| true).await
    }

    /// Plans whose metric, team, or description contains `query`,
    /// ignoring case. Unranked.
    pub async fn search_plans(&self, query: &str) -> Vec<MitigationPlan> {
        self.collect(|plan| plan.matches(query)).await
    }

    /// Number of plans.
    pub async fn len(&self) -> usize {
        self.state.read().await.plans.len()
    }

    /// Whether there are no plans.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.plans.is_empty()
    }

    /// Overwrite the fields set in `update`.
    ///
    /// Returns `None` when the plan does not exist.
    pub async fn update_plan(&self, plan_id: &str, update: PlanUpdate) -> Option<MitigationPlan> {
        let mut state = self.state.write().await;
        let plan = state.plans.get_mut(plan_id)?;
        plan.apply(update);
        let updated = plan.clone();
        self.persist(&mut state).await;

        debug!(plan_id = %plan_id, "Updated mitigation plan");
        Some(updated)
    }

    /// Remove a plan and its items. Returns whether it existed.
    pub async fn delete_plan(&self, plan_id: &str) -> bool {
        let mut state = self.state.write().await;
        if state.plans.remove(plan_id).is_none() {
            return false;
        }
        self.persist(&mut state).await;

        debug!(plan_id = %plan_id, "Deleted mitigation plan");
        true
    }

    /// Append a new `ToDo` item to a plan.
    ///
    /// The item inherits the plan's metric and team. Returns `None` when the
    /// plan does not exist.
    pub async fn add_action_item(&self, plan_id: &str, new_item: NewActionItem) -> Option<ActionItem> {
        let mut state = self.state.write().await;
        let plan = state.plans.get_mut(plan_id)?;

        let item = ActionItem::new(
            new_item.title,
            new_item.description,
            plan.metric.clone(),
            plan.team.clone(),
        )
        .with_priority(new_item.priority)
        .with_assignee(new_item.assigned_to)
        .with_due_date(new_item.due_date);

        plan.add_action_item(item.clone());
        self.persist(&mut state).await;

        debug!(plan_id = %plan_id, item_id = %item.id, "Added action item");
        Some(item)
    }

    /// Overwrite the fields set in `update` on one item.
    ///
    /// Refreshes both the item's and the plan's `updated_at`. Returns `None`
    /// when the plan or the item does not exist.
    pub async fn update_action_item(
        &self,
        plan_id: &str,
        item_id: &str,
        update: ActionItemUpdate,
    ) -> Option<ActionItem> {
        let mut state = self.state.write().await;
        let plan = state.plans.get_mut(plan_id)?;
        let item = plan.action_item_mut(item_id)?;
        item.apply(update);
        let updated = item.clone();
        plan.touch();
        self.persist(&mut state).await;

        debug!(plan_id = %plan_id, item_id = %item_id, status = %updated.status, "Updated action item");
        Some(updated)
    }

    /// Remove an item from a plan.
    ///
    /// Returns `false` only when the plan does not exist; an unknown item id
    /// still counts as a (no-op) delete and is persisted.
    pub async fn delete_action_item(&self, plan_id: &str, item_id: &str) -> bool {
        let mut state = self.state.write().await;
        let Some(plan) = state.plans.get_mut(plan_id) else {
            return false;
        };
        let removed = plan.remove_action_item(item_id);
        self.persist(&mut state).await;

        debug!(plan_id = %plan_id, item_id = %item_id, removed, "Deleted action item");
        true
    }

    /// Progress rolled up over the items of every plan.
    pub async fn overall_progress(&self) -> Progress {
        let state = self.state.read().await;
        Progress::from_items(state.plans.values().flat_map(|plan| plan.action_items.iter()))
    }

    async fn collect(&self, keep: impl Fn(&MitigationPlan) -> bool) -> Vec<MitigationPlan> {
        let state = self.state.read().await;
        let mut plans: Vec<MitigationPlan> = state.plans.values().filter(|p| keep(p)).cloned().collect();
        plans.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        plans
    }

    /// Write the collection while the caller still holds the write lock.
    async fn persist(&self, state: &mut StoreState) {
        state.status.unsaved_mutations += 1;
        match self.storage.save(&state.plans).await {
            Ok(()) => {
                state.status.last_error = None;
                state.status.unsaved_mutations = 0;
            }
            Err(e) => {
                warn!(
                    error = %e,
                    unsaved_mutations = state.status.unsaved_mutations,
                    "Failed to persist mitigation plans; change kept in memory only"
                );
                state.status.last_error = Some(e.to_string());
            }
        }
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod store_tests;
