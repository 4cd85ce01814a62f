//! Unit tests for the mitigation plan store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tokio::sync::Mutex;

use super::*;
use crate::error::StorageError;
use crate::mitigation::{Priority, Status};
use crate::storage::{MemoryStorage, MockPlanStorage};

async fn memory_store() -> (Arc<MemoryStorage>, MitigationStore) {
    let storage = Arc::new(MemoryStorage::new());
    let store = MitigationStore::open(storage.clone()).await;
    (storage, store)
}

fn failing_save_storage() -> MockPlanStorage {
    let mut mock = MockPlanStorage::new();
    mock.expect_load().returning(|| Ok(HashMap::new()));
    mock.expect_save().returning(|_| {
        Err(StorageError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk full",
        )))
    });
    mock
}

/// Storage whose `save` yields between reading the collection and keeping
/// it, and counts how many saves overlap.
#[derive(Default)]
struct YieldingStorage {
    saved: Mutex<Vec<HashMap<String, MitigationPlan>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[async_trait]
impl PlanStorage for YieldingStorage {
    async fn load(&self) -> StorageResult<HashMap<String, MitigationPlan>> {
        Ok(HashMap::new())
    }

    async fn save(&self, plans: &HashMap<String, MitigationPlan>) -> StorageResult<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let snapshot = plans.clone();
        tokio::task::yield_now().await;
        self.saved.lock().await.push(snapshot);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Plan lifecycle tests
// ============================================================================

#[tokio::test]
async fn test_create_plan_persists() {
    let (storage, store) = memory_store().await;

    let plan = store
        .create_plan(NewPlan::new("velocity", "A").with_values(20.0, 22.0))
        .await;

    assert_eq!(store.len().await, 1);
    assert_eq!(storage.save_count(), 1);
    assert_eq!(storage.snapshot().await.get(&plan.id), Some(&plan));
    assert_eq!(store.get_plan(&plan.id).await, Some(plan));
    assert!(store.persistence_status().await.is_durable());
}

#[tokio::test]
async fn test_get_plan_unknown_id() {
    let (_, store) = memory_store().await;
    assert!(store.get_plan("missing").await.is_none());
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_plans_by_metric_and_team() {
    let (_, store) = memory_store().await;
    store.create_plan(NewPlan::new("velocity", "A")).await;
    store.create_plan(NewPlan::new("velocity", "B")).await;
    store.create_plan(NewPlan::new("quality", "A")).await;

    assert_eq!(store.get_plans_by_metric("velocity").await.len(), 2);
    assert_eq!(store.get_plans_by_team("A").await.len(), 2);
    assert!(store.get_plans_by_team("C").await.is_empty());
    assert_eq!(store.get_all_plans().await.len(), 3);
}

#[tokio::test]
async fn test_get_all_plans_oldest_first() {
    let (_, store) = memory_store().await;
    let first = store.create_plan(NewPlan::new("velocity", "A")).await;
    let second = store.create_plan(NewPlan::new("quality", "B")).await;

    let all = store.get_all_plans().await;
    let ids: Vec<&str> = all.iter().map(|p| p.id.as_str()).collect();
    if first.created_at == second.created_at {
        let mut expected = vec![first.id.as_str(), second.id.as_str()];
        expected.sort();
        assert_eq!(ids, expected);
    } else {
        assert_eq!(ids, vec![first.id.as_str(), second.id.as_str()]);
    }
}

#[tokio::test]
async fn test_search_plans() {
    let (_, store) = memory_store().await;
    store
        .create_plan(NewPlan::new("cycle_time", "Platform").with_description("Shorter reviews"))
        .await;
    store.create_plan(NewPlan::new("velocity", "Mobile")).await;

    assert_eq!(store.search_plans("REVIEW").await.len(), 1);
    assert_eq!(store.search_plans("platform").await.len(), 1);
    assert_eq!(store.search_plans("o").await.len(), 2);
    assert!(store.search_plans("security").await.is_empty());
}

#[tokio::test]
async fn test_update_plan() {
    let (storage, store) = memory_store().await;
    let plan = store.create_plan(NewPlan::new("velocity", "A")).await;

    let updated = store
        .update_plan(
            &plan.id,
            PlanUpdate {
                target_value: Some(42.0),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.id, plan.id);
    assert_eq!(updated.target_value, 42.0);
    assert_eq!(updated.created_at, plan.created_at);
    assert!(updated.updated_at >= plan.updated_at);
    assert_eq!(storage.save_count(), 2);

    assert!(store
        .update_plan("missing", PlanUpdate::default())
        .await
        .is_none());
    assert_eq!(storage.save_count(), 2);
}

#[tokio::test]
async fn test_delete_plan() {
    let (storage, store) = memory_store().await;
    let plan = store.create_plan(NewPlan::new("velocity", "A")).await;

    assert!(store.delete_plan(&plan.id).await);
    assert!(!store.delete_plan(&plan.id).await);
    assert!(store.get_plan(&plan.id).await.is_none());
    assert!(storage.snapshot().await.is_empty());
}

// ============================================================================
// Action item tests
// ============================================================================

#[tokio::test]
async fn test_add_action_item_inherits_plan_fields() {
    let (_, store) = memory_store().await;
    let plan = store.create_plan(NewPlan::new("velocity", "A")).await;

    let item = store
        .add_action_item(
            &plan.id,
            NewActionItem::new("Limit WIP", "Cap WIP at 3")
                .with_priority(Priority::High)
                .with_assignee("sam"),
        )
        .await
        .unwrap();

    assert_eq!(item.metric, "velocity");
    assert_eq!(item.team, "A");
    assert_eq!(item.status, Status::ToDo);
    assert_eq!(item.priority, Priority::High);
    assert_eq!(item.assigned_to, "sam");

    let stored = store.get_plan(&plan.id).await.unwrap();
    assert_eq!(stored.action_items, vec![item]);
    assert!(stored.updated_at >= plan.updated_at);
}

#[tokio::test]
async fn test_add_action_item_unknown_plan() {
    let (storage, store) = memory_store().await;
    let added = store
        .add_action_item("missing", NewActionItem::new("t", "d"))
        .await;
    assert!(added.is_none());
    assert_eq!(storage.save_count(), 0);
}

#[tokio::test]
async fn test_progress_scenario() {
    let (_, store) = memory_store().await;
    let plan = store.create_plan(NewPlan::new("velocity", "A")).await;
    let first = store
        .add_action_item(&plan.id, NewActionItem::new("one", ""))
        .await
        .unwrap();
    store
        .add_action_item(&plan.id, NewActionItem::new("two", ""))
        .await
        .unwrap();

    store
        .update_action_item(&plan.id, &first.id, ActionItemUpdate::status(Status::Done))
        .await
        .unwrap();

    let plan = store.get_plan(&plan.id).await.unwrap();
    let progress = plan.progress();
    assert_eq!(progress.percentage, 50.0);
    assert_eq!(progress.completed, 1);
    assert_eq!(progress.total, 2);
    assert_eq!(progress.todo, 1);

    // Derived, so asking twice changes nothing.
    assert_eq!(plan.progress(), progress);
    assert_eq!(store.overall_progress().await, progress);
}

#[tokio::test]
async fn test_update_action_item_touches_plan() {
    let (_, store) = memory_store().await;
    let plan = store.create_plan(NewPlan::new("velocity", "A")).await;
    let item = store
        .add_action_item(&plan.id, NewActionItem::new("t", "d"))
        .await
        .unwrap();
    let before = store.get_plan(&plan.id).await.unwrap().updated_at;

    let updated = store
        .update_action_item(
            &plan.id,
            &item.id,
            ActionItemUpdate {
                status: Some(Status::InProgress),
                notes: Some("started".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.status, Status::InProgress);
    assert_eq!(updated.notes, "started");
    assert!(updated.updated_at >= item.updated_at);
    assert!(store.get_plan(&plan.id).await.unwrap().updated_at >= before);
}

#[tokio::test]
async fn test_update_action_item_missing() {
    let (_, store) = memory_store().await;
    let plan = store.create_plan(NewPlan::new("velocity", "A")).await;

    assert!(store
        .update_action_item(&plan.id, "missing", ActionItemUpdate::status(Status::Done))
        .await
        .is_none());
    assert!(store
        .update_action_item("missing", "missing", ActionItemUpdate::status(Status::Done))
        .await
        .is_none());
}

#[tokio::test]
async fn test_delete_action_item() {
    let (_, store) = memory_store().await;
    let plan = store.create_plan(NewPlan::new("velocity", "A")).await;
    let item = store
        .add_action_item(&plan.id, NewActionItem::new("t", "d"))
        .await
        .unwrap();

    assert!(store.delete_action_item(&plan.id, &item.id).await);
    assert!(store.get_plan(&plan.id).await.unwrap().action_items.is_empty());

    // Plan exists, item does not: still reported as deleted.
    assert!(store.delete_action_item(&plan.id, &item.id).await);
    assert!(!store.delete_action_item("missing", &item.id).await);
}

#[tokio::test]
async fn test_overall_progress_spans_plans() {
    let (_, store) = memory_store().await;
    let a = store.create_plan(NewPlan::new("velocity", "A")).await;
    let b = store.create_plan(NewPlan::new("quality", "B")).await;

    for plan_id in [&a.id, &b.id] {
        let item = store
            .add_action_item(plan_id, NewActionItem::new("t", "d"))
            .await
            .unwrap();
        store
            .update_action_item(plan_id, &item.id, ActionItemUpdate::status(Status::Done))
            .await;
    }
    store
        .add_action_item(&a.id, NewActionItem::new("open", ""))
        .await;
    store
        .add_action_item(&b.id, NewActionItem::new("open", ""))
        .await;

    let progress = store.overall_progress().await;
    assert_eq!(progress.total, 4);
    assert_eq!(progress.completed, 2);
    assert_eq!(progress.percentage, 50.0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_item_adds_are_all_saved() {
    const WRITERS: usize = 16;

    let storage = Arc::new(YieldingStorage::default());
    let store = Arc::new(MitigationStore::open(storage.clone()).await);
    let plan = store.create_plan(NewPlan::new("velocity", "A")).await;

    let handles: Vec<_> = (0..WRITERS)
        .map(|i| {
            let store = store.clone();
            let plan_id = plan.id.clone();
            tokio::spawn(async move {
                store
                    .add_action_item(&plan_id, NewActionItem::new(format!("item {i}"), ""))
                    .await
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.await.unwrap().is_some());
    }

    assert_eq!(storage.max_in_flight.load(Ordering::SeqCst), 1);

    let saved = storage.saved.lock().await;
    assert_eq!(saved.len(), WRITERS + 1);
    let last = saved.last().unwrap();
    assert_eq!(last[&plan.id].action_items.len(), WRITERS);

    // Each save sees exactly one more item than the one before it.
    let counts: Vec<usize> = saved.iter().map(|s| s[&plan.id].action_items.len()).collect();
    assert_eq!(counts, (0..=WRITERS).collect::<Vec<_>>());

    assert_eq!(store.get_plan(&plan.id).await.unwrap().action_items.len(), WRITERS);
    assert!(store.persistence_status().await.is_durable());
}

// ============================================================================
// Persistence tests
// ============================================================================

#[tokio::test]
async fn test_open_loads_existing_plans() {
    let plan = MitigationPlan::new(NewPlan::new("velocity", "A").with_values(10.0, 12.0));
    let mut plans = HashMap::new();
    plans.insert(plan.id.clone(), plan.clone());

    let storage = Arc::new(MemoryStorage::with_plans(plans));
    let store = MitigationStore::open(storage.clone()).await;

    assert_eq!(store.get_plan(&plan.id).await, Some(plan));
    assert_eq!(storage.save_count(), 0);
    assert!(store.persistence_status().await.is_durable());
}

#[tokio::test]
async fn test_reopen_restores_plans() {
    let storage = Arc::new(MemoryStorage::new());
    let plan_id = {
        let store = MitigationStore::open(storage.clone()).await;
        let plan = store.create_plan(NewPlan::new("velocity", "A")).await;
        store
            .add_action_item(&plan.id, NewActionItem::new("t", "d"))
            .await;
        plan.id
    };

    let reopened = MitigationStore::open(storage).await;
    let plan = reopened.get_plan(&plan_id).await.unwrap();
    assert_eq!(plan.action_items.len(), 1);
}

#[tokio::test]
async fn test_save_failure_keeps_memory_and_reports_status() {
    let store = MitigationStore::open(Arc::new(failing_save_storage())).await;

    let plan = store.create_plan(NewPlan::new("velocity", "A")).await;
    store.update_plan(&plan.id, PlanUpdate::default()).await;

    assert!(store.get_plan(&plan.id).await.is_some());
    let status = store.persistence_status().await;
    assert!(!status.is_durable());
    assert_eq!(status.unsaved_mutations, 2);
    assert!(status.last_error.unwrap().contains("disk full"));

    assert!(store.save().await.is_err());
}

#[tokio::test]
async fn test_successful_save_clears_status() {
    let mut mock = MockPlanStorage::new();
    mock.expect_load().returning(|| Ok(HashMap::new()));
    let mut calls = 0;
    mock.expect_save().returning(move |_| {
        calls += 1;
        if calls == 1 {
            Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "locked",
            )))
        } else {
            Ok(())
        }
    });

    let store = MitigationStore::open(Arc::new(mock)).await;
    store.create_plan(NewPlan::new("velocity", "A")).await;
    assert_eq!(store.persistence_status().await.unsaved_mutations, 1);

    store.save().await.unwrap();
    let status = store.persistence_status().await;
    assert!(status.is_durable());
    assert!(status.last_error.is_none());
}

#[tokio::test]
async fn test_load_failure_starts_empty() {
    let mut mock = MockPlanStorage::new();
    mock.expect_load().returning(|| {
        Err(StorageError::Serialization {
            message: "corrupt".to_string(),
        })
    });
    mock.expect_save().returning(|_| Ok(()));

    let store = MitigationStore::open(Arc::new(mock)).await;
    assert!(store.is_empty().await);
    let status = store.persistence_status().await;
    assert!(status.load_error.unwrap().contains("corrupt"));

    store.create_plan(NewPlan::new("velocity", "A")).await;
    assert_eq!(store.len().await, 1);
}
