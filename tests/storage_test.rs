//! Integration tests for the plan storage adapters
//!
//! Every adapter must bring back exactly what the store wrote, including
//! nested action items and timestamps.

use std::sync::Arc;

use chrono::{TimeZone, Utc};

use metricboard::config::DatabaseConfig;
use metricboard::metrics::{MetricFilter, Observation};
use metricboard::mitigation::{
    ActionItemUpdate, MitigationStore, NewActionItem, NewPlan, Priority, Status,
};
use metricboard::storage::{JsonFileStorage, ObservationSource, PlanStorage, SqliteStorage};

/// Populate a store with two plans and a few items, returning the plan ids.
async fn populate(store: &MitigationStore) -> (String, String) {
    let first = store
        .create_plan(
            NewPlan::new("velocity", "Platform")
                .with_description("Raise throughput")
                .with_values(18.5, 22.0),
        )
        .await;
    let second = store
        .create_plan(NewPlan::new("defect_rate", "Mobile").with_values(4.0, 2.0))
        .await;

    let item = store
        .add_action_item(
            &first.id,
            NewActionItem::new("Limit WIP", "Cap work in progress at 3")
                .with_priority(Priority::High)
                .with_assignee("sam")
                .with_due_date(Utc.with_ymd_and_hms(2024, 9, 30, 17, 0, 0).unwrap()),
        )
        .await
        .unwrap();
    store
        .update_action_item(
            &first.id,
            &item.id,
            ActionItemUpdate {
                status: Some(Status::InProgress),
                tags: Some(vec!["process".into(), "flow".into()]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    store
        .add_action_item(&second.id, NewActionItem::new("Add regression suite", ""))
        .await
        .unwrap();

    (first.id, second.id)
}

async fn assert_roundtrip(storage: Arc<dyn PlanStorage>, reopen: Arc<dyn PlanStorage>) {
    let store = MitigationStore::open(storage).await;
    let (first_id, second_id) = populate(&store).await;
    assert!(store.persistence_status().await.is_durable());

    let reopened = MitigationStore::open(reopen).await;
    assert_eq!(reopened.len().await, 2);
    assert_eq!(reopened.get_all_plans().await, store.get_all_plans().await);

    let first = reopened.get_plan(&first_id).await.unwrap();
    assert_eq!(first.action_items.len(), 1);
    assert_eq!(first.action_items[0].status, Status::InProgress);
    assert_eq!(first.action_items[0].tags, vec!["process", "flow"]);
    assert_eq!(first.progress().in_progress, 1);

    let second = reopened.get_plan(&second_id).await.unwrap();
    assert_eq!(second.action_items[0].status, Status::ToDo);
}

#[tokio::test]
async fn test_json_file_storage_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plans").join("mitigation_plans.json");

    assert_roundtrip(
        Arc::new(JsonFileStorage::new(&path)),
        Arc::new(JsonFileStorage::new(&path)),
    )
    .await;
}

#[tokio::test]
async fn test_sqlite_storage_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig {
        path: dir.path().join("metrics.db"),
        max_connections: 2,
    };

    let writer = SqliteStorage::new(&config).await.unwrap();
    let reader = SqliteStorage::new(&config).await.unwrap();
    assert_roundtrip(Arc::new(writer), Arc::new(reader)).await;
}

#[tokio::test]
async fn test_sqlite_deletes_are_persisted() {
    let storage = Arc::new(SqliteStorage::new_in_memory().await.unwrap());
    let store = MitigationStore::open(storage.clone()).await;
    let (first_id, _) = populate(&store).await;

    assert!(store.delete_plan(&first_id).await);

    let stored = storage.load().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert!(!stored.contains_key(&first_id));
}

#[tokio::test]
async fn test_observations_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig {
        path: dir.path().join("metrics.db"),
        ..Default::default()
    };

    {
        let storage = SqliteStorage::new(&config).await.unwrap();
        storage
            .insert_observations(&[
                Observation::new("Platform", "velocity", 21.0)
                    .with_date(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap())
                    .with_category("delivery")
                    .with_unit("points"),
                Observation::new("Mobile", "velocity", 17.0).with_notes("holiday week"),
            ])
            .await
            .unwrap();
    }

    let storage = SqliteStorage::new(&config).await.unwrap();
    let observations = storage.query(&MetricFilter::new()).await.unwrap();
    assert_eq!(observations.len(), 2);
    assert_eq!(observations[0].category.as_deref(), Some("delivery"));
    assert_eq!(observations[0].unit.as_deref(), Some("points"));
    assert_eq!(observations[1].notes.as_deref(), Some("holiday week"));
    assert_eq!(observations[1].date, None);
}
