//! Storage layer for observations and mitigation plans.
//!
//! This module defines the two ports the core talks to:
//! - [`ObservationSource`]: read access to recorded metric observations
//! - [`PlanStorage`]: whole-collection load/save of mitigation plans
//!
//! and the adapters that implement them: SQLite ([`SqliteStorage`], both
//! ports), a JSON document ([`JsonFileStorage`], plans), and in-memory fakes
//! ([`MemoryStorage`], [`InMemoryObservations`]).

mod json;
mod memory;
mod sqlite;

pub use json::JsonFileStorage;
pub use memory::{InMemoryObservations, MemoryStorage};
pub use sqlite::SqliteStorage;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageResult;
use crate::metrics::{MetricFilter, Observation};
use crate::mitigation::MitigationPlan;

/// Summary counts over an observation source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceSummary {
    /// Number of recorded observations.
    pub total_records: u64,
    /// Distinct teams.
    pub teams: u64,
    /// Distinct metrics.
    pub metrics: u64,
    /// When the most recent observation was recorded.
    pub last_recorded: Option<DateTime<Utc>>,
}

/// Read access to recorded observations.
#[async_trait]
pub trait ObservationSource: Send + Sync {
    /// Observations matching `filter`, in recording order.
    async fn query(&self, filter: &MetricFilter) -> StorageResult<Vec<Observation>>;

    /// Distinct team names, sorted.
    async fn teams(&self) -> StorageResult<Vec<String>>;

    /// Distinct metric names, sorted.
    async fn metrics(&self) -> StorageResult<Vec<String>>;

    /// Distinct non-empty project names, sorted.
    async fn projects(&self) -> StorageResult<Vec<String>>;

    /// Record and distinct-value counts.
    async fn summary(&self) -> StorageResult<SourceSummary>;
}

/// Durable home of the mitigation plan collection.
///
/// Implementations always read and write the entire `plan_id -> plan`
/// mapping, including nested action items, with lossless timestamps.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlanStorage: Send + Sync {
    /// Read every stored plan. A store that was never written yields an empty map.
    async fn load(&self) -> StorageResult<HashMap<String, MitigationPlan>>;

    /// Replace the stored collection with `plans`.
    async fn save(&self, plans: &HashMap<String, MitigationPlan>) -> StorageResult<()>;
}
