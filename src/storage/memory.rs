use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{ObservationSource, PlanStorage, SourceSummary};
use crate::error::StorageResult;
use crate::metrics::{MetricFilter, Observation};
use crate::mitigation::MitigationPlan;

/// Plan storage held in memory.
///
/// Keeps a deep copy of the last saved collection, so reloading through it
/// behaves like reloading from disk.
#[derive(Default)]
pub struct MemoryStorage {
    plans: Mutex<HashMap<String, MitigationPlan>>,
    saves: AtomicUsize,
}

impl MemoryStorage {
    /// Empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-populated with `plans`
    pub fn with_plans(plans: HashMap<String, MitigationPlan>) -> Self {
        Self {
            plans: Mutex::new(plans),
            saves: AtomicUsize::new(0),
        }
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Copy of the stored collection.
    pub async fn snapshot(&self) -> HashMap<String, MitigationPlan> {
        self.plans.lock().await.clone()
    }
}

#[async_trait]
impl PlanStorage for MemoryStorage {
    async fn load(&self) -> StorageResult<HashMap<String, MitigationPlan>> {
        Ok(self.plans.lock().await.clone())
    }

    async fn save(&self, plans: &HashMap<String, MitigationPlan>) -> StorageResult<()> {
        *self.plans.lock().await = plans.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Observation source over an owned vector.
#[derive(Debug, Clone, Default)]
pub struct InMemoryObservations {
    observations: Vec<Observation>,
}

impl InMemoryObservations {
    /// Wrap a set of observations
    pub fn new(observations: Vec<Observation>) -> Self {
        Self { observations }
    }

    /// Append an observation
    pub fn push(&mut self, observation: Observation) {
        self.observations.push(observation);
    }

    fn distinct<'a>(&'a self, key: impl Fn(&'a Observation) -> Option<&'a str>) -> Vec<String> {
        self.observations
            .iter()
            .filter_map(key)
            .filter(|s| !s.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }
}

#[async_trait]
impl ObservationSource for InMemoryObservations {
    async fn query(&self, filter: &MetricFilter) -> StorageResult<Vec<Observation>> {
        Ok(self
            .observations
            .iter()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect())
    }

    async fn teams(&self) -> StorageResult<Vec<String>> {
        Ok(self.distinct(|o| Some(o.team.as_str())))
    }

    async fn metrics(&self) -> StorageResult<Vec<String>> {
        Ok(self.distinct(|o| Some(o.metric.as_str())))
    }

    async fn projects(&self) -> StorageResult<Vec<String>> {
        Ok(self.distinct(|o| o.project.as_deref()))
    }

    async fn summary(&self) -> StorageResult<SourceSummary> {
        Ok(SourceSummary {
            total_records: self.observations.len() as u64,
            teams: self.teams().await?.len() as u64,
            metrics: self.metrics().await?.len() as u64,
            last_recorded: None,
        })
    }
}
