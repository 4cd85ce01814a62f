//! Static benchmark catalog.
//!
//! Benchmarks are read from a JSON document grouped by category:
//!
//! ```json
//! {
//!   "productivity": {
//!     "velocity": { "value": 40.0, "unit": "points" }
//!   }
//! }
//! ```
//!
//! and flattened to a `metric -> target` map for [`benchmark_comparison`].
//!
//! [`benchmark_comparison`]: super::comparison::benchmark_comparison

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AppError, AppResult};

/// A single benchmark target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkEntry {
    /// Target value. Missing values read as 0, which can never be met.
    #[serde(default)]
    pub value: f64,
    /// Unit of measure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Benchmarks grouped by category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BenchmarkCatalog {
    categories: BTreeMap<String, BTreeMap<String, BenchmarkEntry>>,
}

impl BenchmarkCatalog {
    /// Empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a catalog from a JSON file.
    pub fn from_path(path: &Path) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| AppError::Config {
            message: format!("Failed to read benchmarks {}: {}", path.display(), e),
        })?;
        let catalog = Self::from_json(&raw)?;
        debug!(path = %path.display(), metrics = catalog.len(), "Loaded benchmarks");
        Ok(catalog)
    }

    /// Parse a catalog from a JSON string.
    pub fn from_json(raw: &str) -> AppResult<Self> {
        serde_json::from_str(raw).map_err(|e| AppError::Config {
            message: format!("Invalid benchmark catalog: {}", e),
        })
    }

    /// Add or replace a benchmark
    pub fn insert(&mut self, category: impl Into<String>, metric: impl Into<String>, entry: BenchmarkEntry) {
        self.categories
            .entry(category.into())
            .or_default()
            .insert(metric.into(), entry);
    }

    /// Target for `metric`, searching every category.
    pub fn get(&self, metric: &str) -> Option<&BenchmarkEntry> {
        self.categories.values().find_map(|m| m.get(metric))
    }

    /// Category that holds `metric`.
    pub fn category_of(&self, metric: &str) -> Option<&str> {
        self.categories
            .iter()
            .find(|(_, metrics)| metrics.contains_key(metric))
            .map(|(category, _)| category.as_str())
    }

    /// Category names, sorted.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    /// Number of benchmarked metrics.
    pub fn len(&self) -> usize {
        self.categories.values().map(BTreeMap::len).sum()
    }

    /// Whether the catalog holds no benchmarks.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flattened `metric -> target` map.
    ///
    /// If a metric appears under several categories the first category in
    /// name order wins.
    pub fn values(&self) -> HashMap<String, f64> {
        let mut out = HashMap::new();
        for metrics in self.categories.values() {
            for (metric, entry) in metrics {
                out.entry(metric.clone()).or_insert(entry.value);
            }
        }
        out
    }
}
