//! # Metricboard
//!
//! Team performance analytics and mitigation tracking.
//!
//! ## Features
//!
//! - **Statistics**: descriptive statistics, percentiles, trends, and outliers per metric
//! - **Comparison**: team-vs-team, baseline differences, best/worst, and benchmark gaps
//! - **Ranking**: min-max normalized team scores across metrics
//! - **Period Comparison**: metric change between two date ranges
//! - **Mitigation Plans**: per-team remediation plans with action items and derived progress
//!
//! ## Architecture
//!
//! ```text
//! CLI → ObservationSource (SQLite) → metrics (pure analytics)
//!   ↓
//! MitigationStore → PlanStorage (JSON file | SQLite)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use metricboard::metrics::{self, MetricFilter};
//! use metricboard::mitigation::{MitigationStore, NewPlan};
//! use metricboard::storage::{JsonFileStorage, ObservationSource, SqliteStorage};
//! use metricboard::Config;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let storage = SqliteStorage::new(&config.database).await?;
//!     let observations = storage.query(&MetricFilter::new()).await?;
//!     let stats = metrics::statistics(&observations, "velocity");
//!
//!     let plans = MitigationStore::open(Arc::new(JsonFileStorage::new(&config.mitigation.path))).await;
//!     plans
//!         .create_plan(NewPlan::new("velocity", "Platform").with_values(stats.mean, stats.mean * 1.1))
//!         .await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Command-line front end.
pub mod cli;
/// Configuration management.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Observations and analytics over them.
pub mod metrics;
/// Mitigation plans, action items, and the plan store.
pub mod mitigation;
/// Storage ports and adapters for observations and plans.
pub mod storage;

pub use config::Config;
pub use error::{AppError, AppResult};
