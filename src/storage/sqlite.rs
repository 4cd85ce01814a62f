use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};
use tracing::{debug, info};

use super::{ObservationSource, PlanStorage, SourceSummary};
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};
use crate::metrics::{MetricFilter, Observation};
use crate::mitigation::MitigationPlan;

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed storage for observations and mitigation plans
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (creating if needed) the database at `config.path`
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                    message: format!("Failed to create database directory: {}", e),
                })?;
            }
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());
        Self::connect(&database_url, config.max_connections).await
    }

    /// Private in-memory database, used by tests
    pub async fn new_in_memory() -> StorageResult<Self> {
        // A second connection would see a different empty database.
        Self::connect("sqlite::memory:", 1).await
    }

    async fn connect(database_url: &str, max_connections: u32) -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR.run(&self.pool).await.map_err(|e| StorageError::Migration {
            message: format!("Failed to run migrations: {}", e),
        })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Record a batch of observations in one transaction.
    ///
    /// The whole batch is rejected if any row has an empty team or metric
    /// or a non-finite value.
    pub async fn insert_observations(&self, observations: &[Observation]) -> StorageResult<u64> {
        if let Some(bad) = observations.iter().find(|o| !o.is_valid()) {
            return Err(StorageError::InvalidRecord {
                message: format!(
                    "team={:?} metric={:?} value={}",
                    bad.team, bad.metric, bad.value
                ),
            });
        }

        let recorded_at = format_timestamp(Utc::now());
        let mut tx = self.pool.begin().await?;
        for obs in observations {
            sqlx::query(
                r#"
                INSERT INTO observations
                    (team, metric, value, date, category, unit, project, notes, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&obs.team)
            .bind(&obs.metric)
            .bind(obs.value)
            .bind(obs.date.map(format_timestamp))
            .bind(&obs.category)
            .bind(&obs.unit)
            .bind(&obs.project)
            .bind(&obs.notes)
            .bind(&recorded_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        debug!(count = observations.len(), "Recorded observations");
        Ok(observations.len() as u64)
    }

    async fn distinct(&self, column: &str) -> StorageResult<Vec<String>> {
        let sql = format!(
            "SELECT DISTINCT {column} FROM observations \
             WHERE {column} IS NOT NULL AND {column} != '' ORDER BY {column}"
        );
        let values: Vec<String> = sqlx::query_scalar(&sql).fetch_all(&self.pool).await?;
        Ok(values)
    }
}

/// Fixed-width UTC form, so stored dates compare correctly as text.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(raw: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::InvalidRecord {
            message: format!("bad timestamp {:?}: {}", raw, e),
        })
}

fn push_in_list(qb: &mut QueryBuilder<'_, Sqlite>, column: &str, values: &[String]) {
    if values.is_empty() {
        return;
    }
    qb.push(format!(" AND {column} IN ("));
    let mut separated = qb.separated(", ");
    for value in values {
        separated.push_bind(value.clone());
    }
    separated.push_unseparated(")");
}

#[async_trait]
impl ObservationSource for SqliteStorage {
    async fn query(&self, filter: &MetricFilter) -> StorageResult<Vec<Observation>> {
        let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
            "SELECT team, metric, value, date, category, unit, project, notes \
             FROM observations WHERE 1 = 1",
        );
        push_in_list(&mut qb, "team", &filter.teams);
        push_in_list(&mut qb, "metric", &filter.metrics);
        push_in_list(&mut qb, "project", &filter.projects);
        if let Some(start) = filter.start {
            qb.push(" AND date >= ").push_bind(format_timestamp(start));
        }
        if let Some(end) = filter.end {
            qb.push(" AND date <= ").push_bind(format_timestamp(end));
        }
        qb.push(" ORDER BY id");

        let rows: Vec<ObservationRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(Observation::try_from).collect()
    }

    async fn teams(&self) -> StorageResult<Vec<String>> {
        self.distinct("team").await
    }

    async fn metrics(&self) -> StorageResult<Vec<String>> {
        self.distinct("metric").await
    }

    async fn projects(&self) -> StorageResult<Vec<String>> {
        self.distinct("project").await
    }

    async fn summary(&self) -> StorageResult<SourceSummary> {
        let (total, teams, metrics, last): (i64, i64, i64, Option<String>) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COUNT(DISTINCT team), COUNT(DISTINCT metric), MAX(created_at)
            FROM observations
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(SourceSummary {
            total_records: total as u64,
            teams: teams as u64,
            metrics: metrics as u64,
            last_recorded: last.as_deref().map(parse_timestamp).transpose()?,
        })
    }
}

#[async_trait]
impl PlanStorage for SqliteStorage {
    async fn load(&self) -> StorageResult<HashMap<String, MitigationPlan>> {
        let documents: Vec<String> =
            sqlx::query_scalar("SELECT document FROM mitigation_plans ORDER BY id")
                .fetch_all(&self.pool)
                .await?;

        let mut plans = HashMap::with_capacity(documents.len());
        for document in documents {
            let plan: MitigationPlan = serde_json::from_str(&document)?;
            plans.insert(plan.id.clone(), plan);
        }
        Ok(plans)
    }

    async fn save(&self, plans: &HashMap<String, MitigationPlan>) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM mitigation_plans")
            .execute(&mut *tx)
            .await?;

        for plan in plans.values() {
            let document = serde_json::to_string(plan)?;
            sqlx::query(
                r#"
                INSERT INTO mitigation_plans (id, document, updated_at)
                VALUES (?, ?, ?)
                "#,
            )
            .bind(&plan.id)
            .bind(&document)
            .bind(format_timestamp(plan.updated_at))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        debug!(plans = plans.len(), "Saved mitigation plans to SQLite");
        Ok(())
    }
}

// Internal row type for SQLx mapping
#[derive(sqlx::FromRow)]
struct ObservationRow {
    team: String,
    metric: String,
    value: f64,
    date: Option<String>,
    category: Option<String>,
    unit: Option<String>,
    project: Option<String>,
    notes: Option<String>,
}

impl TryFrom<ObservationRow> for Observation {
    type Error = StorageError;

    fn try_from(row: ObservationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            team: row.team,
            metric: row.metric,
            value: row.value,
            date: row.date.as_deref().map(parse_timestamp).transpose()?,
            category: row.category,
            unit: row.unit,
            project: row.project,
            notes: row.notes,
        })
    }
}
