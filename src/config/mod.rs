use std::env;
use std::path::PathBuf;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub mitigation: MitigationConfig,
    pub benchmarks: BenchmarkConfig,
    pub logging: LoggingConfig,
}

/// Database configuration for the observation store
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

/// Where mitigation plans are persisted
#[derive(Debug, Clone)]
pub struct MitigationConfig {
    pub backend: MitigationBackend,
    pub path: PathBuf,
}

/// Mitigation plan storage backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MitigationBackend {
    /// Single JSON document at `MitigationConfig::path`.
    Json,
    /// `mitigation_plans` table in the observation database.
    Sqlite,
}

/// Benchmark catalog location
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    pub path: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/metrics.db".to_string()),
            ),
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        };

        let backend = match env::var("MITIGATION_BACKEND")
            .unwrap_or_else(|_| "json".to_string())
            .to_lowercase()
            .as_str()
        {
            "json" => MitigationBackend::Json,
            "sqlite" => MitigationBackend::Sqlite,
            other => {
                return Err(AppError::Config {
                    message: format!("Unsupported MITIGATION_BACKEND: {}", other),
                })
            }
        };

        let mitigation = MitigationConfig {
            backend,
            path: PathBuf::from(
                env::var("MITIGATION_PATH")
                    .unwrap_or_else(|_| "./data/mitigation_plans.json".to_string()),
            ),
        };

        let benchmarks = BenchmarkConfig {
            path: PathBuf::from(
                env::var("BENCHMARKS_PATH")
                    .unwrap_or_else(|_| "./benchmarks/industry_benchmarks.json".to_string()),
            ),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        Ok(Config {
            database,
            mitigation,
            benchmarks,
            logging,
        })
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/metrics.db"),
            max_connections: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}
