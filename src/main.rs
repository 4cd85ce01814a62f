use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use metricboard::{
    cli::{execute_command, Cli, CliContext},
    config::{Config, LogFormat, MitigationBackend},
    metrics::BenchmarkCatalog,
    mitigation::MitigationStore,
    storage::{JsonFileStorage, PlanStorage, SqliteStorage},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(&config);

    info!(version = env!("CARGO_PKG_VERSION"), "metricboard starting");

    // Initialize storage
    let storage = match SqliteStorage::new(&config.database).await {
        Ok(s) => {
            info!(path = %config.database.path.display(), "Database initialized");
            s
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize database");
            return Err(e.into());
        }
    };

    let plan_storage: Arc<dyn PlanStorage> = match config.mitigation.backend {
        MitigationBackend::Json => {
            info!(path = %config.mitigation.path.display(), "Using JSON plan storage");
            Arc::new(JsonFileStorage::new(&config.mitigation.path))
        }
        MitigationBackend::Sqlite => {
            info!("Using SQLite plan storage");
            Arc::new(storage.clone())
        }
    };
    let plans = MitigationStore::open(plan_storage).await;

    let benchmarks = match BenchmarkCatalog::from_path(&config.benchmarks.path) {
        Ok(catalog) => catalog,
        Err(e) => {
            warn!(error = %e, "Benchmarks unavailable, using an empty catalog");
            BenchmarkCatalog::new()
        }
    };

    let ctx = CliContext {
        storage: &storage,
        plans: &plans,
        benchmarks: &benchmarks,
    };
    let result = execute_command(cli.command, &ctx).await;

    if result.exit_code == 0 {
        println!("{}", result.message);
    } else {
        eprintln!("{}", result.message);
    }
    std::process::exit(result.exit_code);
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
