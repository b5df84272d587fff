use std::sync::Arc;
use std::time::Duration;

use algowatch::{
    api::{ApiConfig, ApiState, spawn_api_server},
    backends::Registry,
    config::{StorageConfig, read_config_file},
    executor::RunExecutor,
    lifecycle::Lifecycle,
    measure::PrometheusMeasurer,
    metrics::CheckMetrics,
    storage::{AuditStore, MemoryBackend, sqlite::SqliteBackend},
};
use anyhow::Context;
use clap::Parser;
use tracing::{info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

/// How long in-flight runs get to unwind after a signal
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

const MEASUREMENT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Parser)]
#[command(version, about = "Scheduled metric checks with automated actions")]
struct Args {
    /// Config file
    #[arg(short, long, default_value = "algowatch.json")]
    config: String,

    /// Log everything down to TRACE
    #[arg(long)]
    verbose: bool,
}

fn init(verbose: bool) {
    let level = if verbose {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    };
    let filter = filter::Targets::new().with_targets(vec![
        ("algowatch", level),
        ("algowatch_agent", level),
        ("tower_http", level),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

async fn open_store(config: &StorageConfig) -> anyhow::Result<Arc<dyn AuditStore>> {
    let store: Arc<dyn AuditStore> = match config {
        StorageConfig::Sqlite { path } => Arc::new(
            SqliteBackend::new(path)
                .await
                .with_context(|| format!("failed to open audit database {}", path.display()))?,
        ),
        StorageConfig::None => {
            warn!("audit log is kept in memory only");
            Arc::new(MemoryBackend::new())
        }
    };
    Ok(store)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init(args.verbose);
    trace!("started with args: {args:?}");

    let config = read_config_file(&args.config)?;
    config.validate()?;

    let store = open_store(&config.storage).await?;
    let metrics = CheckMetrics::new().context("failed to register check counters")?;
    let registry = Registry::from_config(&config.algorithmers, &config.actioners)?;
    let measurer = Arc::new(PrometheusMeasurer::new(MEASUREMENT_TIMEOUT)?);

    let base_working_dir = config
        .base_working_dir
        .clone()
        .unwrap_or_else(std::env::temp_dir);
    std::fs::create_dir_all(&base_working_dir).with_context(|| {
        format!(
            "failed to create working directory {}",
            base_working_dir.display()
        )
    })?;

    let mut lifecycle = Lifecycle::new();
    let executor = Arc::new(
        RunExecutor::new(registry, measurer, store.clone(), metrics.clone())
            .with_datasources(config.datasources.clone())
            .with_shutdown(
                lifecycle.shutdown_broadcast().clone(),
                lifecycle.cancel_registry().clone(),
            )
            .with_base_working_dir(base_working_dir),
    );

    let api_config = ApiConfig {
        bind_addr: config.metrics_listen_addr,
    };
    let addr = spawn_api_server(api_config, ApiState::new(store.clone(), metrics))
        .await
        .context("failed to start API server")?;
    info!("serving metrics on http://{addr}/metrics");

    lifecycle.start(config.checks, executor);

    let signal = Lifecycle::wait_for_signal().await?;
    info!("{signal}: shutting down");

    lifecycle.shutdown();
    if !lifecycle.drain(SHUTDOWN_GRACE).await {
        warn!("exiting with runs still in flight");
    }

    store.close().await?;
    Ok(())
}
