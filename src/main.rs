mod init;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use daq_batch::BatchSink;
use daq_config::RuntimeConfig;
use daq_ingestion::IngestionPipeline;
use daq_metadata::{MetadataRepository, PgMetadataRepository, TagCache};
use daq_runtime::WorkerLoop;
use daq_storage::{PgRelationalStore, RelationalStore, Spool};
use daq_subscription::{SimulatorSubscription, SubscriptionManager};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing::info;

/// OPC UA tag ingestion worker
#[derive(Parser)]
#[command(name = "daq-worker")]
#[command(version)]
#[command(about = "Subscribes to OPC UA tags, validates and batches samples, and stores them with store-and-forward resilience", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Force the synthetic subscription source regardless of config
    #[arg(long)]
    use_simulator: bool,

    /// Log level: trace, debug, info, warn, error (overrides config file)
    #[arg(short = 'v', long, value_name = "LEVEL")]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    if let Some(path) = &cli.config {
        std::env::set_var("DAQ_CONFIG", path);
    }

    let mut config = RuntimeConfig::load().context("failed to load configuration")?;

    if cli.use_simulator {
        config.opc.use_simulator = true;
    }
    if let Some(level) = &cli.log_level {
        config.logging.log_level = level.clone();
    }

    init::init_tracing(&config);
    init::validate_environment(&config)?;

    run_worker(config).await
}

async fn run_worker(config: RuntimeConfig) -> Result<()> {
    info!("starting daq-worker");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.storage.connection_string)
        .await
        .context("failed to connect to the relational store")?;

    let repository: Arc<dyn MetadataRepository> = Arc::new(PgMetadataRepository::new(pool.clone()));
    let cache = Arc::new(TagCache::new(repository.clone()));

    let spool = Arc::new(
        Spool::new(
            &config.resilience.store_forward_path,
            config.resilience.max_local_storage_records,
        )
        .context("failed to initialize the store-and-forward spool")?,
    );
    let store: Arc<dyn RelationalStore> = Arc::new(PgRelationalStore::new(pool));
    let sink = BatchSink::new(
        store,
        spool,
        config.batch.auto_flush_threshold,
        config.batch.max_chunk,
    );

    let ingestion = Arc::new(IngestionPipeline::new(cache, sink.clone()));

    let machines = repository
        .list_active_machines()
        .await
        .context("failed to load machine and tag metadata")?;
    info!(machine_count = machines.len(), "loaded active machines");

    let subscriptions: Arc<dyn SubscriptionManager> =
        Arc::new(SimulatorSubscription::new(machines, ingestion));

    let worker = WorkerLoop::new(subscriptions, sink, config.batch.flush_interval());

    worker
        .run(shutdown_signal())
        .await
        .context("worker loop exited with an error")?;

    info!("daq-worker exited cleanly");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("received SIGTERM, starting graceful shutdown");
        }
    }
}
