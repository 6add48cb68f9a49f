use std::sync::Arc;
use std::time::Duration;

use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::MigratorTrait;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use prediction_archiver::config::ArchiverConfig;
use prediction_archiver::jobs::{historical_sweep, tip_sync};
use prediction_archiver::services::block_locator::BlockLocatorService;
use prediction_archiver::services::chain::PredictionChainService;
use prediction_archiver::services::harvester::EventHarvester;
use prediction_archiver::services::lock::EpochLockService;
use prediction_archiver::services::pipeline::EpochPipeline;

/// Store pool sizing
const DB_MAX_CONNECTIONS: u32 = 10;
const DB_MIN_CONNECTIONS: u32 = 2;
const DB_CONNECT_TIMEOUT_SECS: u64 = 10;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,prediction_archiver=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = match ArchiverConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Configuration error");
            std::process::exit(1);
        }
    };

    // Connect to database; the statement timeout rides on the URL so every
    // pooled connection carries it
    tracing::info!("Connecting to database...");
    let mut opts = ConnectOptions::new(config.postgres_url_with_timeouts());
    opts.max_connections(DB_MAX_CONNECTIONS)
        .min_connections(DB_MIN_CONNECTIONS)
        .connect_timeout(Duration::from_secs(DB_CONNECT_TIMEOUT_SECS))
        .sqlx_logging(false);
    let db = match Database::connect(opts).await {
        Ok(db) => db,
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to database");
            std::process::exit(1);
        }
    };

    // Run migrations
    tracing::info!("Running migrations...");
    if let Err(e) = migration::Migrator::up(&db, None).await {
        tracing::error!(error = %e, "Failed to run migrations");
        std::process::exit(1);
    }

    // Chain access
    let chain = match PredictionChainService::new(&config.rpc_url, &config.contract_addr).await {
        Ok(service) => Arc::new(service),
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize chain service");
            std::process::exit(1);
        }
    };

    // Lock service
    let lock = match EpochLockService::connect(&config.redis_url, &config.lock_namespace).await {
        Ok(service) => service,
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to lock service");
            std::process::exit(1);
        }
    };

    let locator = Arc::new(BlockLocatorService::new(chain.clone(), &config));
    let harvester = EventHarvester::new(chain.clone(), locator.clone(), &config);
    let pipeline = Arc::new(EpochPipeline::new(
        db.clone(),
        chain.clone(),
        locator,
        harvester,
        lock,
        &config,
    ));

    // Shutdown fan-out: jobs finish their in-flight epoch, then stop
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sweep_handle = historical_sweep::start_historical_sweep_job(
        pipeline.clone(),
        chain.clone(),
        &config,
        shutdown_rx.clone(),
    )
    .await;

    let tip_handle =
        tip_sync::start_tip_sync_job(pipeline, chain, &config, shutdown_rx.clone()).await;

    tracing::info!("Archiver running");

    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
    }

    let _ = shutdown_tx.send(true);

    if let Err(e) = sweep_handle.await {
        tracing::error!(error = %e, "Historical sweep task panicked");
    }
    if let Err(e) = tip_handle.await {
        tracing::error!(error = %e, "Tip sync task panicked");
    }

    tracing::info!("Archiver stopped");
}
