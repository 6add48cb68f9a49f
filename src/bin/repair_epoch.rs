//! Data-repair path: wipe one epoch's persisted records and completion
//! marker, then run the pipeline for it once.

use std::env;
use std::sync::Arc;

use sea_orm::Database;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use prediction_archiver::config::ArchiverConfig;
use prediction_archiver::services::block_locator::BlockLocatorService;
use prediction_archiver::services::chain::PredictionChainService;
use prediction_archiver::services::harvester::EventHarvester;
use prediction_archiver::services::lock::EpochLockService;
use prediction_archiver::services::pipeline::{EpochOutcome, EpochPipeline};
use prediction_archiver::services::store;

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

    // Get epoch from command line args
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: cargo run --bin repair_epoch <epoch>");
        eprintln!("Example: cargo run --bin repair_epoch 426236");
        std::process::exit(1);
    }

    let epoch: u64 = match args[1].parse() {
        Ok(epoch) => epoch,
        Err(_) => {
            eprintln!("Invalid epoch. Must be a number.");
            std::process::exit(1);
        }
    };

    let config = match ArchiverConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Configuration error");
            std::process::exit(1);
        }
    };

    // Connect to database
    tracing::info!("Connecting to database...");
    let db = match Database::connect(config.postgres_url_with_timeouts()).await {
        Ok(db) => db,
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to database");
            std::process::exit(1);
        }
    };

    let chain = match PredictionChainService::new(&config.rpc_url, &config.contract_addr).await {
        Ok(service) => Arc::new(service),
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize chain service");
            std::process::exit(1);
        }
    };

    let lock = match EpochLockService::connect(&config.redis_url, &config.lock_namespace).await {
        Ok(service) => service,
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to lock service");
            std::process::exit(1);
        }
    };

    let locator = Arc::new(BlockLocatorService::new(chain.clone(), &config));
    let harvester = EventHarvester::new(chain.clone(), locator.clone(), &config);
    let pipeline = EpochPipeline::new(db.clone(), chain, locator, harvester, lock, &config);

    tracing::info!(epoch = epoch, "Wiping persisted records for epoch");
    if let Err(e) = store::delete_epoch(&db, epoch).await {
        tracing::error!(epoch = epoch, error = %e, "Failed to delete epoch records");
        std::process::exit(1);
    }

    tracing::info!(epoch = epoch, "Re-running pipeline for epoch");
    match pipeline.process(epoch).await {
        EpochOutcome::Committed => {
            tracing::info!(epoch = epoch, "Epoch repaired successfully");
        }
        outcome => {
            tracing::error!(epoch = epoch, outcome = ?outcome, "Epoch repair did not commit");
            std::process::exit(1);
        }
    }
}
