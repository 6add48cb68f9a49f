//! Historical sweep job
//!
//! Walks epochs backward from two behind the current epoch, processing a
//! bounded batch per cycle with a pause in between. The driver restarts
//! from the tip on a fixed schedule to release accumulated resources. An
//! in-memory set of epochs settled this uptime trims redundant completion
//! checks; the completion table stays the source of truth.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::ArchiverConfig;
use crate::jobs::wait_or_shutdown;
use crate::services::chain::PredictionChainService;
use crate::services::pipeline::{EpochOutcome, EpochPipeline};

/// Epochs handed to the pipeline per cycle before yielding
const EPOCHS_PER_CYCLE: usize = 10;

/// Pause between cycles
const CYCLE_PAUSE_SECS: u64 = 5;

/// The most recent epoch that can have settled: current minus two
const FIRST_SETTLED_OFFSET: u64 = 2;

/// Start the backward historical sweeper.
pub async fn start_historical_sweep_job(
    pipeline: Arc<EpochPipeline>,
    chain: Arc<PredictionChainService>,
    config: &ArchiverConfig,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let restart_after = config.main_restart;

    tokio::spawn(async move {
        info!(
            restart_after_ms = restart_after.as_millis() as u64,
            "Historical sweep job started"
        );

        'driver: loop {
            if *shutdown.borrow() {
                break;
            }

            let driver_started = Instant::now();

            let current = match chain.current_epoch().await {
                Ok(epoch) => epoch,
                Err(e) => {
                    warn!(error = %e, "Failed to read current epoch, retrying shortly");
                    if wait_or_shutdown(&mut shutdown, Duration::from_secs(CYCLE_PAUSE_SECS)).await
                    {
                        break 'driver;
                    }
                    continue;
                }
            };

            let mut settled_this_uptime: HashSet<u64> = HashSet::new();
            let mut next = current.saturating_sub(FIRST_SETTLED_OFFSET);

            info!(
                current_epoch = current,
                sweep_from = next,
                "Sweeping backward"
            );

            loop {
                if *shutdown.borrow() {
                    break 'driver;
                }
                if driver_started.elapsed() >= restart_after {
                    info!(event = "sweep.restart", "Restart interval reached");
                    continue 'driver;
                }

                let mut processed = 0;
                while processed < EPOCHS_PER_CYCLE && next >= 1 {
                    if *shutdown.borrow() {
                        break 'driver;
                    }
                    if !settled_this_uptime.contains(&next) {
                        let outcome = pipeline.process(next).await;
                        if matches!(
                            outcome,
                            EpochOutcome::Committed | EpochOutcome::AlreadyComplete
                        ) {
                            settled_this_uptime.insert(next);
                        }
                        processed += 1;
                    }
                    next -= 1;
                }

                if next == 0 {
                    info!("Sweep reached genesis, restarting from the tip");
                    if wait_or_shutdown(&mut shutdown, Duration::from_secs(CYCLE_PAUSE_SECS)).await
                    {
                        break 'driver;
                    }
                    continue 'driver;
                }

                if wait_or_shutdown(&mut shutdown, Duration::from_secs(CYCLE_PAUSE_SECS)).await {
                    break 'driver;
                }
            }
        }

        info!("Historical sweep job stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_defaults() {
        assert_eq!(EPOCHS_PER_CYCLE, 10);
        assert_eq!(CYCLE_PAUSE_SECS, 5);
        assert_eq!(FIRST_SETTLED_OFFSET, 2);
    }
}
