//! Tip sync job
//!
//! After a warm-up, re-processes the three most recently settled epochs on
//! a fixed interval so the tip of the dataset never waits on the backward
//! sweep. Races the sweeper safely: the per-epoch lock and the completion
//! marker decide who wins.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::ArchiverConfig;
use crate::jobs::wait_or_shutdown;
use crate::services::chain::PredictionChainService;
use crate::services::pipeline::{EpochOutcome, EpochPipeline};

/// Offsets behind the current epoch that can have settled
const TIP_OFFSETS: [u64; 3] = [2, 3, 4];

/// Start the near-tip catch-up runner.
pub async fn start_tip_sync_job(
    pipeline: Arc<EpochPipeline>,
    chain: Arc<PredictionChainService>,
    config: &ArchiverConfig,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let warmup = config.tip_warmup;
    let interval = config.tip_interval;

    tokio::spawn(async move {
        info!(
            warmup_ms = warmup.as_millis() as u64,
            interval_ms = interval.as_millis() as u64,
            "Tip sync job started, warming up"
        );

        if wait_or_shutdown(&mut shutdown, warmup).await {
            info!("Tip sync job stopped");
            return;
        }

        let mut settled_this_uptime: HashSet<u64> = HashSet::new();

        loop {
            match chain.current_epoch().await {
                Ok(current) => {
                    for offset in TIP_OFFSETS {
                        if *shutdown.borrow() {
                            break;
                        }
                        let Some(target) = current.checked_sub(offset) else {
                            continue;
                        };
                        if target == 0 || settled_this_uptime.contains(&target) {
                            continue;
                        }
                        let outcome = pipeline.process(target).await;
                        if matches!(
                            outcome,
                            EpochOutcome::Committed | EpochOutcome::AlreadyComplete
                        ) {
                            settled_this_uptime.insert(target);
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read current epoch for tip sync");
                }
            }

            if wait_or_shutdown(&mut shutdown, interval).await {
                break;
            }
        }

        info!("Tip sync job stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tip_offsets() {
        assert_eq!(TIP_OFFSETS, [2, 3, 4]);
    }
}
