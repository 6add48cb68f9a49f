//! Per-epoch processing pipeline
//!
//! check-done -> acquire lock -> locate -> harvest -> validate -> commit ->
//! release. Strictly sequential within one epoch; every exit path releases
//! the lock. Failures are recorded out-of-band and counted against a
//! sliding window; tripping the window is the one fatal path in the
//! process.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::Utc;
use chrono_tz::Tz;
use sea_orm::DatabaseConnection;
use tracing::{error, info, warn};

use crate::config::ArchiverConfig;
use crate::models::error::ArchiveError;
use crate::services::block_locator::BlockLocatorService;
use crate::services::chain::{ChainError, PredictionChainService};
use crate::services::harvester::EventHarvester;
use crate::services::lock::EpochLockService;
use crate::services::store;
use crate::services::validator;

/// How one pipeline invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochOutcome {
    Committed,
    /// Completion marker already present
    AlreadyComplete,
    /// Another worker owns the epoch
    LockBusy,
    Failed,
}

/// Sliding-window failure accounting; the process's only circuit-breaker.
pub struct FailureWindow {
    max_failures: u32,
    window: Duration,
    failures: Mutex<VecDeque<Instant>>,
}

impl FailureWindow {
    pub fn new(max_failures: u32, window: Duration) -> Self {
        Self {
            max_failures: max_failures.max(1),
            window,
            failures: Mutex::new(VecDeque::new()),
        }
    }

    /// Record a failure; true when the threshold is now exceeded.
    pub fn record_failure(&self) -> bool {
        let mut failures = self.failures.lock().unwrap();
        let now = Instant::now();
        failures.push_back(now);
        while let Some(front) = failures.front() {
            if now.duration_since(*front) > self.window {
                failures.pop_front();
            } else {
                break;
            }
        }
        failures.len() >= self.max_failures as usize
    }

    /// Successful processing resets the counter.
    pub fn record_success(&self) {
        self.failures.lock().unwrap().clear();
    }
}

/// Orchestrates one epoch end to end
pub struct EpochPipeline {
    db: DatabaseConnection,
    chain: Arc<PredictionChainService>,
    locator: Arc<BlockLocatorService>,
    harvester: EventHarvester,
    lock: EpochLockService,
    failures: FailureWindow,
    tz: Tz,
    lock_ttl: Duration,
    drift_delta: u64,
}

impl EpochPipeline {
    pub fn new(
        db: DatabaseConnection,
        chain: Arc<PredictionChainService>,
        locator: Arc<BlockLocatorService>,
        harvester: EventHarvester,
        lock: EpochLockService,
        config: &ArchiverConfig,
    ) -> Self {
        Self {
            db,
            chain,
            locator,
            harvester,
            lock,
            failures: FailureWindow::new(config.max_consecutive_failures, config.failure_window),
            tz: config.timezone,
            lock_ttl: config.lock_ttl,
            drift_delta: config.epoch_drift_delta,
        }
    }

    /// Drive one epoch through the state machine.
    pub async fn process(&self, epoch: u64) -> EpochOutcome {
        match store::is_epoch_complete(&self.db, epoch).await {
            Ok(true) => {
                info!(epoch = epoch, event = "epoch.skipped", "Epoch already complete");
                return EpochOutcome::AlreadyComplete;
            }
            Ok(false) => {}
            Err(e) => {
                return self
                    .fail(epoch, ArchiveError::Persistence(e.to_string()), false)
                    .await;
            }
        }

        if !self.lock.acquire(epoch, self.lock_ttl).await {
            info!(epoch = epoch, event = "epoch.lock_busy", "Epoch owned elsewhere");
            return EpochOutcome::LockBusy;
        }

        let started = Instant::now();
        info!(epoch = epoch, event = "epoch.started", "Processing epoch");

        match self.run_locked(epoch, started).await {
            Ok(()) => {
                self.failures.record_success();
                self.lock.release(epoch).await;
                info!(
                    epoch = epoch,
                    event = "epoch.committed",
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Epoch committed"
                );
                EpochOutcome::Committed
            }
            Err(err) => self.fail(epoch, err, true).await,
        }
    }

    /// Everything between lock acquisition and release.
    async fn run_locked(&self, epoch: u64, started: Instant) -> Result<(), ArchiveError> {
        // Locate the round's block range; the right edge comes from the next
        // round's start, or from "now" while that round does not exist yet
        let meta = self.chain.round_metadata(epoch).await?;
        if !meta.oracle_called {
            warn!(epoch = epoch, "Oracle not called for round, prices may be absent");
        }
        let next_start_ts = match self.chain.round_metadata(epoch + 1).await {
            Ok(next) if next.start_ts > 0 => next.start_ts,
            Ok(_) => Utc::now().timestamp() as u64,
            Err(ChainError::Permanent(msg)) => {
                warn!(epoch = epoch, error = %msg, "Next round unavailable, using now as right edge");
                Utc::now().timestamp() as u64
            }
            Err(e) => return Err(e.into()),
        };

        let range = self
            .locator
            .epoch_range(epoch, meta.start_ts, next_start_ts)
            .await?;

        self.extend_lock_if_needed(epoch, started).await;

        let events = self
            .harvester
            .fetch(range.from, range.to, Some(epoch))
            .await?;

        self.extend_lock_if_needed(epoch, started).await;

        let records = validator::validate(&events, epoch, &meta, self.tz, self.drift_delta)
            .map_err(ArchiveError::Validation)?;

        for warning in &records.warnings {
            warn!(epoch = epoch, warning = %warning, "Validation warning");
        }

        store::commit_epoch(&self.db, &records)
            .await
            .map_err(|e| ArchiveError::Persistence(e.to_string()))?;

        Ok(())
    }

    /// Record the failure, release the lock when held, and trip the breaker
    /// when the window overflows.
    async fn fail(&self, epoch: u64, err: ArchiveError, lock_held: bool) -> EpochOutcome {
        error!(
            epoch = epoch,
            event = "epoch.failed",
            error = %err,
            "Epoch processing failed"
        );

        store::record_epoch_error(&self.db, epoch, &err.to_string()).await;

        if lock_held {
            self.lock.release(epoch).await;
        }

        if self.failures.record_failure() {
            error!(
                epoch = epoch,
                event = "epoch.circuit_break",
                "Consecutive failure threshold exceeded, shutting down"
            );
            std::process::exit(1);
        }

        EpochOutcome::Failed
    }

    async fn extend_lock_if_needed(&self, epoch: u64, started: Instant) {
        if started.elapsed() > self.lock_ttl / 2 {
            self.lock.extend(epoch, self.lock_ttl).await;
        }
    }
}

impl From<ChainError> for ArchiveError {
    fn from(e: ChainError) -> Self {
        match e {
            ChainError::Transient(msg) => ArchiveError::RpcTransient(msg),
            ChainError::Permanent(msg) => ArchiveError::RpcPermanent(msg),
            ChainError::InvalidConfig(msg) => ArchiveError::RpcPermanent(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_window_trips_at_threshold() {
        let window = FailureWindow::new(3, Duration::from_secs(600));
        assert!(!window.record_failure());
        assert!(!window.record_failure());
        assert!(window.record_failure());
    }

    #[test]
    fn test_success_resets_window() {
        let window = FailureWindow::new(3, Duration::from_secs(600));
        assert!(!window.record_failure());
        assert!(!window.record_failure());
        window.record_success();
        assert!(!window.record_failure());
        assert!(!window.record_failure());
        assert!(window.record_failure());
    }

    #[test]
    fn test_expired_failures_fall_out_of_window() {
        let window = FailureWindow::new(2, Duration::from_millis(0));
        assert!(!window.record_failure());
        std::thread::sleep(Duration::from_millis(5));
        // The first failure aged out of the zero-length window
        assert!(!window.record_failure());
    }

    #[test]
    fn test_chain_error_mapping() {
        let e: ArchiveError = ChainError::Transient("t".into()).into();
        assert!(matches!(e, ArchiveError::RpcTransient(_)));
        let e: ArchiveError = ChainError::Permanent("p".into()).into();
        assert!(matches!(e, ArchiveError::RpcPermanent(_)));
    }
}
