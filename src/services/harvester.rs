//! Event harvester
//!
//! Pulls the six event streams over a block range, windowed and sliced to
//! respect provider limits, attaches block timestamps through the locator's
//! batched lookup and normalizes amounts to 8-digit canonical form.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::ArchiverConfig;
use crate::models::amount::from_raw_18;
use crate::models::events::{EpochEvents, EventKind, HarvestedEvent, RawEvent};
use crate::services::block_locator::BlockLocatorService;
use crate::services::chain::{ChainError, PredictionChainService};

/// Harvests contract events for the epoch pipeline
pub struct EventHarvester {
    chain: Arc<PredictionChainService>,
    locator: Arc<BlockLocatorService>,
    max_blocks_per_window: u64,
    slice_size: u64,
    slice_sleep: Duration,
}

impl EventHarvester {
    pub fn new(
        chain: Arc<PredictionChainService>,
        locator: Arc<BlockLocatorService>,
        config: &ArchiverConfig,
    ) -> Self {
        Self {
            chain,
            locator,
            max_blocks_per_window: config.max_blocks_per_window.max(1),
            slice_size: config.slice_size.max(1),
            slice_sleep: config.slice_sleep,
        }
    }

    /// Fetch all six streams over `[from, to]`.
    ///
    /// With a `target_epoch`, stake events are kept only when their embedded
    /// epoch matches (the range may cross epoch boundaries near lock/close
    /// transitions). Claims pass through: their embedded epoch is the bet
    /// epoch being settled, not the epoch they were observed in. Round
    /// lifecycle events pass through for the validator's drift check.
    pub async fn fetch(
        &self,
        from: u64,
        to: u64,
        target_epoch: Option<u64>,
    ) -> Result<EpochEvents, ChainError> {
        let mut events = EpochEvents::default();
        if from > to {
            return Ok(events);
        }

        for (window_from, window_to) in windows(from, to, self.max_blocks_per_window) {
            // Six streams in parallel per window; slicing happens inside each
            let (starts, locks, ends, ups, downs, claims) = tokio::join!(
                self.fetch_stream_sliced(EventKind::RoundStart, window_from, window_to),
                self.fetch_stream_sliced(EventKind::RoundLock, window_from, window_to),
                self.fetch_stream_sliced(EventKind::RoundEnd, window_from, window_to),
                self.fetch_stream_sliced(EventKind::StakeUp, window_from, window_to),
                self.fetch_stream_sliced(EventKind::StakeDown, window_from, window_to),
                self.fetch_stream_sliced(EventKind::Claim, window_from, window_to),
            );

            for raw in [starts?, locks?, ends?, ups?, downs?, claims?] {
                for event in raw {
                    events.stream_mut(event.kind).push(normalize(event)?);
                }
            }
        }

        self.attach_timestamps(&mut events).await?;

        if let Some(target) = target_epoch {
            let before = events.total_events();
            events.stakes_up.retain(|e| e.epoch == target);
            events.stakes_down.retain(|e| e.epoch == target);
            debug!(
                target_epoch = target,
                dropped = before - events.total_events(),
                "Filtered streams to target epoch"
            );
        }

        info!(
            from_block = from,
            to_block = to,
            starts = events.starts.len(),
            locks = events.locks.len(),
            ends = events.ends.len(),
            stakes_up = events.stakes_up.len(),
            stakes_down = events.stakes_down.len(),
            claims = events.claims.len(),
            "Harvest complete"
        );

        Ok(events)
    }

    /// One stream over one window, sliced with an inter-slice pause to
    /// respect provider rate limits.
    async fn fetch_stream_sliced(
        &self,
        kind: EventKind,
        from: u64,
        to: u64,
    ) -> Result<Vec<RawEvent>, ChainError> {
        let mut out = Vec::new();
        let mut lo = from;
        while lo <= to {
            let hi = lo.saturating_add(self.slice_size - 1).min(to);
            match self.chain.fetch_stream(kind, lo, hi).await {
                Ok(slice) => out.extend(slice),
                Err(e) => {
                    warn!(
                        kind = %kind.as_str(),
                        from = lo,
                        to = hi,
                        error = %e,
                        "Slice fetch failed"
                    );
                    return Err(e);
                }
            }
            if hi == u64::MAX {
                break;
            }
            lo = hi + 1;
            if lo <= to {
                tokio::time::sleep(self.slice_sleep).await;
            }
        }
        Ok(out)
    }

    /// Resolve the distinct block heights across all streams and stamp each
    /// event with its block timestamp.
    async fn attach_timestamps(&self, events: &mut EpochEvents) -> Result<(), ChainError> {
        let mut heights = Vec::new();
        for kind in EventKind::ALL {
            heights.extend(events.stream_mut(kind).iter().map(|e| e.block_number));
        }
        if heights.is_empty() {
            return Ok(());
        }

        let timestamps: HashMap<u64, u64> = self.locator.block_timestamps(&heights).await?;

        for kind in EventKind::ALL {
            for event in events.stream_mut(kind).iter_mut() {
                match timestamps.get(&event.block_number) {
                    Some(ts) => event.timestamp = *ts as i64,
                    None => warn!(
                        block_number = event.block_number,
                        "No timestamp resolved for event block"
                    ),
                }
            }
        }

        Ok(())
    }
}

/// Convert a decoded log into its harvested form: canonical amount,
/// lowercased wallet, timestamp attached later.
fn normalize(raw: RawEvent) -> Result<HarvestedEvent, ChainError> {
    let amount = match raw.value {
        Some(value) => Some(from_raw_18(value).ok_or_else(|| {
            ChainError::Permanent(format!(
                "amount overflow in {} event (tx {})",
                raw.kind.as_str(),
                raw.tx_hash
            ))
        })?),
        None => None,
    };

    Ok(HarvestedEvent {
        kind: raw.kind,
        epoch: raw.epoch,
        sender: raw.sender.map(|a| format!("{:?}", a).to_lowercase()),
        amount,
        block_number: raw.block_number,
        timestamp: 0,
        tx_hash: raw.tx_hash,
        log_index: raw.log_index,
    })
}

/// Split `[from, to]` into contiguous windows of at most `width` blocks.
pub(crate) fn windows(from: u64, to: u64, width: u64) -> Vec<(u64, u64)> {
    let mut out = Vec::new();
    let mut lo = from;
    while lo <= to {
        let hi = lo.saturating_add(width - 1).min(to);
        out.push((lo, hi));
        if hi == u64::MAX {
            break;
        }
        lo = hi + 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;

    #[test]
    fn test_windows_single_when_small() {
        assert_eq!(windows(100, 199, 1_000), vec![(100, 199)]);
    }

    #[test]
    fn test_windows_split_on_boundary() {
        assert_eq!(
            windows(0, 249_999, 100_000),
            vec![(0, 99_999), (100_000, 199_999), (200_000, 249_999)]
        );
    }

    #[test]
    fn test_windows_exact_multiple() {
        assert_eq!(windows(10, 29, 10), vec![(10, 19), (20, 29)]);
    }

    #[test]
    fn test_windows_empty_range() {
        assert!(windows(5, 4, 10).is_empty());
    }

    #[test]
    fn test_normalize_scales_and_lowercases() {
        let raw = RawEvent {
            kind: EventKind::StakeUp,
            epoch: 42,
            sender: Some(alloy::primitives::Address::repeat_byte(0xAB)),
            value: Some(U256::from(2_500_000_000_000_000_000u128)),
            block_number: 7,
            tx_hash: "0xdead".to_string(),
            log_index: 3,
        };
        let event = normalize(raw).unwrap();
        assert_eq!(event.amount.unwrap().to_string(), "2.50000000");
        let sender = event.sender.unwrap();
        assert!(sender.starts_with("0x"));
        assert_eq!(sender, sender.to_lowercase());
    }
}
