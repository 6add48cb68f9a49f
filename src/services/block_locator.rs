//! Timestamp-to-block search
//!
//! The contract exposes no (timestamp -> block) index, so epoch boundaries
//! are found by seeded probing: linear extrapolation from the last known
//! anchor, a few fixed strides, a short binary search and a bounded
//! one-block correction. A slower multi-sample regression pass backs the
//! fast path up when it lands too far off without an anchor.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::ArchiverConfig;
use crate::services::chain::{ChainError, PredictionChainService};

const SECONDS_PER_DAY: u64 = 86_400;

/// Outward stride probes before tightening
const MAX_STRIDE_PROBES: u32 = 3;

/// Binary-search iterations over the stride bracket
const MAX_BINARY_ITERS: u32 = 2;

/// Fast-path residual beyond which the regression fallback runs
const FALLBACK_RESIDUAL_SECS: u64 = 300;

/// Evenly distributed probes for the regression fallback
const REGRESSION_SAMPLES: usize = 5;

/// Binary-search iterations in the regression fallback
const MAX_FALLBACK_BINARY_ITERS: u32 = 25;

/// Entry caps; expired entries are dropped first, then the oldest
const RANGE_CACHE_MAX: usize = 1_024;
const TS_CACHE_MAX: usize = 8_192;

/// Which side of the target the returned block must satisfy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeMode {
    /// First block with timestamp >= target (range start)
    FirstAtOrAfter,
    /// Last block with timestamp < target (range end, right-exclusive)
    LastBefore,
}

/// Resolved block span of one epoch, inclusive on both ends
#[derive(Debug, Clone, Copy)]
pub struct EpochBlockRange {
    pub from: u64,
    pub to: u64,
}

#[derive(Debug, Clone, Copy)]
struct BlockAnchor {
    height: u64,
    timestamp: u64,
}

struct RangeCacheEntry {
    range: EpochBlockRange,
    cached_at: Instant,
}

struct TsCacheEntry {
    timestamp: u64,
    cached_at: Instant,
}

/// Block locator with per-epoch range and per-block timestamp caches
pub struct BlockLocatorService {
    chain: Arc<PredictionChainService>,
    range_cache: RwLock<HashMap<u64, RangeCacheEntry>>,
    ts_cache: RwLock<HashMap<u64, TsCacheEntry>>,
    anchor: RwLock<Option<BlockAnchor>>,
    range_cache_ttl: Duration,
    ts_cache_ttl: Duration,
    seconds_per_block: u64,
    stride: u64,
    header_batch: usize,
}

impl BlockLocatorService {
    pub fn new(chain: Arc<PredictionChainService>, config: &ArchiverConfig) -> Self {
        Self {
            chain,
            range_cache: RwLock::new(HashMap::new()),
            ts_cache: RwLock::new(HashMap::new()),
            anchor: RwLock::new(None),
            range_cache_ttl: config.block_range_cache_ttl,
            ts_cache_ttl: config.block_ts_cache_ttl,
            seconds_per_block: config.block_time_secs.max(1),
            stride: config.block_search_stride,
            header_batch: config.block_header_batch,
        }
    }

    /// Block span of `epoch`: first block at or after `start_ts` through the
    /// last block strictly before `next_start_ts`.
    pub async fn epoch_range(
        &self,
        epoch: u64,
        start_ts: u64,
        next_start_ts: u64,
    ) -> Result<EpochBlockRange, ChainError> {
        {
            let cache = self.range_cache.read().await;
            if let Some(entry) = cache.get(&epoch) {
                if entry.cached_at.elapsed() < self.range_cache_ttl {
                    debug!(epoch = epoch, event = "locator.cache_hit", "Range cache hit");
                    return Ok(entry.range);
                }
            }
        }

        let from = self.locate(start_ts, EdgeMode::FirstAtOrAfter).await?;
        let to = self.locate(next_start_ts, EdgeMode::LastBefore).await?;
        let range = EpochBlockRange {
            from,
            to: to.max(from),
        };

        info!(
            epoch = epoch,
            from_block = range.from,
            to_block = range.to,
            "Resolved epoch block range"
        );

        let mut cache = self.range_cache.write().await;
        prune(&mut cache, self.range_cache_ttl, RANGE_CACHE_MAX, |e| {
            e.cached_at
        });
        cache.insert(
            epoch,
            RangeCacheEntry {
                range,
                cached_at: Instant::now(),
            },
        );

        Ok(range)
    }

    /// Find the block satisfying `mode` against `target_ts`.
    pub async fn locate(&self, target_ts: u64, mode: EdgeMode) -> Result<u64, ChainError> {
        let latest = self.chain.latest_block_height().await?;
        let anchor = *self.anchor.read().await;
        let had_anchor = anchor.is_some();

        // Seed: linear extrapolation from the anchor, or a day behind the tip
        let seed = match anchor {
            Some(a) => estimate_from_anchor(
                a.height,
                a.timestamp,
                target_ts,
                self.seconds_per_block,
                latest,
            ),
            None => latest.saturating_sub(SECONDS_PER_DAY / self.seconds_per_block),
        }
        .clamp(1, latest);

        // Stride outward toward the target
        let mut probe = seed;
        let mut probe_ts = self.block_timestamp(probe).await?;
        for _ in 0..MAX_STRIDE_PROBES {
            if probe_ts < target_ts && probe < latest {
                probe = (probe + self.stride).min(latest);
            } else if probe_ts >= target_ts && probe > 1 {
                probe = probe.saturating_sub(self.stride).max(1);
            } else {
                break;
            }
            probe_ts = self.block_timestamp(probe).await?;
        }

        // Tighten inside the stride bracket
        let mut lo = probe.saturating_sub(self.stride).max(1);
        let mut hi = (probe + self.stride).min(latest);
        for _ in 0..MAX_BINARY_ITERS {
            if lo >= hi {
                break;
            }
            let mid = lo + (hi - lo) / 2;
            if self.block_timestamp(mid).await? < target_ts {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }

        let mut height = lo + (hi - lo) / 2;
        height = self.correct_boundary(height, target_ts, mode, latest).await?;

        let final_ts = self.block_timestamp(height).await?;
        let residual = final_ts.abs_diff(target_ts);
        if residual > FALLBACK_RESIDUAL_SECS && !had_anchor {
            debug!(
                residual_secs = residual,
                target_ts = target_ts,
                "Fast-path residual too large without anchor, regressing"
            );
            height = self.locate_by_regression(target_ts, mode, latest).await?;
        }

        let anchored_ts = self.block_timestamp(height).await?;
        *self.anchor.write().await = Some(BlockAnchor {
            height,
            timestamp: anchored_ts,
        });

        Ok(height)
    }

    /// Walk one block at a time until the side-predicate holds, bounded by
    /// one stride to prevent pathological scans.
    async fn correct_boundary(
        &self,
        mut height: u64,
        target_ts: u64,
        mode: EdgeMode,
        latest: u64,
    ) -> Result<u64, ChainError> {
        for _ in 0..self.stride {
            match mode {
                EdgeMode::FirstAtOrAfter => {
                    if self.block_timestamp(height).await? < target_ts {
                        if height >= latest {
                            return Ok(latest);
                        }
                        height += 1;
                    } else if height > 1 && self.block_timestamp(height - 1).await? >= target_ts {
                        height -= 1;
                    } else {
                        return Ok(height);
                    }
                }
                EdgeMode::LastBefore => {
                    if self.block_timestamp(height).await? >= target_ts {
                        if height <= 1 {
                            return Ok(1);
                        }
                        height -= 1;
                    } else if height < latest && self.block_timestamp(height + 1).await? < target_ts
                    {
                        height += 1;
                    } else {
                        return Ok(height);
                    }
                }
            }
        }
        Ok(height)
    }

    /// Fallback: fit a line through evenly distributed samples, narrow the
    /// bracket around the fit, then binary search it down.
    async fn locate_by_regression(
        &self,
        target_ts: u64,
        mode: EdgeMode,
        latest: u64,
    ) -> Result<u64, ChainError> {
        let span = (2 * SECONDS_PER_DAY / self.seconds_per_block).max(REGRESSION_SAMPLES as u64);
        let mut lo = latest.saturating_sub(span).max(1);
        let mut hi = latest;

        let mut samples = Vec::with_capacity(REGRESSION_SAMPLES);
        for i in 0..REGRESSION_SAMPLES {
            let height = lo + (hi - lo) * i as u64 / (REGRESSION_SAMPLES as u64 - 1);
            samples.push((height, self.block_timestamp(height).await?));
        }

        if let Some(estimate) = regression_estimate(&samples, target_ts) {
            let margin = self.stride * 2;
            lo = estimate.saturating_sub(margin).max(lo);
            hi = (estimate + margin).min(hi);
        }

        for _ in 0..MAX_FALLBACK_BINARY_ITERS {
            if lo >= hi {
                break;
            }
            let mid = lo + (hi - lo) / 2;
            if self.block_timestamp(mid).await? < target_ts {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }

        self.correct_boundary(lo, target_ts, mode, latest).await
    }

    /// Cached single-block timestamp lookup.
    pub async fn block_timestamp(&self, height: u64) -> Result<u64, ChainError> {
        {
            let cache = self.ts_cache.read().await;
            if let Some(entry) = cache.get(&height) {
                if entry.cached_at.elapsed() < self.ts_cache_ttl {
                    return Ok(entry.timestamp);
                }
            }
        }

        let timestamp = self.chain.block_timestamp(height).await?;

        let mut cache = self.ts_cache.write().await;
        prune(&mut cache, self.ts_cache_ttl, TS_CACHE_MAX, |e| e.cached_at);
        cache.insert(
            height,
            TsCacheEntry {
                timestamp,
                cached_at: Instant::now(),
            },
        );

        Ok(timestamp)
    }

    /// Batched timestamp lookup; duplicate heights are coalesced and cache
    /// hits skipped before fetching in header-batch sized chunks.
    pub async fn block_timestamps(
        &self,
        heights: &[u64],
    ) -> Result<HashMap<u64, u64>, ChainError> {
        let mut resolved = HashMap::new();
        let mut missing = Vec::new();

        {
            let cache = self.ts_cache.read().await;
            let mut seen = HashSet::new();
            for &height in heights {
                if !seen.insert(height) {
                    continue;
                }
                match cache.get(&height) {
                    Some(entry) if entry.cached_at.elapsed() < self.ts_cache_ttl => {
                        resolved.insert(height, entry.timestamp);
                    }
                    _ => missing.push(height),
                }
            }
        }

        for chunk in missing.chunks(self.header_batch) {
            let fetches = chunk.iter().map(|&h| self.chain.block_timestamp(h));
            let outcomes = join_all(fetches).await;

            let mut cache = self.ts_cache.write().await;
            prune(&mut cache, self.ts_cache_ttl, TS_CACHE_MAX, |e| e.cached_at);
            for (&height, outcome) in chunk.iter().zip(outcomes) {
                let timestamp = outcome?;
                resolved.insert(height, timestamp);
                cache.insert(
                    height,
                    TsCacheEntry {
                        timestamp,
                        cached_at: Instant::now(),
                    },
                );
            }
        }

        Ok(resolved)
    }
}

/// Drop expired entries; when still above `cap`, drop the oldest.
fn prune<K: std::hash::Hash + Eq + Copy, V>(
    cache: &mut HashMap<K, V>,
    ttl: Duration,
    cap: usize,
    cached_at: impl Fn(&V) -> Instant,
) {
    cache.retain(|_, v| cached_at(v).elapsed() < ttl);
    while cache.len() >= cap {
        let oldest = cache
            .iter()
            .min_by_key(|(_, v)| cached_at(v))
            .map(|(k, _)| *k);
        match oldest {
            Some(key) => cache.remove(&key),
            None => break,
        };
    }
}

/// Linear extrapolation from the last known (timestamp, height) pair.
fn estimate_from_anchor(
    anchor_height: u64,
    anchor_ts: u64,
    target_ts: u64,
    seconds_per_block: u64,
    latest: u64,
) -> u64 {
    let spb = seconds_per_block.max(1);
    let estimated = if target_ts >= anchor_ts {
        anchor_height.saturating_add((target_ts - anchor_ts) / spb)
    } else {
        anchor_height.saturating_sub((anchor_ts - target_ts) / spb)
    };
    estimated.clamp(1, latest)
}

/// Least-squares fit of height over timestamp; returns the estimated height
/// at `target_ts`. `None` when the samples cannot support a fit.
fn regression_estimate(samples: &[(u64, u64)], target_ts: u64) -> Option<u64> {
    if samples.len() < 2 {
        return None;
    }

    let n = samples.len() as f64;
    let mean_ts = samples.iter().map(|(_, ts)| *ts as f64).sum::<f64>() / n;
    let mean_h = samples.iter().map(|(h, _)| *h as f64).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var = 0.0;
    for (h, ts) in samples {
        let dt = *ts as f64 - mean_ts;
        cov += dt * (*h as f64 - mean_h);
        var += dt * dt;
    }
    if var == 0.0 {
        return None;
    }

    let slope = cov / var;
    let estimated = mean_h + slope * (target_ts as f64 - mean_ts);
    if !estimated.is_finite() || estimated < 1.0 {
        return Some(1);
    }
    Some(estimated as u64)
}
