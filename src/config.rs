//! Process configuration loaded from the environment.
//!
//! Required settings fail startup with an explicit message; every tunable
//! has the default documented in the deployment runbook.

use std::env;
use std::time::Duration;

use chrono_tz::Tz;

/// HTTP JSON-RPC endpoint for the chain
pub const ENV_RPC_URL: &str = "RPC_URL";

/// Optional subscription endpoint (not used by the archiver core)
pub const ENV_RPC_WS_URL: &str = "RPC_WS_URL";

/// Lock service endpoint
pub const ENV_REDIS_URL: &str = "REDIS_URL";

/// Store connection string
pub const ENV_POSTGRES_URL: &str = "POSTGRES_URL";

/// Prediction contract address (20-byte hex)
pub const ENV_CONTRACT_ADDR: &str = "CONTRACT_ADDR";

/// IANA timezone name for persisted wall-clock fields
pub const ENV_TIMEZONE: &str = "TIMEZONE";

/// Namespace segment of the per-epoch lock key
pub const ENV_LOCK_NAMESPACE: &str = "LOCK_NAMESPACE";

pub const ENV_LOCK_TTL_SEC: &str = "LOCK_TTL_SEC";
pub const ENV_MAIN_RESTART_MS: &str = "MAIN_RESTART_MS";
pub const ENV_TIP_INTERVAL_MS: &str = "TIP_INTERVAL_MS";
pub const ENV_TIP_WARMUP_MS: &str = "TIP_WARMUP_MS";
pub const ENV_SLICE_SIZE: &str = "SLICE_SIZE";
pub const ENV_SLICE_SLEEP_MS: &str = "SLICE_SLEEP_MS";
pub const ENV_MAX_BLOCKS_PER_WINDOW: &str = "MAX_BLOCKS_PER_WINDOW";
pub const ENV_BLOCK_HEADER_BATCH: &str = "BLOCK_HEADER_BATCH";
pub const ENV_BLOCK_RANGE_CACHE_TTL_MS: &str = "BLOCK_RANGE_CACHE_TTL_MS";
pub const ENV_BLOCK_TS_CACHE_TTL_MS: &str = "BLOCK_TS_CACHE_TTL_MS";
pub const ENV_MAX_CONSECUTIVE_FAILURES: &str = "MAX_CONSECUTIVE_FAILURES";
pub const ENV_FAILURE_WINDOW_MS: &str = "FAILURE_WINDOW_MS";

/// Average seconds per block, used by the block locator's linear estimator
pub const ENV_BLOCK_TIME_SEC: &str = "BLOCK_TIME_SEC";

/// Locator probe stride in blocks (sensible range 50-150)
pub const ENV_BLOCK_SEARCH_STRIDE: &str = "BLOCK_SEARCH_STRIDE";

/// Accepted epoch drift for round lifecycle events during validation
pub const ENV_EPOCH_DRIFT_DELTA: &str = "EPOCH_DRIFT_DELTA";

const DEFAULT_TIMEZONE: &str = "UTC";
const DEFAULT_LOCK_NAMESPACE: &str = "prediction";
const DEFAULT_LOCK_TTL_SEC: u64 = 120;
const DEFAULT_MAIN_RESTART_MS: u64 = 1_800_000;
const DEFAULT_TIP_INTERVAL_MS: u64 = 300_000;
const DEFAULT_TIP_WARMUP_MS: u64 = 300_000;
const DEFAULT_SLICE_SIZE: u64 = 20_000;
const DEFAULT_SLICE_SLEEP_MS: u64 = 180;
const DEFAULT_MAX_BLOCKS_PER_WINDOW: u64 = 100_000;
const DEFAULT_BLOCK_HEADER_BATCH: usize = 200;
const DEFAULT_BLOCK_RANGE_CACHE_TTL_MS: u64 = 1_800_000;
const DEFAULT_BLOCK_TS_CACHE_TTL_MS: u64 = 3_600_000;
const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 3;
const DEFAULT_FAILURE_WINDOW_MS: u64 = 600_000;
const DEFAULT_BLOCK_TIME_SEC: u64 = 3;
const DEFAULT_BLOCK_SEARCH_STRIDE: u64 = 100;
const DEFAULT_EPOCH_DRIFT_DELTA: u64 = 20;

/// Server-side statement timeout carried by every store connection
const DB_STATEMENT_TIMEOUT_MS: u64 = 30_000;

/// Configuration error (missing or unparseable environment entry)
#[derive(Debug)]
pub struct ConfigError(pub String);

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Config error: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

/// Fully resolved archiver configuration
#[derive(Debug, Clone)]
pub struct ArchiverConfig {
    pub rpc_url: String,
    pub rpc_ws_url: Option<String>,
    pub redis_url: String,
    pub postgres_url: String,
    pub contract_addr: String,
    pub timezone: Tz,
    pub lock_namespace: String,
    pub lock_ttl: Duration,
    pub main_restart: Duration,
    pub tip_interval: Duration,
    pub tip_warmup: Duration,
    pub slice_size: u64,
    pub slice_sleep: Duration,
    pub max_blocks_per_window: u64,
    pub block_header_batch: usize,
    pub block_range_cache_ttl: Duration,
    pub block_ts_cache_ttl: Duration,
    pub max_consecutive_failures: u32,
    pub failure_window: Duration,
    pub block_time_secs: u64,
    pub block_search_stride: u64,
    pub epoch_drift_delta: u64,
}

impl ArchiverConfig {
    /// Load the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let timezone_name =
            env::var(ENV_TIMEZONE).unwrap_or_else(|_| DEFAULT_TIMEZONE.to_string());
        let timezone: Tz = timezone_name
            .parse()
            .map_err(|_| ConfigError(format!("invalid {} '{}'", ENV_TIMEZONE, timezone_name)))?;

        Ok(Self {
            rpc_url: required(ENV_RPC_URL)?,
            rpc_ws_url: env::var(ENV_RPC_WS_URL).ok(),
            redis_url: required(ENV_REDIS_URL)?,
            postgres_url: required(ENV_POSTGRES_URL)?,
            contract_addr: required(ENV_CONTRACT_ADDR)?,
            timezone,
            lock_namespace: env::var(ENV_LOCK_NAMESPACE)
                .unwrap_or_else(|_| DEFAULT_LOCK_NAMESPACE.to_string()),
            lock_ttl: Duration::from_secs(parsed(ENV_LOCK_TTL_SEC, DEFAULT_LOCK_TTL_SEC)),
            main_restart: Duration::from_millis(parsed(
                ENV_MAIN_RESTART_MS,
                DEFAULT_MAIN_RESTART_MS,
            )),
            tip_interval: Duration::from_millis(parsed(
                ENV_TIP_INTERVAL_MS,
                DEFAULT_TIP_INTERVAL_MS,
            )),
            tip_warmup: Duration::from_millis(parsed(ENV_TIP_WARMUP_MS, DEFAULT_TIP_WARMUP_MS)),
            slice_size: parsed(ENV_SLICE_SIZE, DEFAULT_SLICE_SIZE).max(1),
            slice_sleep: Duration::from_millis(parsed(ENV_SLICE_SLEEP_MS, DEFAULT_SLICE_SLEEP_MS)),
            max_blocks_per_window: parsed(ENV_MAX_BLOCKS_PER_WINDOW, DEFAULT_MAX_BLOCKS_PER_WINDOW)
                .max(1),
            block_header_batch: parsed(ENV_BLOCK_HEADER_BATCH, DEFAULT_BLOCK_HEADER_BATCH).max(1),
            block_range_cache_ttl: Duration::from_millis(parsed(
                ENV_BLOCK_RANGE_CACHE_TTL_MS,
                DEFAULT_BLOCK_RANGE_CACHE_TTL_MS,
            )),
            block_ts_cache_ttl: Duration::from_millis(parsed(
                ENV_BLOCK_TS_CACHE_TTL_MS,
                DEFAULT_BLOCK_TS_CACHE_TTL_MS,
            )),
            max_consecutive_failures: parsed(
                ENV_MAX_CONSECUTIVE_FAILURES,
                DEFAULT_MAX_CONSECUTIVE_FAILURES,
            )
            .max(1),
            failure_window: Duration::from_millis(parsed(
                ENV_FAILURE_WINDOW_MS,
                DEFAULT_FAILURE_WINDOW_MS,
            )),
            block_time_secs: parsed(ENV_BLOCK_TIME_SEC, DEFAULT_BLOCK_TIME_SEC).max(1),
            block_search_stride: parsed(ENV_BLOCK_SEARCH_STRIDE, DEFAULT_BLOCK_SEARCH_STRIDE)
                .clamp(50, 150),
            epoch_drift_delta: parsed(ENV_EPOCH_DRIFT_DELTA, DEFAULT_EPOCH_DRIFT_DELTA),
        })
    }

    /// Store connection string with the statement timeout appended, so a
    /// query against a stalled Postgres is cut off server-side.
    pub fn postgres_url_with_timeouts(&self) -> String {
        with_statement_timeout(&self.postgres_url, DB_STATEMENT_TIMEOUT_MS)
    }
}

fn with_statement_timeout(url: &str, timeout_ms: u64) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!(
        "{}{}options=-c%20statement_timeout%3D{}",
        url, separator, timeout_ms
    )
}

fn required(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError(format!("{} must be set", name)))
}

fn parsed<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_names() {
        assert_eq!(ENV_RPC_URL, "RPC_URL");
        assert_eq!(ENV_REDIS_URL, "REDIS_URL");
        assert_eq!(ENV_POSTGRES_URL, "POSTGRES_URL");
        assert_eq!(ENV_LOCK_TTL_SEC, "LOCK_TTL_SEC");
        assert_eq!(ENV_MAX_BLOCKS_PER_WINDOW, "MAX_BLOCKS_PER_WINDOW");
    }

    #[test]
    fn test_defaults() {
        assert_eq!(DEFAULT_LOCK_TTL_SEC, 120);
        assert_eq!(DEFAULT_SLICE_SIZE, 20_000);
        assert_eq!(DEFAULT_SLICE_SLEEP_MS, 180);
        assert_eq!(DEFAULT_MAX_BLOCKS_PER_WINDOW, 100_000);
        assert_eq!(DEFAULT_BLOCK_HEADER_BATCH, 200);
        assert_eq!(DEFAULT_MAX_CONSECUTIVE_FAILURES, 3);
        assert_eq!(DEFAULT_FAILURE_WINDOW_MS, 600_000);
    }

    #[test]
    fn test_parsed_falls_back_on_garbage() {
        std::env::set_var("ARCHIVER_TEST_PARSED", "not-a-number");
        let value: u64 = parsed("ARCHIVER_TEST_PARSED", 7);
        assert_eq!(value, 7);
        std::env::remove_var("ARCHIVER_TEST_PARSED");
    }

    #[test]
    fn test_statement_timeout_appended() {
        let url = with_statement_timeout("postgresql://user@localhost:5432/archiver", 30_000);
        assert_eq!(
            url,
            "postgresql://user@localhost:5432/archiver?options=-c%20statement_timeout%3D30000"
        );
    }

    #[test]
    fn test_statement_timeout_respects_existing_params() {
        let url = with_statement_timeout(
            "postgresql://user@localhost:5432/archiver?sslmode=disable",
            30_000,
        );
        assert_eq!(
            url,
            "postgresql://user@localhost:5432/archiver?sslmode=disable&options=-c%20statement_timeout%3D30000"
        );
    }
}
