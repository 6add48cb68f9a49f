//! Prediction contract RPC client
//!
//! Typed read-only access to the market contract: current epoch, per-round
//! metadata, filtered event logs and block header timestamps. Event decoding
//! is uniform across the six streams; only the topic layout differs.

use alloy::{
    primitives::{Address, B256, U256},
    providers::{Provider, ProviderBuilder, RootProvider},
    rpc::types::{Filter, Log},
    sol,
    sol_types::SolEvent,
    transports::http::{Client, Http},
};
use std::future::IntoFuture;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::models::amount::from_raw_18;
use crate::models::events::{EventKind, RawEvent, RoundMeta};

/// Per-call deadline for every RPC round trip
const CALL_TIMEOUT_SECS: u64 = 30;

/// Maximum retry attempts for transient RPC failures
const MAX_RETRIES: u32 = 3;

/// Base delay between retries (exponentially increased)
const RETRY_BASE_DELAY_MS: u64 = 400;

// Prediction market contract interface
sol! {
    #[sol(rpc)]
    interface IPrediction {
        function currentEpoch() external view returns (uint256);
        function rounds(uint256 epochIndex) external view returns (
            uint256 epoch,
            uint256 startTimestamp,
            uint256 lockTimestamp,
            uint256 closeTimestamp,
            int256 lockPrice,
            int256 closePrice,
            uint256 lockOracleId,
            uint256 closeOracleId,
            uint256 totalAmount,
            uint256 bullAmount,
            uint256 bearAmount,
            uint256 rewardBaseCalAmount,
            uint256 rewardAmount,
            bool oracleCalled
        );
    }

    event StartRound(uint256 indexed epoch);
    event LockRound(uint256 indexed epoch, int256 price);
    event EndRound(uint256 indexed epoch, int256 price);
    event BetBull(address indexed sender, uint256 indexed epoch, uint256 amount);
    event BetBear(address indexed sender, uint256 indexed epoch, uint256 amount);
    event Claim(address indexed sender, uint256 indexed epoch, uint256 amount);
}

/// RPC failure classes
#[derive(Debug)]
pub enum ChainError {
    /// Timeout, throttling, 5xx: safe to retry within the same attempt
    Transient(String),
    /// Revert or invalid parameters: do not retry in this attempt
    Permanent(String),
    InvalidConfig(String),
}

impl std::fmt::Display for ChainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainError::Transient(msg) => write!(f, "Transient RPC error: {}", msg),
            ChainError::Permanent(msg) => write!(f, "Permanent RPC error: {}", msg),
            ChainError::InvalidConfig(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ChainError {}

/// Classify a provider error message into the retryable/terminal split.
fn classify(message: String) -> ChainError {
    let lowered = message.to_lowercase();
    if lowered.contains("revert")
        || lowered.contains("invalid argument")
        || lowered.contains("invalid params")
        || lowered.contains("method not found")
    {
        ChainError::Permanent(message)
    } else {
        ChainError::Transient(message)
    }
}

/// Read-only client for the prediction contract
pub struct PredictionChainService {
    provider: RootProvider<Http<Client>>,
    contract_address: Address,
    call_timeout: Duration,
}

impl PredictionChainService {
    /// Connect to the RPC endpoint and verify it answers.
    pub async fn new(rpc_url: &str, contract_addr: &str) -> Result<Self, ChainError> {
        info!(rpc_url = %rpc_url, "Initializing PredictionChainService");

        let provider = ProviderBuilder::new().on_http(
            rpc_url
                .parse()
                .map_err(|e| ChainError::InvalidConfig(format!("Invalid RPC URL: {}", e)))?,
        );

        let contract_address = Address::from_str(contract_addr).map_err(|e| {
            ChainError::InvalidConfig(format!("Invalid contract address: {}", e))
        })?;

        // Verify connection
        let chain_id = provider.get_chain_id().await.map_err(|e| {
            error!(error = %e, "Failed to connect to RPC");
            ChainError::Transient(format!("Connection failed: {}", e))
        })?;

        info!(
            chain_id = chain_id,
            contract = %contract_address,
            "PredictionChainService initialized"
        );

        Ok(Self {
            provider,
            contract_address,
            call_timeout: Duration::from_secs(CALL_TIMEOUT_SECS),
        })
    }

    /// Current epoch reported by the contract.
    pub async fn current_epoch(&self) -> Result<u64, ChainError> {
        self.with_retry("currentEpoch", || async {
            let contract = IPrediction::new(self.contract_address, &self.provider);
            let result = self
                .deadline(contract.currentEpoch().call().into_future())
                .await?
                .map_err(|e| classify(format!("currentEpoch failed: {}", e)))?;
            u64::try_from(result._0)
                .map_err(|_| ChainError::Permanent("currentEpoch out of u64 range".to_string()))
        })
        .await
    }

    /// Per-round metadata from the contract's `rounds` view.
    ///
    /// Prices still reported as zero (oracle not called yet) come back as
    /// `None`; callers decide how to treat them.
    pub async fn round_metadata(&self, epoch: u64) -> Result<RoundMeta, ChainError> {
        self.with_retry("rounds", || async {
            let contract = IPrediction::new(self.contract_address, &self.provider);
            let r = self
                .deadline(contract.rounds(U256::from(epoch)).call().into_future())
                .await?
                .map_err(|e| classify(format!("rounds({}) failed: {}", epoch, e)))?;

            let lock_price = if r.lockPrice.is_negative() || r.lockPrice.is_zero() {
                None
            } else {
                from_raw_18(r.lockPrice.unsigned_abs())
            };
            let close_price = if r.closePrice.is_negative() || r.closePrice.is_zero() {
                None
            } else {
                from_raw_18(r.closePrice.unsigned_abs())
            };

            Ok(RoundMeta {
                epoch,
                start_ts: as_u64(r.startTimestamp)?,
                lock_ts: as_u64(r.lockTimestamp)?,
                close_ts: as_u64(r.closeTimestamp)?,
                lock_price,
                close_price,
                oracle_called: r.oracleCalled,
            })
        })
        .await
    }

    /// Height of the newest block the endpoint knows.
    pub async fn latest_block_height(&self) -> Result<u64, ChainError> {
        self.with_retry("blockNumber", || async {
            self.deadline(self.provider.get_block_number())
                .await?
                .map_err(|e| classify(format!("blockNumber failed: {}", e)))
        })
        .await
    }

    /// Unix timestamp of the block at `height`, via raw eth_getBlockByNumber.
    pub async fn block_timestamp(&self, height: u64) -> Result<u64, ChainError> {
        self.with_retry("getBlockByNumber", || async {
            let params = serde_json::json!([format!("0x{:x}", height), false]);
            let response: serde_json::Value = self
                .deadline(
                    self.provider
                        .client()
                        .request("eth_getBlockByNumber", params),
                )
                .await?
                .map_err(|e| classify(format!("getBlockByNumber({}) failed: {}", height, e)))?;

            if response.is_null() {
                return Err(ChainError::Permanent(format!("block {} not found", height)));
            }

            response["timestamp"]
                .as_str()
                .and_then(|s| u64::from_str_radix(s.trim_start_matches("0x"), 16).ok())
                .ok_or_else(|| {
                    ChainError::Permanent(format!("block {} has no parseable timestamp", height))
                })
        })
        .await
    }

    /// Fetch one event stream over an inclusive block range.
    pub async fn fetch_stream(
        &self,
        kind: EventKind,
        from: u64,
        to: u64,
    ) -> Result<Vec<RawEvent>, ChainError> {
        self.with_retry(kind.as_str(), || async {
            let filter = Filter::new()
                .address(self.contract_address)
                .event_signature(signature_hash(kind))
                .from_block(from)
                .to_block(to);

            let logs = self
                .deadline(self.provider.get_logs(&filter))
                .await?
                .map_err(|e| {
                    classify(format!(
                        "getLogs {} [{}, {}] failed: {}",
                        kind.as_str(),
                        from,
                        to,
                        e
                    ))
                })?;

            let mut events = Vec::with_capacity(logs.len());
            for log in &logs {
                match decode_event(kind, log) {
                    Some(event) => events.push(event),
                    None => warn!(
                        stream = kind.as_str(),
                        tx_hash = ?log.transaction_hash,
                        "Undecodable log, skipping"
                    ),
                }
            }

            debug!(
                stream = kind.as_str(),
                from_block = from,
                to_block = to,
                count = events.len(),
                "Fetched event stream"
            );

            Ok(events)
        })
        .await
    }

    async fn deadline<T, E>(
        &self,
        fut: impl std::future::Future<Output = Result<T, E>>,
    ) -> Result<Result<T, E>, ChainError> {
        tokio::time::timeout(self.call_timeout, fut)
            .await
            .map_err(|_| ChainError::Transient("RPC call timed out".to_string()))
    }

    /// Execute an operation with exponential backoff; only transient
    /// failures are retried.
    async fn with_retry<T, F, Fut>(&self, operation: &str, f: F) -> Result<T, ChainError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, ChainError>>,
    {
        let mut attempts = 0;
        loop {
            match f().await {
                Ok(result) => return Ok(result),
                Err(ChainError::Transient(msg)) => {
                    attempts += 1;
                    if attempts >= MAX_RETRIES {
                        error!(
                            operation = %operation,
                            attempts = attempts,
                            "Max retries exceeded"
                        );
                        return Err(ChainError::Transient(msg));
                    }
                    let delay = Duration::from_millis(RETRY_BASE_DELAY_MS * (1 << attempts));
                    warn!(
                        operation = %operation,
                        attempt = attempts,
                        max_attempts = MAX_RETRIES,
                        delay_ms = delay.as_millis() as u64,
                        error = %msg,
                        "RPC call failed, retrying..."
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Event signature topic for a stream.
fn signature_hash(kind: EventKind) -> B256 {
    match kind {
        EventKind::RoundStart => StartRound::SIGNATURE_HASH,
        EventKind::RoundLock => LockRound::SIGNATURE_HASH,
        EventKind::RoundEnd => EndRound::SIGNATURE_HASH,
        EventKind::StakeUp => BetBull::SIGNATURE_HASH,
        EventKind::StakeDown => BetBear::SIGNATURE_HASH,
        EventKind::Claim => Claim::SIGNATURE_HASH,
    }
}

/// Uniform log decoding: read the epoch topic, the optional sender topic
/// and the first data word. No per-signature branching beyond layout.
fn decode_event(kind: EventKind, log: &Log) -> Option<RawEvent> {
    let topics = log.inner.topics();

    let (epoch_topic, sender_topic) = if kind.has_sender_topic() {
        (2usize, Some(1usize))
    } else {
        (1usize, None)
    };

    if topics.len() <= epoch_topic {
        return None;
    }

    let epoch = u64::try_from(U256::from_be_slice(topics[epoch_topic].as_slice())).ok()?;
    let sender = sender_topic.map(|i| Address::from_slice(&topics[i][12..32]));

    let data = log.inner.data.data.as_ref();
    let value = if data.len() >= 32 {
        Some(U256::from_be_slice(&data[0..32]))
    } else {
        None
    };

    Some(RawEvent {
        kind,
        epoch,
        sender,
        value,
        block_number: log.block_number?,
        tx_hash: log.transaction_hash.map(|h| format!("{:?}", h))?,
        log_index: log.log_index? as i64,
    })
}

fn as_u64(value: U256) -> Result<u64, ChainError> {
    u64::try_from(value).map_err(|_| ChainError::Permanent("value out of u64 range".to_string()))
}
