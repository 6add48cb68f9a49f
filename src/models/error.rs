//! The archiver's error taxonomy.
//!
//! One enumerated type covers every way an epoch can fail; only transient
//! RPC errors are recovered locally, everything else aborts the epoch and
//! leaves an err_epoch row behind.

use rust_decimal::Decimal;

/// Pipeline-level error classes
#[derive(Debug)]
pub enum ArchiveError {
    /// Timeout, throttling, 5xx: retried inside the attempt, surfaced after
    RpcTransient(String),
    /// Invalid parameters or contract revert: never retried in this attempt
    RpcPermanent(String),
    /// One or more validation checks failed
    Validation(ValidationFailure),
    /// Cross-table sums disagreed beyond tolerance
    Inconsistency(String),
    /// Constraint violation, connection loss, rollback
    Persistence(String),
    /// Lock service unreachable or denied
    LockUnavailable(String),
}

impl std::fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchiveError::RpcTransient(msg) => write!(f, "Transient RPC error: {}", msg),
            ArchiveError::RpcPermanent(msg) => write!(f, "Permanent RPC error: {}", msg),
            ArchiveError::Validation(failure) => write!(f, "Validation failed: {}", failure),
            ArchiveError::Inconsistency(msg) => write!(f, "Data inconsistency: {}", msg),
            ArchiveError::Persistence(msg) => write!(f, "Persistence error: {}", msg),
            ArchiveError::LockUnavailable(msg) => write!(f, "Lock service error: {}", msg),
        }
    }
}

impl std::error::Error for ArchiveError {}

/// One enumerated reason per distinct validation check.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    MissingRoundStart,
    /// Zero-bet epochs are rejected by design
    NoStakes,
    EmptySender {
        stream: &'static str,
    },
    NonPositiveAmount {
        stream: &'static str,
        tx_hash: String,
    },
    /// Round lifecycle event beyond the accepted epoch drift
    EpochDrift {
        stream: &'static str,
        found: u64,
        target: u64,
    },
    /// Claim event without a usable settlement epoch
    InvalidClaimEpoch {
        tx_hash: String,
    },
    TotalSumMismatch {
        round_total: Decimal,
        bet_sum: Decimal,
    },
    SideSumMismatch {
        side: &'static str,
        round_amount: Decimal,
        bet_sum: Decimal,
    },
    /// A side with positive stake must have positive odds
    ZeroOddsWithStake {
        side: &'static str,
    },
    BetCountMismatch {
        total: usize,
        up: usize,
        down: usize,
    },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::MissingRoundStart => write!(f, "no round start event"),
            ValidationError::NoStakes => write!(f, "no stake events for epoch"),
            ValidationError::EmptySender { stream } => {
                write!(f, "empty sender in {} stream", stream)
            }
            ValidationError::NonPositiveAmount { stream, tx_hash } => {
                write!(f, "non-positive amount in {} stream (tx {})", stream, tx_hash)
            }
            ValidationError::EpochDrift {
                stream,
                found,
                target,
            } => write!(
                f,
                "{} event epoch {} too far from target {}",
                stream, found, target
            ),
            ValidationError::InvalidClaimEpoch { tx_hash } => {
                write!(f, "claim without settlement epoch (tx {})", tx_hash)
            }
            ValidationError::TotalSumMismatch {
                round_total,
                bet_sum,
            } => write!(
                f,
                "round total {} != bet sum {}",
                round_total, bet_sum
            ),
            ValidationError::SideSumMismatch {
                side,
                round_amount,
                bet_sum,
            } => write!(
                f,
                "{} side amount {} != bet sum {}",
                side, round_amount, bet_sum
            ),
            ValidationError::ZeroOddsWithStake { side } => {
                write!(f, "{} side has stake but zero odds", side)
            }
            ValidationError::BetCountMismatch { total, up, down } => {
                write!(f, "bet count {} != up {} + down {}", total, up, down)
            }
        }
    }
}

/// Non-fatal observations carried on successful validations.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationWarning {
    /// Lock/close prices absent; outcome defaulted to UP
    MissingPrices,
    /// In-memory dedupe dropped a claim repeating (tx, log, bet_epoch)
    DuplicateClaimDropped {
        tx_hash: String,
        log_index: i64,
        bet_epoch: u64,
    },
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationWarning::MissingPrices => {
                write!(f, "lock/close prices missing, outcome defaulted to UP")
            }
            ValidationWarning::DuplicateClaimDropped {
                tx_hash,
                log_index,
                bet_epoch,
            } => write!(
                f,
                "duplicate claim dropped (tx {}, log {}, bet_epoch {})",
                tx_hash, log_index, bet_epoch
            ),
        }
    }
}

/// The failed half of the validator's result.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationFailure {
    pub reasons: Vec<ValidationError>,
}

impl std::fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let joined = self
            .reasons
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "{}", joined)
    }
}

impl std::error::Error for ValidationFailure {}
