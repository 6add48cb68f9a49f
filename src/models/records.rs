//! Canonical per-epoch records produced by validation and persisted at commit.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Stake direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "UP",
            Direction::Down => "DOWN",
        }
    }
}

/// Settled round outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundOutcome {
    Up,
    Down,
}

impl RoundOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            RoundOutcome::Up => "UP",
            RoundOutcome::Down => "DOWN",
        }
    }

    pub fn matches(self, direction: Direction) -> bool {
        matches!(
            (self, direction),
            (RoundOutcome::Up, Direction::Up) | (RoundOutcome::Down, Direction::Down)
        )
    }
}

/// Per-bet result derived from the round outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BetOutcome {
    Win,
    Loss,
}

impl BetOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            BetOutcome::Win => "WIN",
            BetOutcome::Loss => "LOSS",
        }
    }
}

/// Canonical per-epoch aggregate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundRecord {
    pub epoch: u64,
    pub start_time: NaiveDateTime,
    pub lock_time: NaiveDateTime,
    pub close_time: NaiveDateTime,
    pub lock_price: Option<Decimal>,
    pub close_price: Option<Decimal>,
    pub outcome: RoundOutcome,
    pub total_amount: Decimal,
    pub up_amount: Decimal,
    pub down_amount: Decimal,
    /// 4-digit payout multiplier, zero when the side has no stake
    pub up_odds: Decimal,
    pub down_odds: Decimal,
}

/// A single directional stake
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetRecord {
    pub epoch: u64,
    pub bet_time: NaiveDateTime,
    pub sender: String,
    pub direction: Direction,
    pub amount: Decimal,
    pub outcome: BetOutcome,
    pub block_number: u64,
    pub tx_hash: String,
    pub log_index: i64,
}

/// A payout withdrawal observed in `epoch`, settling winnings of `bet_epoch`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub epoch: u64,
    pub bet_epoch: u64,
    pub sender: String,
    pub amount: Decimal,
    pub claim_time: NaiveDateTime,
    pub block_number: u64,
    pub tx_hash: String,
    pub log_index: i64,
}

/// Aggregate claim activity flag for one wallet in one observation epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiClaimRecord {
    pub epoch: u64,
    pub sender: String,
    pub claim_count: u32,
    pub total_amount: Decimal,
}

/// Everything a successful validation produces for one epoch.
#[derive(Debug, Clone)]
pub struct EpochRecords {
    pub round: RoundRecord,
    pub bets: Vec<BetRecord>,
    pub claims: Vec<ClaimRecord>,
    pub multi_claims: Vec<MultiClaimRecord>,
    pub warnings: Vec<super::error::ValidationWarning>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_matches_direction() {
        assert!(RoundOutcome::Up.matches(Direction::Up));
        assert!(RoundOutcome::Down.matches(Direction::Down));
        assert!(!RoundOutcome::Up.matches(Direction::Down));
        assert!(!RoundOutcome::Down.matches(Direction::Up));
    }

    #[test]
    fn test_labels() {
        assert_eq!(Direction::Up.as_str(), "UP");
        assert_eq!(RoundOutcome::Down.as_str(), "DOWN");
        assert_eq!(BetOutcome::Win.as_str(), "WIN");
        assert_eq!(BetOutcome::Loss.as_str(), "LOSS");
    }
}
