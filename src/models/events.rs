//! Event stream types shared by the chain reader and the harvester.

use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;

/// The six contract event streams the archiver consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    RoundStart,
    RoundLock,
    RoundEnd,
    StakeUp,
    StakeDown,
    Claim,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::RoundStart,
        EventKind::RoundLock,
        EventKind::RoundEnd,
        EventKind::StakeUp,
        EventKind::StakeDown,
        EventKind::Claim,
    ];

    /// Stake and claim events carry the sender as the first indexed topic;
    /// round lifecycle events index only the epoch.
    pub fn has_sender_topic(self) -> bool {
        matches!(
            self,
            EventKind::StakeUp | EventKind::StakeDown | EventKind::Claim
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::RoundStart => "round_start",
            EventKind::RoundLock => "round_lock",
            EventKind::RoundEnd => "round_end",
            EventKind::StakeUp => "stake_up",
            EventKind::StakeDown => "stake_down",
            EventKind::Claim => "claim",
        }
    }
}

/// A decoded contract log before timestamp attachment and amount scaling.
#[derive(Debug, Clone)]
pub struct RawEvent {
    pub kind: EventKind,
    /// Epoch embedded in the event
    pub epoch: u64,
    pub sender: Option<Address>,
    /// First data word: stake/claim amount or lock/end price, 18-digit raw
    pub value: Option<U256>,
    pub block_number: u64,
    pub tx_hash: String,
    pub log_index: i64,
}

/// An event with canonical amounts and its block timestamp attached.
#[derive(Debug, Clone)]
pub struct HarvestedEvent {
    pub kind: EventKind,
    pub epoch: u64,
    /// Lowercased 0x-prefixed wallet, present on stake/claim events
    pub sender: Option<String>,
    /// 8-digit canonical amount (stake/claim) or price (lock/end)
    pub amount: Option<Decimal>,
    pub block_number: u64,
    /// Unix seconds of the containing block
    pub timestamp: i64,
    pub tx_hash: String,
    pub log_index: i64,
}

/// The six streams harvested for one block range.
#[derive(Debug, Clone, Default)]
pub struct EpochEvents {
    pub starts: Vec<HarvestedEvent>,
    pub locks: Vec<HarvestedEvent>,
    pub ends: Vec<HarvestedEvent>,
    pub stakes_up: Vec<HarvestedEvent>,
    pub stakes_down: Vec<HarvestedEvent>,
    pub claims: Vec<HarvestedEvent>,
}

impl EpochEvents {
    pub fn stream_mut(&mut self, kind: EventKind) -> &mut Vec<HarvestedEvent> {
        match kind {
            EventKind::RoundStart => &mut self.starts,
            EventKind::RoundLock => &mut self.locks,
            EventKind::RoundEnd => &mut self.ends,
            EventKind::StakeUp => &mut self.stakes_up,
            EventKind::StakeDown => &mut self.stakes_down,
            EventKind::Claim => &mut self.claims,
        }
    }

    pub fn total_events(&self) -> usize {
        self.starts.len()
            + self.locks.len()
            + self.ends.len()
            + self.stakes_up.len()
            + self.stakes_down.len()
            + self.claims.len()
    }
}

/// Per-round metadata read from the contract's `rounds(epoch)` view.
#[derive(Debug, Clone)]
pub struct RoundMeta {
    pub epoch: u64,
    pub start_ts: u64,
    pub lock_ts: u64,
    pub close_ts: u64,
    /// 8-digit canonical; `None` when the contract still reports zero
    pub lock_price: Option<Decimal>,
    pub close_price: Option<Decimal>,
    pub oracle_called: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_topic_layout() {
        assert!(EventKind::StakeUp.has_sender_topic());
        assert!(EventKind::StakeDown.has_sender_topic());
        assert!(EventKind::Claim.has_sender_topic());
        assert!(!EventKind::RoundStart.has_sender_topic());
        assert!(!EventKind::RoundLock.has_sender_topic());
        assert!(!EventKind::RoundEnd.has_sender_topic());
    }

    #[test]
    fn test_stream_mut_routes_all_kinds() {
        let mut events = EpochEvents::default();
        for kind in EventKind::ALL {
            events.stream_mut(kind).push(HarvestedEvent {
                kind,
                epoch: 1,
                sender: None,
                amount: None,
                block_number: 1,
                timestamp: 0,
                tx_hash: String::new(),
                log_index: 0,
            });
        }
        assert_eq!(events.total_events(), 6);
        assert_eq!(events.claims.len(), 1);
    }
}
