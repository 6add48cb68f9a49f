//! End-to-end validator scenarios with literal values.

use chrono_tz::UTC;
use rust_decimal::Decimal;

use prediction_archiver::models::events::{EpochEvents, EventKind, HarvestedEvent, RoundMeta};
use prediction_archiver::models::records::{BetOutcome, Direction, RoundOutcome};
use prediction_archiver::services::validator::validate;

const EPOCH: u64 = 426_236;
const DRIFT_DELTA: u64 = 20;

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn meta(epoch: u64) -> RoundMeta {
    RoundMeta {
        epoch,
        start_ts: 1_700_000_000,
        lock_ts: 1_700_000_300,
        close_ts: 1_700_000_600,
        lock_price: Some(dec("500.00000000")),
        close_price: Some(dec("510.00000000")),
        oracle_called: true,
    }
}

fn event(
    kind: EventKind,
    epoch: u64,
    sender: Option<&str>,
    amount: Option<&str>,
    log_index: i64,
) -> HarvestedEvent {
    HarvestedEvent {
        kind,
        epoch,
        sender: sender.map(str::to_string),
        amount: amount.map(dec),
        block_number: 30_000_000 + log_index as u64,
        timestamp: 1_700_000_100,
        tx_hash: format!("0x{:064x}", 7_000 + log_index),
        log_index,
    }
}

fn lifecycle(epoch: u64) -> EpochEvents {
    let mut events = EpochEvents::default();
    events
        .starts
        .push(event(EventKind::RoundStart, epoch, None, None, 0));
    events.locks.push(event(
        EventKind::RoundLock,
        epoch,
        None,
        Some("500.00000000"),
        1,
    ));
    events.ends.push(event(
        EventKind::RoundEnd,
        epoch,
        None,
        Some("510.00000000"),
        2,
    ));
    events
}

/// Up 3.0 vs down 1.0, close above lock: UP wins, odds 1.2933 / 3.8800.
#[test]
fn scenario_up_round_with_both_sides() {
    let mut events = lifecycle(EPOCH);
    events.stakes_up.push(event(
        EventKind::StakeUp,
        EPOCH,
        Some("0x00aa"),
        Some("2.00000000"),
        10,
    ));
    events.stakes_up.push(event(
        EventKind::StakeUp,
        EPOCH,
        Some("0x00bb"),
        Some("1.00000000"),
        11,
    ));
    events.stakes_down.push(event(
        EventKind::StakeDown,
        EPOCH,
        Some("0x00cc"),
        Some("1.00000000"),
        12,
    ));

    let records = validate(&events, EPOCH, &meta(EPOCH), UTC, DRIFT_DELTA).unwrap();

    assert_eq!(records.round.outcome, RoundOutcome::Up);
    assert_eq!(records.round.total_amount.to_string(), "4.00000000");
    assert_eq!(records.round.up_amount.to_string(), "3.00000000");
    assert_eq!(records.round.down_amount.to_string(), "1.00000000");
    assert_eq!(records.round.up_odds.to_string(), "1.2933");
    assert_eq!(records.round.down_odds.to_string(), "3.8800");

    assert_eq!(records.bets.len(), 3);
    for bet in &records.bets {
        match bet.direction {
            Direction::Up => assert_eq!(bet.outcome, BetOutcome::Win),
            Direction::Down => assert_eq!(bet.outcome, BetOutcome::Loss),
        }
    }
}

/// A claim observed in 426238 settling winnings from 426236; five such
/// claims from one wallet flag a multi-claim row.
#[test]
fn scenario_cross_epoch_claims_and_multi_claim() {
    let observation = 426_238u64;
    let wallet = "0x000000000000000000000000000000000000wall";

    let mut events = lifecycle(observation);
    events.stakes_up.push(event(
        EventKind::StakeUp,
        observation,
        Some("0x00aa"),
        Some("1.00000000"),
        10,
    ));
    for i in 0..5i64 {
        events.claims.push(event(
            EventKind::Claim,
            EPOCH,
            Some(wallet),
            Some("3.87600000"),
            20 + i,
        ));
    }

    let records = validate(&events, observation, &meta(observation), UTC, DRIFT_DELTA).unwrap();

    assert_eq!(records.claims.len(), 5);
    for claim in &records.claims {
        assert_eq!(claim.epoch, observation);
        assert_eq!(claim.bet_epoch, EPOCH);
        assert_ne!(claim.epoch, claim.bet_epoch);
        assert_eq!(claim.amount.to_string(), "3.87600000");
    }

    assert_eq!(records.multi_claims.len(), 1);
    let mc = &records.multi_claims[0];
    assert_eq!(mc.epoch, observation);
    assert_eq!(mc.sender, wallet);
    assert_eq!(mc.claim_count, 5);
    assert_eq!(mc.total_amount.to_string(), "19.38000000");
}

/// Without lock/close prices anywhere, validation still commits: outcome
/// defaults to UP and a warning records the gap.
#[test]
fn scenario_missing_prices_still_validates() {
    let mut events = lifecycle(EPOCH);
    events.locks.clear();
    events.ends.clear();
    events.stakes_up.push(event(
        EventKind::StakeUp,
        EPOCH,
        Some("0x00aa"),
        Some("1.00000000"),
        10,
    ));

    let mut bare = meta(EPOCH);
    bare.lock_price = None;
    bare.close_price = None;

    let records = validate(&events, EPOCH, &bare, UTC, DRIFT_DELTA).unwrap();
    assert_eq!(records.round.outcome, RoundOutcome::Up);
    assert!(!records.warnings.is_empty());
}

/// Zero-bet epochs must not commit.
#[test]
fn scenario_zero_bet_epoch_fails() {
    let events = lifecycle(EPOCH);
    assert!(validate(&events, EPOCH, &meta(EPOCH), UTC, DRIFT_DELTA).is_err());
}

/// Sum law and side law hold on the produced records at 4-digit precision.
#[test]
fn scenario_sum_and_side_laws() {
    let mut events = lifecycle(EPOCH);
    for i in 0..7i64 {
        events.stakes_up.push(event(
            EventKind::StakeUp,
            EPOCH,
            Some("0x00aa"),
            Some("0.33330000"),
            10 + i,
        ));
    }
    for i in 0..3i64 {
        events.stakes_down.push(event(
            EventKind::StakeDown,
            EPOCH,
            Some("0x00bb"),
            Some("0.11110000"),
            30 + i,
        ));
    }

    let records = validate(&events, EPOCH, &meta(EPOCH), UTC, DRIFT_DELTA).unwrap();

    let bet_sum: Decimal = records.bets.iter().map(|b| b.amount).sum();
    assert!((records.round.total_amount - bet_sum).abs() <= dec("0.0001"));

    let up_sum: Decimal = records
        .bets
        .iter()
        .filter(|b| b.direction == Direction::Up)
        .map(|b| b.amount)
        .sum();
    assert_eq!(up_sum.round_dp(4), records.round.up_amount.round_dp(4));

    let up_count = records
        .bets
        .iter()
        .filter(|b| b.direction == Direction::Up)
        .count();
    let down_count = records
        .bets
        .iter()
        .filter(|b| b.direction == Direction::Down)
        .count();
    assert_eq!(records.bets.len(), up_count + down_count);
}
