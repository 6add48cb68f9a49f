//! Epoch validation and canonical record construction
//!
//! Pure: takes harvested events plus round metadata and either produces the
//! canonical record sets for one epoch or an enumerated list of failures.
//! Missing prices are reported, never replaced with external data.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDateTime;
use chrono_tz::Tz;
use rust_decimal::Decimal;

use crate::models::amount::CANONICAL_SCALE;
use crate::models::error::{ValidationError, ValidationFailure, ValidationWarning};
use crate::models::events::{EpochEvents, HarvestedEvent, RoundMeta};
use crate::models::records::{
    BetOutcome, BetRecord, ClaimRecord, Direction, EpochRecords, MultiClaimRecord, RoundOutcome,
    RoundRecord,
};

/// Odds precision in fractional digits
const ODDS_SCALE: u32 = 4;

/// Claim-count threshold for the multi-claim flag
const MULTI_CLAIM_MIN_COUNT: usize = 5;

/// Pool share left after the 3% fee
fn pool_multiplier() -> Decimal {
    Decimal::new(97, 2)
}

/// Cumulative-amount threshold for the multi-claim flag
fn multi_claim_min_total() -> Decimal {
    Decimal::ONE
}

/// Validate one epoch's events and build its canonical records.
pub fn validate(
    events: &EpochEvents,
    target_epoch: u64,
    meta: &RoundMeta,
    tz: Tz,
    drift_delta: u64,
) -> Result<EpochRecords, ValidationFailure> {
    let mut reasons = Vec::new();
    let mut warnings = Vec::new();

    // Structural completeness
    if events.starts.is_empty() {
        reasons.push(ValidationError::MissingRoundStart);
    }

    for (stream, list) in [
        ("round_start", &events.starts),
        ("round_lock", &events.locks),
        ("round_end", &events.ends),
    ] {
        for event in list {
            if event.epoch.abs_diff(target_epoch) > drift_delta {
                reasons.push(ValidationError::EpochDrift {
                    stream,
                    found: event.epoch,
                    target: target_epoch,
                });
            }
        }
    }

    for (stream, list) in [
        ("stake_up", &events.stakes_up),
        ("stake_down", &events.stakes_down),
    ] {
        for event in list {
            check_party_event(stream, event, &mut reasons);
        }
    }

    for event in &events.claims {
        check_party_event("claim", event, &mut reasons);
        if event.epoch == 0 {
            reasons.push(ValidationError::InvalidClaimEpoch {
                tx_hash: event.tx_hash.clone(),
            });
        }
    }

    // Zero-bet epochs are rejected by design
    let up_stakes: Vec<&HarvestedEvent> = events
        .stakes_up
        .iter()
        .filter(|e| e.epoch == target_epoch)
        .collect();
    let down_stakes: Vec<&HarvestedEvent> = events
        .stakes_down
        .iter()
        .filter(|e| e.epoch == target_epoch)
        .collect();
    if up_stakes.is_empty() && down_stakes.is_empty() {
        reasons.push(ValidationError::NoStakes);
    }

    if !reasons.is_empty() {
        return Err(ValidationFailure { reasons });
    }

    // Reference prices: lock/end events for the target epoch, else metadata
    let lock_price = events
        .locks
        .iter()
        .filter(|e| e.epoch == target_epoch)
        .filter_map(|e| e.amount)
        .last()
        .or(meta.lock_price);
    let close_price = events
        .ends
        .iter()
        .filter(|e| e.epoch == target_epoch)
        .filter_map(|e| e.amount)
        .last()
        .or(meta.close_price);

    let outcome = match (lock_price, close_price) {
        (Some(lock), Some(close)) => {
            if close > lock {
                RoundOutcome::Up
            } else {
                RoundOutcome::Down
            }
        }
        _ => {
            warnings.push(ValidationWarning::MissingPrices);
            RoundOutcome::Up
        }
    };

    // Aggregates
    let up_amount = sum_amounts(&up_stakes);
    let down_amount = sum_amounts(&down_stakes);
    let mut total_amount = up_amount + down_amount;
    total_amount.rescale(CANONICAL_SCALE);

    let round = RoundRecord {
        epoch: target_epoch,
        start_time: boundary_time(meta.start_ts, events.starts.first(), tz),
        lock_time: boundary_time(meta.lock_ts, events.locks.first(), tz),
        close_time: boundary_time(meta.close_ts, events.ends.first(), tz),
        lock_price,
        close_price,
        outcome,
        total_amount,
        up_amount,
        down_amount,
        up_odds: side_odds(total_amount, up_amount),
        down_odds: side_odds(total_amount, down_amount),
    };

    // Bets, tagged by source stream
    let mut bets = Vec::with_capacity(up_stakes.len() + down_stakes.len());
    for (direction, stakes) in [(Direction::Up, &up_stakes), (Direction::Down, &down_stakes)] {
        for event in stakes {
            let (Some(sender), Some(amount)) = (event.sender.clone(), event.amount) else {
                continue;
            };
            bets.push(BetRecord {
                epoch: target_epoch,
                bet_time: to_local(event.timestamp, tz),
                sender,
                direction,
                amount,
                outcome: if outcome.matches(direction) {
                    BetOutcome::Win
                } else {
                    BetOutcome::Loss
                },
                block_number: event.block_number,
                tx_hash: event.tx_hash.clone(),
                log_index: event.log_index,
            });
        }
    }

    // Claims: observed in this epoch, settling the embedded bet epoch.
    // Deduplicated by (tx, log, bet_epoch) in memory so a legacy pair-only
    // schema never sees a violating batch.
    let mut claims = Vec::with_capacity(events.claims.len());
    let mut seen: HashSet<(String, i64, u64)> = HashSet::new();
    for event in &events.claims {
        let (Some(sender), Some(amount)) = (event.sender.clone(), event.amount) else {
            continue;
        };
        let key = (event.tx_hash.clone(), event.log_index, event.epoch);
        if !seen.insert(key) {
            warnings.push(ValidationWarning::DuplicateClaimDropped {
                tx_hash: event.tx_hash.clone(),
                log_index: event.log_index,
                bet_epoch: event.epoch,
            });
            continue;
        }
        claims.push(ClaimRecord {
            epoch: target_epoch,
            bet_epoch: event.epoch,
            sender,
            amount,
            claim_time: to_local(event.timestamp, tz),
            block_number: event.block_number,
            tx_hash: event.tx_hash.clone(),
            log_index: event.log_index,
        });
    }

    let multi_claims = derive_multi_claims(target_epoch, &claims);

    // Cross-table consistency on the constructed records
    let mut consistency = Vec::new();

    let bet_sum = round_4dp(bets.iter().map(|b| b.amount).sum());
    if bet_sum != round_4dp(round.total_amount) {
        consistency.push(ValidationError::TotalSumMismatch {
            round_total: round.total_amount,
            bet_sum,
        });
    }

    for (side, round_amount, direction) in [
        ("up", round.up_amount, Direction::Up),
        ("down", round.down_amount, Direction::Down),
    ] {
        let side_sum = round_4dp(
            bets.iter()
                .filter(|b| b.direction == direction)
                .map(|b| b.amount)
                .sum(),
        );
        if side_sum != round_4dp(round_amount) {
            consistency.push(ValidationError::SideSumMismatch {
                side,
                round_amount,
                bet_sum: side_sum,
            });
        }
    }

    if round.up_amount > Decimal::ZERO && round.up_odds.is_zero() {
        consistency.push(ValidationError::ZeroOddsWithStake { side: "up" });
    }
    if round.down_amount > Decimal::ZERO && round.down_odds.is_zero() {
        consistency.push(ValidationError::ZeroOddsWithStake { side: "down" });
    }

    let up_count = bets.iter().filter(|b| b.direction == Direction::Up).count();
    let down_count = bets.len() - up_count;
    if bets.len() != up_stakes.len() + down_stakes.len() {
        consistency.push(ValidationError::BetCountMismatch {
            total: bets.len(),
            up: up_count,
            down: down_count,
        });
    }

    if !consistency.is_empty() {
        return Err(ValidationFailure {
            reasons: consistency,
        });
    }

    Ok(EpochRecords {
        round,
        bets,
        claims,
        multi_claims,
        warnings,
    })
}

/// Shared structural checks for stake and claim events.
fn check_party_event(
    stream: &'static str,
    event: &HarvestedEvent,
    reasons: &mut Vec<ValidationError>,
) {
    if event.sender.as_deref().map_or(true, str::is_empty) {
        reasons.push(ValidationError::EmptySender { stream });
    }
    match event.amount {
        Some(amount) if amount > Decimal::ZERO => {}
        _ => reasons.push(ValidationError::NonPositiveAmount {
            stream,
            tx_hash: event.tx_hash.clone(),
        }),
    }
}

/// Flag wallets whose aggregate claim activity in the observation epoch
/// crosses either threshold.
fn derive_multi_claims(epoch: u64, claims: &[ClaimRecord]) -> Vec<MultiClaimRecord> {
    let mut per_wallet: BTreeMap<&str, (usize, Decimal)> = BTreeMap::new();
    for claim in claims {
        let entry = per_wallet.entry(claim.sender.as_str()).or_default();
        entry.0 += 1;
        entry.1 += claim.amount;
    }

    per_wallet
        .into_iter()
        .filter(|(_, (count, total))| {
            *count >= MULTI_CLAIM_MIN_COUNT || *total >= multi_claim_min_total()
        })
        .map(|(sender, (count, mut total))| {
            total.rescale(CANONICAL_SCALE);
            MultiClaimRecord {
                epoch,
                sender: sender.to_string(),
                claim_count: count as u32,
                total_amount: total,
            }
        })
        .collect()
}

fn sum_amounts(stakes: &[&HarvestedEvent]) -> Decimal {
    let mut sum: Decimal = stakes.iter().filter_map(|e| e.amount).sum();
    sum.rescale(CANONICAL_SCALE);
    sum
}

/// `(total * (1 - fee)) / side` at 4 digits; zero when the side is empty.
fn side_odds(total: Decimal, side: Decimal) -> Decimal {
    let mut odds = if side.is_zero() {
        Decimal::ZERO
    } else {
        (total * pool_multiplier() / side).round_dp(ODDS_SCALE)
    };
    odds.rescale(ODDS_SCALE);
    odds
}

fn round_4dp(value: Decimal) -> Decimal {
    value.round_dp(ODDS_SCALE)
}

/// Boundary timestamp from round metadata, falling back to the first
/// observed lifecycle event when the contract reports zero.
fn boundary_time(meta_ts: u64, event: Option<&HarvestedEvent>, tz: Tz) -> NaiveDateTime {
    let ts = if meta_ts > 0 {
        meta_ts as i64
    } else {
        event.map(|e| e.timestamp).unwrap_or(0)
    };
    to_local(ts, tz)
}

/// Unix seconds to a wall-clock timestamp in the configured timezone.
fn to_local(ts: i64, tz: Tz) -> NaiveDateTime {
    use chrono::TimeZone;
    match tz.timestamp_opt(ts, 0) {
        chrono::LocalResult::Single(dt) => dt.naive_local(),
        chrono::LocalResult::Ambiguous(dt, _) => dt.naive_local(),
        chrono::LocalResult::None => chrono::DateTime::from_timestamp(ts, 0)
            .map(|dt| dt.naive_utc())
            .unwrap_or(NaiveDateTime::MIN),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::events::EventKind;

    const EPOCH: u64 = 426_236;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn meta() -> RoundMeta {
        RoundMeta {
            epoch: EPOCH,
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
            block_number: 1_000 + log_index as u64,
            timestamp: 1_700_000_100,
            tx_hash: format!("0x{:064x}", log_index),
            log_index,
        }
    }

    fn base_events() -> EpochEvents {
        let mut events = EpochEvents::default();
        events
            .starts
            .push(event(EventKind::RoundStart, EPOCH, None, None, 0));
        events.locks.push(event(
            EventKind::RoundLock,
            EPOCH,
            None,
            Some("500.00000000"),
            1,
        ));
        events.ends.push(event(
            EventKind::RoundEnd,
            EPOCH,
            None,
            Some("510.00000000"),
            2,
        ));
        events
    }

    #[test]
    fn test_round_aggregates_and_odds() {
        let mut events = base_events();
        events.stakes_up.push(event(
            EventKind::StakeUp,
            EPOCH,
            Some("0xaaa"),
            Some("2.00000000"),
            10,
        ));
        events.stakes_up.push(event(
            EventKind::StakeUp,
            EPOCH,
            Some("0xbbb"),
            Some("1.00000000"),
            11,
        ));
        events.stakes_down.push(event(
            EventKind::StakeDown,
            EPOCH,
            Some("0xccc"),
            Some("1.00000000"),
            12,
        ));

        let records = validate(&events, EPOCH, &meta(), chrono_tz::UTC, 20).unwrap();
        let round = &records.round;

        assert_eq!(round.outcome, RoundOutcome::Up);
        assert_eq!(round.total_amount.to_string(), "4.00000000");
        assert_eq!(round.up_amount.to_string(), "3.00000000");
        assert_eq!(round.down_amount.to_string(), "1.00000000");
        assert_eq!(round.up_odds.to_string(), "1.2933");
        assert_eq!(round.down_odds.to_string(), "3.8800");

        for bet in &records.bets {
            match bet.direction {
                Direction::Up => assert_eq!(bet.outcome, BetOutcome::Win),
                Direction::Down => assert_eq!(bet.outcome, BetOutcome::Loss),
            }
        }
        assert!(records.warnings.is_empty());
    }

    #[test]
    fn test_zero_bet_epoch_rejected() {
        let events = base_events();
        let failure = validate(&events, EPOCH, &meta(), chrono_tz::UTC, 20).unwrap_err();
        assert!(failure.reasons.contains(&ValidationError::NoStakes));
    }

    #[test]
    fn test_missing_round_start_rejected() {
        let mut events = base_events();
        events.starts.clear();
        events.stakes_up.push(event(
            EventKind::StakeUp,
            EPOCH,
            Some("0xaaa"),
            Some("1.00000000"),
            10,
        ));
        let failure = validate(&events, EPOCH, &meta(), chrono_tz::UTC, 20).unwrap_err();
        assert!(failure
            .reasons
            .contains(&ValidationError::MissingRoundStart));
    }

    #[test]
    fn test_one_sided_epoch_zero_odds() {
        let mut events = base_events();
        events.stakes_up.push(event(
            EventKind::StakeUp,
            EPOCH,
            Some("0xaaa"),
            Some("5.00000000"),
            10,
        ));

        let records = validate(&events, EPOCH, &meta(), chrono_tz::UTC, 20).unwrap();
        // (5 * 0.97) / 5 = 0.97
        assert_eq!(records.round.up_odds.to_string(), "0.9700");
        assert_eq!(records.round.down_odds.to_string(), "0.0000");
        assert_eq!(records.round.down_amount, Decimal::ZERO);
    }

    #[test]
    fn test_missing_prices_defaults_up_with_warning() {
        let mut events = base_events();
        events.locks.clear();
        events.ends.clear();
        events.stakes_down.push(event(
            EventKind::StakeDown,
            EPOCH,
            Some("0xaaa"),
            Some("1.00000000"),
            10,
        ));
        let mut bare_meta = meta();
        bare_meta.lock_price = None;
        bare_meta.close_price = None;

        let records = validate(&events, EPOCH, &bare_meta, chrono_tz::UTC, 20).unwrap();
        assert_eq!(records.round.outcome, RoundOutcome::Up);
        assert!(records
            .warnings
            .contains(&ValidationWarning::MissingPrices));
        // The only bet is a down bet and the defaulted outcome is UP
        assert_eq!(records.bets[0].outcome, BetOutcome::Loss);
    }

    #[test]
    fn test_close_below_lock_is_down() {
        let mut events = base_events();
        events.ends.clear();
        events.ends.push(event(
            EventKind::RoundEnd,
            EPOCH,
            None,
            Some("490.00000000"),
            2,
        ));
        events.stakes_up.push(event(
            EventKind::StakeUp,
            EPOCH,
            Some("0xaaa"),
            Some("1.00000000"),
            10,
        ));
        let mut m = meta();
        m.close_price = None;

        let records = validate(&events, EPOCH, &m, chrono_tz::UTC, 20).unwrap();
        assert_eq!(records.round.outcome, RoundOutcome::Down);
        assert_eq!(records.bets[0].outcome, BetOutcome::Loss);
    }

    #[test]
    fn test_cross_epoch_claim_attribution() {
        let observation_epoch = 426_238;
        let mut events = base_events();
        for e in events
            .starts
            .iter_mut()
            .chain(events.locks.iter_mut())
            .chain(events.ends.iter_mut())
        {
            e.epoch = observation_epoch;
        }
        events.stakes_up.push(event(
            EventKind::StakeUp,
            observation_epoch,
            Some("0xaaa"),
            Some("1.00000000"),
            10,
        ));
        // Withdrawal observed here settles winnings from epoch 426236
        events.claims.push(event(
            EventKind::Claim,
            EPOCH,
            Some("0xwallet"),
            Some("3.87600000"),
            20,
        ));

        let mut m = meta();
        m.epoch = observation_epoch;
        let records = validate(&events, observation_epoch, &m, chrono_tz::UTC, 20).unwrap();

        assert_eq!(records.claims.len(), 1);
        let claim = &records.claims[0];
        assert_eq!(claim.epoch, observation_epoch);
        assert_eq!(claim.bet_epoch, EPOCH);
        assert_eq!(claim.amount.to_string(), "3.87600000");
    }

    #[test]
    fn test_multi_claim_by_count() {
        let mut events = base_events();
        events.stakes_up.push(event(
            EventKind::StakeUp,
            EPOCH,
            Some("0xaaa"),
            Some("1.00000000"),
            10,
        ));
        for i in 0..5 {
            events.claims.push(event(
                EventKind::Claim,
                EPOCH - 2 - i as u64,
                Some("0xwallet"),
                Some("0.10000000"),
                20 + i,
            ));
        }

        let records = validate(&events, EPOCH, &meta(), chrono_tz::UTC, 20).unwrap();
        assert_eq!(records.multi_claims.len(), 1);
        let mc = &records.multi_claims[0];
        assert_eq!(mc.claim_count, 5);
        assert_eq!(mc.total_amount.to_string(), "0.50000000");
    }

    #[test]
    fn test_multi_claim_by_amount() {
        let mut events = base_events();
        events.stakes_up.push(event(
            EventKind::StakeUp,
            EPOCH,
            Some("0xaaa"),
            Some("1.00000000"),
            10,
        ));
        events.claims.push(event(
            EventKind::Claim,
            EPOCH - 2,
            Some("0xwallet"),
            Some("1.50000000"),
            20,
        ));

        let records = validate(&events, EPOCH, &meta(), chrono_tz::UTC, 20).unwrap();
        assert_eq!(records.multi_claims.len(), 1);
        assert_eq!(records.multi_claims[0].claim_count, 1);
    }

    #[test]
    fn test_below_both_thresholds_no_multi_claim() {
        let mut events = base_events();
        events.stakes_up.push(event(
            EventKind::StakeUp,
            EPOCH,
            Some("0xaaa"),
            Some("1.00000000"),
            10,
        ));
        for i in 0..4 {
            events.claims.push(event(
                EventKind::Claim,
                EPOCH - 2,
                Some("0xwallet"),
                Some("0.10000000"),
                20 + i,
            ));
        }

        let records = validate(&events, EPOCH, &meta(), chrono_tz::UTC, 20).unwrap();
        assert!(records.multi_claims.is_empty());
    }

    #[test]
    fn test_duplicate_claim_triple_deduplicated() {
        let mut events = base_events();
        events.stakes_up.push(event(
            EventKind::StakeUp,
            EPOCH,
            Some("0xaaa"),
            Some("1.00000000"),
            10,
        ));
        let claim = event(
            EventKind::Claim,
            EPOCH - 2,
            Some("0xwallet"),
            Some("0.50000000"),
            20,
        );
        events.claims.push(claim.clone());
        events.claims.push(claim);

        let records = validate(&events, EPOCH, &meta(), chrono_tz::UTC, 20).unwrap();
        assert_eq!(records.claims.len(), 1);
        assert!(records.warnings.iter().any(|w| matches!(
            w,
            ValidationWarning::DuplicateClaimDropped { .. }
        )));
    }

    #[test]
    fn test_epoch_drift_rejected() {
        let mut events = base_events();
        events.starts[0].epoch = EPOCH + 21;
        events.stakes_up.push(event(
            EventKind::StakeUp,
            EPOCH,
            Some("0xaaa"),
            Some("1.00000000"),
            10,
        ));

        let failure = validate(&events, EPOCH, &meta(), chrono_tz::UTC, 20).unwrap_err();
        assert!(failure.reasons.iter().any(|r| matches!(
            r,
            ValidationError::EpochDrift { found, .. } if *found == EPOCH + 21
        )));
    }

    #[test]
    fn test_non_positive_stake_rejected() {
        let mut events = base_events();
        events.stakes_up.push(event(
            EventKind::StakeUp,
            EPOCH,
            Some("0xaaa"),
            Some("0.00000000"),
            10,
        ));

        let failure = validate(&events, EPOCH, &meta(), chrono_tz::UTC, 20).unwrap_err();
        assert!(failure.reasons.iter().any(|r| matches!(
            r,
            ValidationError::NonPositiveAmount { stream, .. } if *stream == "stake_up"
        )));
    }
}
