//! Store-level tests against a live Postgres.
//!
//! Run with TEST_DATABASE_URL pointing at a disposable database:
//! `cargo test -- --ignored`

mod common;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use sea_orm_migration::MigratorTrait;

use prediction_archiver::entities::prelude::*;
use prediction_archiver::entities::{his_bet, his_claim};
use prediction_archiver::models::error::ValidationWarning;
use prediction_archiver::models::records::{
    BetOutcome, BetRecord, ClaimRecord, Direction, EpochRecords, MultiClaimRecord, RoundOutcome,
    RoundRecord,
};
use prediction_archiver::services::store;

use crate::common::setup_test_db;

const TEST_EPOCH: u64 = 900_100;

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn ts(secs: i64) -> NaiveDateTime {
    chrono::DateTime::from_timestamp(secs, 0).unwrap().naive_utc()
}

fn sample_records(epoch: u64) -> EpochRecords {
    let round = RoundRecord {
        epoch,
        start_time: ts(1_700_000_000),
        lock_time: ts(1_700_000_300),
        close_time: ts(1_700_000_600),
        lock_price: Some(dec("500.00000000")),
        close_price: Some(dec("510.00000000")),
        outcome: RoundOutcome::Up,
        total_amount: dec("4.00000000"),
        up_amount: dec("3.00000000"),
        down_amount: dec("1.00000000"),
        up_odds: dec("1.2933"),
        down_odds: dec("3.8800"),
    };

    let bets = vec![
        BetRecord {
            epoch,
            bet_time: ts(1_700_000_100),
            sender: "0xaaaa".to_string(),
            direction: Direction::Up,
            amount: dec("3.00000000"),
            outcome: BetOutcome::Win,
            block_number: 1,
            tx_hash: format!("0x{:064x}", epoch),
            log_index: 0,
        },
        BetRecord {
            epoch,
            bet_time: ts(1_700_000_110),
            sender: "0xbbbb".to_string(),
            direction: Direction::Down,
            amount: dec("1.00000000"),
            outcome: BetOutcome::Loss,
            block_number: 2,
            tx_hash: format!("0x{:064x}", epoch + 1),
            log_index: 1,
        },
    ];

    let claims = vec![ClaimRecord {
        epoch,
        bet_epoch: epoch - 2,
        sender: "0xcccc".to_string(),
        amount: dec("3.87600000"),
        claim_time: ts(1_700_000_200),
        block_number: 3,
        tx_hash: format!("0x{:064x}", epoch + 2),
        log_index: 2,
    }];

    let multi_claims: Vec<MultiClaimRecord> = Vec::new();
    let warnings: Vec<ValidationWarning> = Vec::new();

    EpochRecords {
        round,
        bets,
        claims,
        multi_claims,
        warnings,
    }
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_commit_epoch_is_atomic_and_marks_done() {
    let db = setup_test_db().await.expect("test DB");
    migration::Migrator::up(&db, None).await.expect("migrations");
    store::delete_epoch(&db, TEST_EPOCH).await.expect("cleanup");

    let records = sample_records(TEST_EPOCH);
    store::commit_epoch(&db, &records).await.expect("commit");

    assert!(store::is_epoch_complete(&db, TEST_EPOCH).await.unwrap());

    let round = Round::find_by_id(TEST_EPOCH as i64)
        .one(&db)
        .await
        .unwrap()
        .expect("round row");
    assert_eq!(round.position, "UP");
    assert_eq!(round.total_amount, dec("4.00000000"));

    let bets = HisBet::find()
        .filter(his_bet::Column::Epoch.eq(TEST_EPOCH as i64))
        .all(&db)
        .await
        .unwrap();
    assert_eq!(bets.len(), 2);

    let claims = HisClaim::find()
        .filter(his_claim::Column::Epoch.eq(TEST_EPOCH as i64))
        .all(&db)
        .await
        .unwrap();
    assert_eq!(claims.len(), 1);
    assert_eq!(claims[0].bet_epoch, (TEST_EPOCH - 2) as i64);

    store::delete_epoch(&db, TEST_EPOCH).await.expect("cleanup");
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_recommit_violates_unique_constraints() {
    let db = setup_test_db().await.expect("test DB");
    migration::Migrator::up(&db, None).await.expect("migrations");
    let epoch = TEST_EPOCH + 10;
    store::delete_epoch(&db, epoch).await.expect("cleanup");

    let records = sample_records(epoch);
    store::commit_epoch(&db, &records).await.expect("commit");

    // A second commit of the same epoch must fail on the round PK or the
    // bet unique, leaving the first commit intact
    assert!(store::commit_epoch(&db, &records).await.is_err());
    assert!(store::is_epoch_complete(&db, epoch).await.unwrap());

    store::delete_epoch(&db, epoch).await.expect("cleanup");
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_epoch_error_survives_and_upserts() {
    let db = setup_test_db().await.expect("test DB");
    migration::Migrator::up(&db, None).await.expect("migrations");
    let epoch = TEST_EPOCH + 20;

    store::record_epoch_error(&db, epoch, "first failure").await;
    store::record_epoch_error(&db, epoch, "second failure").await;

    let row = ErrEpoch::find_by_id(epoch as i64)
        .one(&db)
        .await
        .unwrap()
        .expect("error row");
    assert_eq!(row.last_error, "second failure");

    ErrEpoch::delete_by_id(epoch as i64).exec(&db).await.unwrap();
}
