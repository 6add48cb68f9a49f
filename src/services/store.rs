//! Epoch persistence
//!
//! One transaction per epoch: purge the live staging rows, insert the
//! canonical records and append the completion marker. The marker is part
//! of the same transaction by construction, so an epoch is either fully
//! persisted and marked or not present at all. Failure diagnostics go
//! through the pool, never the failed transaction.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
    TransactionError, TransactionTrait,
};
use tracing::{debug, warn};

use crate::entities::prelude::*;
use crate::entities::{err_epoch, fin_epoch, his_bet, his_claim, multi_claim, real_bet, round};
use crate::models::records::EpochRecords;

/// True when the epoch already carries a completion marker.
pub async fn is_epoch_complete(db: &DatabaseConnection, epoch: u64) -> Result<bool, DbErr> {
    let marker = FinEpoch::find_by_id(epoch as i64).one(db).await?;
    Ok(marker.is_some())
}

/// Persist one validated epoch atomically.
pub async fn commit_epoch(db: &DatabaseConnection, records: &EpochRecords) -> Result<(), DbErr> {
    let epoch = records.round.epoch as i64;

    let round_model = round::ActiveModel {
        epoch: Set(epoch),
        start_time: Set(records.round.start_time),
        lock_time: Set(records.round.lock_time),
        close_time: Set(records.round.close_time),
        lock_price: Set(records.round.lock_price),
        close_price: Set(records.round.close_price),
        position: Set(records.round.outcome.as_str().to_string()),
        total_amount: Set(records.round.total_amount),
        up_amount: Set(records.round.up_amount),
        down_amount: Set(records.round.down_amount),
        up_odds: Set(records.round.up_odds),
        down_odds: Set(records.round.down_odds),
    };

    let bet_models: Vec<his_bet::ActiveModel> = records
        .bets
        .iter()
        .map(|bet| his_bet::ActiveModel {
            epoch: Set(bet.epoch as i64),
            bet_time: Set(bet.bet_time),
            sender: Set(bet.sender.clone()),
            position: Set(bet.direction.as_str().to_string()),
            amount: Set(bet.amount),
            outcome: Set(bet.outcome.as_str().to_string()),
            block_number: Set(bet.block_number as i64),
            tx_hash: Set(bet.tx_hash.clone()),
            log_index: Set(bet.log_index),
            ..Default::default()
        })
        .collect();

    let claim_models: Vec<his_claim::ActiveModel> = records
        .claims
        .iter()
        .map(|claim| his_claim::ActiveModel {
            epoch: Set(claim.epoch as i64),
            bet_epoch: Set(claim.bet_epoch as i64),
            sender: Set(claim.sender.clone()),
            amount: Set(claim.amount),
            claim_time: Set(claim.claim_time),
            block_number: Set(claim.block_number as i64),
            tx_hash: Set(claim.tx_hash.clone()),
            log_index: Set(claim.log_index),
            ..Default::default()
        })
        .collect();

    let multi_claim_models: Vec<multi_claim::ActiveModel> = records
        .multi_claims
        .iter()
        .map(|mc| multi_claim::ActiveModel {
            epoch: Set(mc.epoch as i64),
            sender: Set(mc.sender.clone()),
            claim_count: Set(mc.claim_count as i32),
            total_amount: Set(mc.total_amount),
            ..Default::default()
        })
        .collect();

    db.transaction::<_, (), DbErr>(|txn| {
        Box::pin(async move {
            RealBet::delete_many()
                .filter(real_bet::Column::Epoch.eq(epoch))
                .exec(txn)
                .await?;

            Round::insert(round_model).exec(txn).await?;

            if !bet_models.is_empty() {
                HisBet::insert_many(bet_models).exec(txn).await?;
            }
            if !claim_models.is_empty() {
                HisClaim::insert_many(claim_models).exec(txn).await?;
            }
            if !multi_claim_models.is_empty() {
                MultiClaim::insert_many(multi_claim_models).exec(txn).await?;
            }

            fin_epoch::ActiveModel {
                epoch: Set(epoch),
                created_at: Set(Utc::now().naive_utc()),
            }
            .insert(txn)
            .await?;

            Ok(())
        })
    })
    .await
    .map_err(flatten_txn_error)?;

    debug!(epoch = epoch, "Epoch committed");
    Ok(())
}

/// Upsert the per-epoch failure diagnostic.
///
/// Runs on the pool, outside any pipeline transaction, so the message
/// survives the rollback it describes. A failure here is logged and
/// swallowed: losing a diagnostic must not mask the original error.
pub async fn record_epoch_error(db: &DatabaseConnection, epoch: u64, message: &str) {
    let now = Utc::now().naive_utc();

    let result: Result<(), DbErr> = async {
        match ErrEpoch::find_by_id(epoch as i64).one(db).await? {
            Some(existing) => {
                let mut model: err_epoch::ActiveModel = existing.into();
                model.last_error = Set(message.to_string());
                model.updated_at = Set(now);
                model.update(db).await?;
            }
            None => {
                err_epoch::ActiveModel {
                    epoch: Set(epoch as i64),
                    last_error: Set(message.to_string()),
                    updated_at: Set(now),
                }
                .insert(db)
                .await?;
            }
        }
        Ok(())
    }
    .await;

    if let Err(e) = result {
        warn!(epoch = epoch, error = %e, "Failed to record epoch error");
    }
}

/// Remove every trace of an epoch so it can be re-processed.
///
/// The external data-repair path: deletes the records and the completion
/// marker in one transaction. Claims are removed by observation epoch; rows
/// whose `bet_epoch` points here belong to the epoch that observed them.
pub async fn delete_epoch(db: &DatabaseConnection, epoch: u64) -> Result<(), DbErr> {
    let epoch = epoch as i64;

    db.transaction::<_, (), DbErr>(|txn| {
        Box::pin(async move {
            HisBet::delete_many()
                .filter(his_bet::Column::Epoch.eq(epoch))
                .exec(txn)
                .await?;
            HisClaim::delete_many()
                .filter(his_claim::Column::Epoch.eq(epoch))
                .exec(txn)
                .await?;
            MultiClaim::delete_many()
                .filter(multi_claim::Column::Epoch.eq(epoch))
                .exec(txn)
                .await?;
            Round::delete_many()
                .filter(round::Column::Epoch.eq(epoch))
                .exec(txn)
                .await?;
            FinEpoch::delete_many()
                .filter(fin_epoch::Column::Epoch.eq(epoch))
                .exec(txn)
                .await?;
            Ok(())
        })
    })
    .await
    .map_err(flatten_txn_error)
}

fn flatten_txn_error(e: TransactionError<DbErr>) -> DbErr {
    match e {
        TransactionError::Connection(db) => db,
        TransactionError::Transaction(db) => db,
    }
}
