//! SeaORM Entity for historical bets
//!
//! Deduplication is enforced by the unique (tx_hash, log_index) constraint;
//! there is deliberately no foreign key to `round`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "his_bet")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub epoch: i64,
    pub bet_time: DateTime,
    /// Lowercased 0x-prefixed wallet
    pub sender: String,
    /// Stake direction: 'UP' or 'DOWN'
    pub position: String,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub amount: Decimal,
    /// 'WIN' or 'LOSS' against the round outcome
    pub outcome: String,
    pub block_number: i64,
    pub tx_hash: String,
    pub log_index: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
