//! SeaORM Entity for historical claims
//!
//! A single transaction may settle several bet epochs for one wallet, so
//! uniqueness is (tx_hash, log_index, bet_epoch). `epoch` is the epoch the
//! withdrawal was observed in and usually differs from `bet_epoch`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "his_claim")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Observation epoch
    pub epoch: i64,
    /// Epoch whose winnings are being withdrawn
    pub bet_epoch: i64,
    pub sender: String,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub amount: Decimal,
    pub claim_time: DateTime,
    pub block_number: i64,
    pub tx_hash: String,
    pub log_index: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
