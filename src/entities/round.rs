//! SeaORM Entity for the canonical per-epoch round aggregate

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "round")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub epoch: i64,
    /// Round boundaries in the configured timezone, second precision
    pub start_time: DateTime,
    pub lock_time: DateTime,
    pub close_time: DateTime,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))", nullable)]
    pub lock_price: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))", nullable)]
    pub close_price: Option<Decimal>,
    /// Settled outcome: 'UP' or 'DOWN'
    pub position: String,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub total_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub up_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub down_amount: Decimal,
    /// Payout multipliers at 4 fractional digits, zero for an empty side
    #[sea_orm(column_type = "Decimal(Some((12, 4)))")]
    pub up_odds: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 4)))")]
    pub down_odds: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
