//! SeaORM Entity for derived multi-claim flags

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "multi_claim")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Observation epoch
    pub epoch: i64,
    pub sender: String,
    pub claim_count: i32,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub total_amount: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
