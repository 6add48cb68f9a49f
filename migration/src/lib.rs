pub use sea_orm_migration::prelude::*;

mod m20260520_000001_create_round;
mod m20260520_000002_create_his_bet;
mod m20260520_000003_create_his_claim;
mod m20260520_000004_create_multi_claim;
mod m20260520_000005_create_real_bet;
mod m20260520_000006_create_epoch_markers;
mod m20260521_000001_drop_round_foreign_keys;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260520_000001_create_round::Migration),
            Box::new(m20260520_000002_create_his_bet::Migration),
            Box::new(m20260520_000003_create_his_claim::Migration),
            Box::new(m20260520_000004_create_multi_claim::Migration),
            Box::new(m20260520_000005_create_real_bet::Migration),
            Box::new(m20260520_000006_create_epoch_markers::Migration),
            Box::new(m20260521_000001_drop_round_foreign_keys::Migration),
        ]
    }
}
