use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    // The backward sweep commits claims whose bet_epoch round has not been
    // backfilled yet; any foreign key from his_bet/his_claim to round would
    // deadlock it. Earlier schema revisions carried such constraints, so
    // this drop stays idempotent.
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared("ALTER TABLE his_bet DROP CONSTRAINT IF EXISTS fk_his_bet_round")
            .await?;
        db.execute_unprepared("ALTER TABLE his_claim DROP CONSTRAINT IF EXISTS fk_his_claim_round")
            .await?;
        db.execute_unprepared(
            "ALTER TABLE his_claim DROP CONSTRAINT IF EXISTS fk_his_claim_bet_round",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, _manager: &SchemaManager) -> Result<(), DbErr> {
        // Constraints are gone for good; nothing to restore
        Ok(())
    }
}
