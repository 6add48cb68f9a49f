use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    // The live-feed system owns this table in production; creating it here
    // keeps fresh environments self-contained.
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RealBet::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RealBet::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RealBet::Epoch).big_integer().not_null())
                    .col(ColumnDef::new(RealBet::Sender).string_len(42).not_null())
                    .col(ColumnDef::new(RealBet::Position).string_len(4).not_null())
                    .col(
                        ColumnDef::new(RealBet::Amount)
                            .decimal_len(20, 8)
                            .not_null(),
                    )
                    .col(ColumnDef::new(RealBet::BetTime).timestamp().null())
                    .col(ColumnDef::new(RealBet::TxHash).string_len(66).null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_real_bet_epoch")
                    .table(RealBet::Table)
                    .col(RealBet::Epoch)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RealBet::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum RealBet {
    Table,
    Id,
    Epoch,
    Sender,
    Position,
    Amount,
    BetTime,
    TxHash,
}
