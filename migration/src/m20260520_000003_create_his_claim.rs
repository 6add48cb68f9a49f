use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(HisClaim::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(HisClaim::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(HisClaim::Epoch).big_integer().not_null())
                    .col(ColumnDef::new(HisClaim::BetEpoch).big_integer().not_null())
                    .col(ColumnDef::new(HisClaim::Sender).string_len(42).not_null())
                    .col(
                        ColumnDef::new(HisClaim::Amount)
                            .decimal_len(20, 8)
                            .not_null(),
                    )
                    .col(ColumnDef::new(HisClaim::ClaimTime).timestamp().not_null())
                    .col(
                        ColumnDef::new(HisClaim::BlockNumber)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(HisClaim::TxHash).string_len(66).not_null())
                    .col(ColumnDef::new(HisClaim::LogIndex).big_integer().not_null())
                    .to_owned(),
            )
            .await?;

        // One withdrawal log may settle several bet epochs, so the unique
        // key must include bet_epoch
        manager
            .create_index(
                Index::create()
                    .name("hisclaim_tx_log_bet_epoch_uniq")
                    .table(HisClaim::Table)
                    .col(HisClaim::TxHash)
                    .col(HisClaim::LogIndex)
                    .col(HisClaim::BetEpoch)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_his_claim_epoch")
                    .table(HisClaim::Table)
                    .col(HisClaim::Epoch)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_his_claim_sender")
                    .table(HisClaim::Table)
                    .col(HisClaim::Sender)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_his_claim_bet_epoch")
                    .table(HisClaim::Table)
                    .col(HisClaim::BetEpoch)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(HisClaim::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum HisClaim {
    Table,
    Id,
    Epoch,
    BetEpoch,
    Sender,
    Amount,
    ClaimTime,
    BlockNumber,
    TxHash,
    LogIndex,
}
