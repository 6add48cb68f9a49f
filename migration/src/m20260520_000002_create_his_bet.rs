use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(HisBet::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(HisBet::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(HisBet::Epoch).big_integer().not_null())
                    .col(ColumnDef::new(HisBet::BetTime).timestamp().not_null())
                    .col(ColumnDef::new(HisBet::Sender).string_len(42).not_null())
                    .col(ColumnDef::new(HisBet::Position).string_len(4).not_null())
                    .col(
                        ColumnDef::new(HisBet::Amount)
                            .decimal_len(20, 8)
                            .not_null(),
                    )
                    .col(ColumnDef::new(HisBet::Outcome).string_len(4).not_null())
                    .col(
                        ColumnDef::new(HisBet::BlockNumber)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(HisBet::TxHash).string_len(66).not_null())
                    .col(ColumnDef::new(HisBet::LogIndex).big_integer().not_null())
                    .to_owned(),
            )
            .await?;

        // Replay deduplication: one row per emitted log
        manager
            .create_index(
                Index::create()
                    .name("hisBet_tx_log_uniq")
                    .table(HisBet::Table)
                    .col(HisBet::TxHash)
                    .col(HisBet::LogIndex)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_his_bet_epoch")
                    .table(HisBet::Table)
                    .col(HisBet::Epoch)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_his_bet_sender")
                    .table(HisBet::Table)
                    .col(HisBet::Sender)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(HisBet::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum HisBet {
    Table,
    Id,
    Epoch,
    BetTime,
    Sender,
    Position,
    Amount,
    Outcome,
    BlockNumber,
    TxHash,
    LogIndex,
}
