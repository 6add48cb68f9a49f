use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Round::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Round::Epoch)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Round::StartTime).timestamp().not_null())
                    .col(ColumnDef::new(Round::LockTime).timestamp().not_null())
                    .col(ColumnDef::new(Round::CloseTime).timestamp().not_null())
                    .col(ColumnDef::new(Round::LockPrice).decimal_len(20, 8).null())
                    .col(ColumnDef::new(Round::ClosePrice).decimal_len(20, 8).null())
                    .col(ColumnDef::new(Round::Position).string_len(4).not_null())
                    .col(
                        ColumnDef::new(Round::TotalAmount)
                            .decimal_len(20, 8)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Round::UpAmount)
                            .decimal_len(20, 8)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Round::DownAmount)
                            .decimal_len(20, 8)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Round::UpOdds).decimal_len(12, 4).not_null())
                    .col(
                        ColumnDef::new(Round::DownOdds)
                            .decimal_len(12, 4)
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Round::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Round {
    Table,
    Epoch,
    StartTime,
    LockTime,
    CloseTime,
    LockPrice,
    ClosePrice,
    Position,
    TotalAmount,
    UpAmount,
    DownAmount,
    UpOdds,
    DownOdds,
}
