use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MultiClaim::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MultiClaim::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MultiClaim::Epoch).big_integer().not_null())
                    .col(
                        ColumnDef::new(MultiClaim::Sender)
                            .string_len(42)
                            .not_null(),
                    )
                    .col(ColumnDef::new(MultiClaim::ClaimCount).integer().not_null())
                    .col(
                        ColumnDef::new(MultiClaim::TotalAmount)
                            .decimal_len(20, 8)
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("multiClaim_epoch_sender_uniq")
                    .table(MultiClaim::Table)
                    .col(MultiClaim::Epoch)
                    .col(MultiClaim::Sender)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MultiClaim::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum MultiClaim {
    Table,
    Id,
    Epoch,
    Sender,
    ClaimCount,
    TotalAmount,
}
