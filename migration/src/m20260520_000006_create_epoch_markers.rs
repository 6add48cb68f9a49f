use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FinEpoch::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FinEpoch::Epoch)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(FinEpoch::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ErrEpoch::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ErrEpoch::Epoch)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ErrEpoch::LastError).text().not_null())
                    .col(
                        ColumnDef::new(ErrEpoch::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FinEpoch::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ErrEpoch::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum FinEpoch {
    Table,
    Epoch,
    CreatedAt,
}

#[derive(Iden)]
enum ErrEpoch {
    Table,
    Epoch,
    LastError,
    UpdatedAt,
}
