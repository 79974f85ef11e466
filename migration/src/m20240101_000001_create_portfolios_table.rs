use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.create_table(
            Table::create()
                .table(Portfolios::Table)
                .if_not_exists()
                .col(ColumnDef::new(Portfolios::Id).uuid().not_null().primary_key())
                .col(ColumnDef::new(Portfolios::UserId).string().not_null().unique_key())
                .col(
                    ColumnDef::new(Portfolios::CreatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .to_owned()
        ).await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Portfolios::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum Portfolios {
    Table,
    Id,
    UserId,
    CreatedAt,
}
