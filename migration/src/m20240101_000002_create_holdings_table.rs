use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.create_table(holdings_table()).await?;

        // One holding per coin in a portfolio
        manager.create_index(
            Index::create()
                .if_not_exists()
                .name("idx_holdings_portfolio_coin")
                .table(Holdings::Table)
                .col(Holdings::PortfolioId)
                .col(Holdings::CoinId)
                .unique()
                .to_owned()
        ).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Holdings::Table).to_owned()).await
    }
}

/// Amount columns are unconstrained `NUMERIC` so every `Decimal` scale round-trips.
fn holdings_table() -> TableCreateStatement {
    Table::create()
        .table(Holdings::Table)
        .if_not_exists()
        .col(ColumnDef::new(Holdings::Id).uuid().not_null().primary_key())
        .col(ColumnDef::new(Holdings::PortfolioId).uuid().not_null())
        .col(ColumnDef::new(Holdings::CoinId).string().not_null())
        .col(ColumnDef::new(Holdings::Quantity).decimal().not_null())
        .col(ColumnDef::new(Holdings::AveragePrice).decimal().not_null())
        .col(ColumnDef::new(Holdings::CurrentPrice).decimal())
        .col(ColumnDef::new(Holdings::LastCheckedPrice).decimal())
        .col(ColumnDef::new(Holdings::Version).big_integer().not_null().default(1))
        .col(ColumnDef::new(Holdings::CreatedAt).timestamp_with_time_zone().not_null())
        .col(ColumnDef::new(Holdings::UpdatedAt).timestamp_with_time_zone().not_null())
        .foreign_key(
            ForeignKey::create()
                .name("fk_holdings_portfolio")
                .from(Holdings::Table, Holdings::PortfolioId)
                .to(Portfolios::Table, Portfolios::Id)
                .on_delete(ForeignKeyAction::Cascade)
        )
        .to_owned()
}

#[derive(DeriveIden)]
enum Holdings {
    Table,
    Id,
    PortfolioId,
    CoinId,
    Quantity,
    AveragePrice,
    CurrentPrice,
    LastCheckedPrice,
    Version,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Portfolios {
    Table,
    Id,
}
