use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // No foreign key to holdings: history outlives a cleared portfolio.
        manager.create_table(
            Table::create()
                .table(PriceHistory::Table)
                .if_not_exists()
                .col(ColumnDef::new(PriceHistory::Id).uuid().not_null().primary_key())
                .col(ColumnDef::new(PriceHistory::HoldingId).uuid().not_null())
                .col(ColumnDef::new(PriceHistory::PortfolioId).uuid().not_null())
                .col(ColumnDef::new(PriceHistory::CoinId).string().not_null())
                .col(ColumnDef::new(PriceHistory::Price).decimal().not_null())
                .col(ColumnDef::new(PriceHistory::Source).string().not_null()) // "buy", "sell", "refresh"
                .col(ColumnDef::new(PriceHistory::Timestamp).timestamp_with_time_zone().not_null())
                .to_owned()
        ).await?;

        manager.create_index(
            Index::create()
                .if_not_exists()
                .name("idx_price_history_holding_ts")
                .table(PriceHistory::Table)
                .col(PriceHistory::HoldingId)
                .col(PriceHistory::Timestamp)
                .to_owned()
        ).await?;

        manager.create_index(
            Index::create()
                .if_not_exists()
                .name("idx_price_history_portfolio_coin")
                .table(PriceHistory::Table)
                .col(PriceHistory::PortfolioId)
                .col(PriceHistory::CoinId)
                .to_owned()
        ).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(PriceHistory::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum PriceHistory {
    Table,
    Id,
    HoldingId,
    PortfolioId,
    CoinId,
    Price,
    Source,
    Timestamp,
}
