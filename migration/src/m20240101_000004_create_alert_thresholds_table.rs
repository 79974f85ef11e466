use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.create_table(
            Table::create()
                .table(AlertThresholds::Table)
                .if_not_exists()
                .col(ColumnDef::new(AlertThresholds::Id).uuid().not_null().primary_key())
                .col(ColumnDef::new(AlertThresholds::UserId).string().not_null())
                .col(ColumnDef::new(AlertThresholds::TimeWindow).string().not_null()) // "1m", "5m", "15m", "30m", "1h"
                .col(ColumnDef::new(AlertThresholds::Percent).decimal().not_null())
                .col(ColumnDef::new(AlertThresholds::UpdatedAt).timestamp_with_time_zone().not_null())
                .to_owned()
        ).await?;

        manager.create_index(
            Index::create()
                .if_not_exists()
                .name("idx_alert_thresholds_user_window")
                .table(AlertThresholds::Table)
                .col(AlertThresholds::UserId)
                .col(AlertThresholds::TimeWindow)
                .unique()
                .to_owned()
        ).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(AlertThresholds::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum AlertThresholds {
    Table,
    Id,
    UserId,
    TimeWindow,
    Percent,
    UpdatedAt,
}
