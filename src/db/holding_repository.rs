use async_trait::async_trait;
use chrono::{ DateTime, Utc };
use rust_decimal::Decimal;
use sea_orm::sea_query::{ Expr, OnConflict };
use sea_orm::{
    ActiveModelTrait,
    ColumnTrait,
    ConnectionTrait,
    DatabaseConnection,
    DbErr,
    EntityTrait,
    QueryFilter,
    QueryOrder,
    Set,
    SqlErr,
    TransactionTrait,
};
use uuid::Uuid;

use super::HoldingsRepository;
use crate::db::entity::{ alert_threshold, holding, portfolio, price_history };
use crate::enums::{ HistorySource, TimeWindow };
use crate::error::{ AppError, Result };
use crate::models::{ AlertThresholdConfig, Holding, Portfolio, PriceHistoryEntry };

/// Postgres-backed repository.
#[derive(Clone)]
pub struct SeaOrmRepository {
    db: DatabaseConnection,
}

impl SeaOrmRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

async fn write_holding<C: ConnectionTrait>(conn: &C, h: &Holding) -> Result<Holding> {
    let now = Utc::now();

    if !h.is_persisted() {
        let model = holding::ActiveModel {
            id: Set(h.id),
            portfolio_id: Set(h.portfolio_id),
            coin_id: Set(h.coin_id.clone()),
            quantity: Set(h.quantity),
            average_price: Set(h.average_price),
            current_price: Set(h.current_price),
            last_checked_price: Set(h.last_checked_price),
            version: Set(1),
            created_at: Set(h.created_at),
            updated_at: Set(now),
        };

        return match model.insert(conn).await {
            Ok(m) => Ok(m.into()),
            Err(e) if is_unique_violation(&e) => {
                Err(AppError::Conflict(format!("holding {} was created concurrently", h.coin_id)))
            }
            Err(e) => Err(AppError::Database(e)),
        };
    }

    // Only cost-basis columns are written; the loop-owned price columns are left alone.
    let res = holding::Entity
        ::update_many()
        .col_expr(holding::Column::Quantity, Expr::value(h.quantity))
        .col_expr(holding::Column::AveragePrice, Expr::value(h.average_price))
        .col_expr(holding::Column::Version, Expr::value(h.version + 1))
        .col_expr(holding::Column::UpdatedAt, Expr::value(now))
        .filter(holding::Column::Id.eq(h.id))
        .filter(holding::Column::Version.eq(h.version))
        .exec(conn).await?;

    if res.rows_affected == 0 {
        return Err(
            AppError::Conflict(format!("holding {} changed since version {}", h.coin_id, h.version))
        );
    }

    let mut saved = h.clone();
    saved.version = h.version + 1;
    saved.updated_at = now;
    Ok(saved)
}

async fn insert_history<C: ConnectionTrait>(conn: &C, entry: &PriceHistoryEntry) -> Result<()> {
    let model = price_history::ActiveModel {
        id: Set(entry.id),
        holding_id: Set(entry.holding_id),
        portfolio_id: Set(entry.portfolio_id),
        coin_id: Set(entry.coin_id.clone()),
        price: Set(entry.price),
        source: Set(entry.source.to_string()),
        timestamp: Set(entry.timestamp),
    };
    price_history::Entity::insert(model).exec(conn).await?;
    Ok(())
}

#[async_trait]
impl HoldingsRepository for SeaOrmRepository {
    async fn open_portfolio(&self, user_id: &str) -> Result<Portfolio> {
        let existing = portfolio::Entity
            ::find()
            .filter(portfolio::Column::UserId.eq(user_id))
            .one(&self.db).await?;
        if let Some(p) = existing {
            return Ok(p.into());
        }

        let model = portfolio::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id.to_string()),
            created_at: Set(Utc::now()),
        };

        match model.insert(&self.db).await {
            Ok(p) => {
                tracing::info!("Created portfolio {} for user {}", p.id, user_id);
                Ok(p.into())
            }
            // Lost the race against a concurrent first interaction
            Err(e) if is_unique_violation(&e) => {
                portfolio::Entity
                    ::find()
                    .filter(portfolio::Column::UserId.eq(user_id))
                    .one(&self.db).await?
                    .map(Into::into)
                    .ok_or_else(|| AppError::Repository(format!("portfolio for {} vanished", user_id)))
            }
            Err(e) => Err(AppError::Database(e)),
        }
    }

    async fn find_portfolio(&self, portfolio_id: Uuid) -> Result<Option<Portfolio>> {
        let p = portfolio::Entity::find_by_id(portfolio_id).one(&self.db).await?;
        Ok(p.map(Into::into))
    }

    async fn get_holding(&self, portfolio_id: Uuid, coin_id: &str) -> Result<Option<Holding>> {
        let h = holding::Entity
            ::find()
            .filter(holding::Column::PortfolioId.eq(portfolio_id))
            .filter(holding::Column::CoinId.eq(coin_id))
            .one(&self.db).await?;
        Ok(h.map(Into::into))
    }

    async fn upsert_holding(&self, holding: &Holding) -> Result<Holding> {
        write_holding(&self.db, holding).await
    }

    async fn record_trade(&self, holding: &Holding, entry: &PriceHistoryEntry) -> Result<Holding> {
        let txn = self.db.begin().await?;
        let saved = write_holding(&txn, holding).await?;
        insert_history(&txn, entry).await?;
        txn.commit().await?;
        Ok(saved)
    }

    async fn list_holdings(&self, portfolio_id: Uuid) -> Result<Vec<Holding>> {
        let rows = holding::Entity
            ::find()
            .filter(holding::Column::PortfolioId.eq(portfolio_id))
            .order_by_asc(holding::Column::CreatedAt)
            .all(&self.db).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_all_holdings(&self) -> Result<Vec<Holding>> {
        let rows = holding::Entity
            ::find()
            .order_by_asc(holding::Column::PortfolioId)
            .order_by_asc(holding::Column::CreatedAt)
            .all(&self.db).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete_all_holdings(&self, portfolio_id: Uuid) -> Result<u64> {
        let res = holding::Entity
            ::delete_many()
            .filter(holding::Column::PortfolioId.eq(portfolio_id))
            .exec(&self.db).await?;
        Ok(res.rows_affected)
    }

    async fn record_market_price(
        &self,
        holding: &Holding,
        price: Decimal,
        at: DateTime<Utc>
    ) -> Result<bool> {
        let txn = self.db.begin().await?;

        let res = holding::Entity
            ::update_many()
            .col_expr(holding::Column::CurrentPrice, Expr::value(Some(price)))
            .filter(holding::Column::Id.eq(holding.id))
            .exec(&txn).await?;

        if res.rows_affected == 0 {
            // Cleared between listing and pricing; dropping txn rolls back.
            return Ok(false);
        }

        let entry = PriceHistoryEntry::for_holding(holding, price, HistorySource::Refresh, at);
        insert_history(&txn, &entry).await?;
        txn.commit().await?;
        Ok(true)
    }

    async fn set_checked_price(&self, holding_id: Uuid, price: Decimal) -> Result<bool> {
        let res = holding::Entity
            ::update_many()
            .col_expr(holding::Column::LastCheckedPrice, Expr::value(Some(price)))
            .filter(holding::Column::Id.eq(holding_id))
            .exec(&self.db).await?;
        Ok(res.rows_affected > 0)
    }

    async fn append_history(&self, entry: &PriceHistoryEntry) -> Result<()> {
        insert_history(&self.db, entry).await
    }

    async fn list_history(&self, portfolio_id: Uuid, coin_id: &str) -> Result<Vec<PriceHistoryEntry>> {
        let rows = price_history::Entity
            ::find()
            .filter(price_history::Column::PortfolioId.eq(portfolio_id))
            .filter(price_history::Column::CoinId.eq(coin_id))
            .order_by_asc(price_history::Column::Timestamp)
            .all(&self.db).await?;

        rows.into_iter().map(PriceHistoryEntry::try_from).collect()
    }

    async fn get_alert_config(&self, user_id: &str) -> Result<AlertThresholdConfig> {
        let rows = alert_threshold::Entity
            ::find()
            .filter(alert_threshold::Column::UserId.eq(user_id))
            .all(&self.db).await?;

        let mut config = AlertThresholdConfig::new();
        for row in rows {
            match row.time_window.parse::<TimeWindow>() {
                Ok(window) => config.set(window, Some(row.percent)),
                Err(_) => {
                    tracing::warn!("Ignoring unknown threshold window {:?} for user {}", row.time_window, user_id);
                }
            }
        }
        Ok(config)
    }

    async fn set_alert_config(
        &self,
        user_id: &str,
        window: TimeWindow,
        value: Option<Decimal>
    ) -> Result<()> {
        let Some(percent) = value.filter(|v| !v.is_zero()) else {
            alert_threshold::Entity
                ::delete_many()
                .filter(alert_threshold::Column::UserId.eq(user_id))
                .filter(alert_threshold::Column::TimeWindow.eq(window.as_str()))
                .exec(&self.db).await?;
            return Ok(());
        };

        let model = alert_threshold::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id.to_string()),
            time_window: Set(window.as_str().to_string()),
            percent: Set(percent),
            updated_at: Set(Utc::now()),
        };

        alert_threshold::Entity
            ::insert(model)
            .on_conflict(
                OnConflict::columns([
                    alert_threshold::Column::UserId,
                    alert_threshold::Column::TimeWindow,
                ])
                    .update_columns([
                        alert_threshold::Column::Percent,
                        alert_threshold::Column::UpdatedAt,
                    ])
                    .to_owned()
            )
            .exec(&self.db).await?;

        Ok(())
    }
}
