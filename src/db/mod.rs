use async_trait::async_trait;
use chrono::{ DateTime, Utc };
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::enums::TimeWindow;
use crate::error::Result;
use crate::models::{ AlertThresholdConfig, Holding, Portfolio, PriceHistoryEntry };

pub mod entity;

mod holding_repository;
pub use holding_repository::SeaOrmRepository;

mod memory;
pub use memory::InMemoryRepository;

/// Durable store for portfolios, holdings, price history and alert settings.
///
/// Cost-basis writes go through [`HoldingsRepository::upsert_holding`], which is a
/// compare-and-swap on [`Holding::version`]: a stale write fails with
/// [`crate::AppError::Conflict`] and changes nothing. The loop-owned price columns are
/// written by dedicated methods that never touch quantity or average price.
#[async_trait]
pub trait HoldingsRepository: Send + Sync {
    /// Get or create the portfolio owned by `user_id`.
    async fn open_portfolio(&self, user_id: &str) -> Result<Portfolio>;

    async fn find_portfolio(&self, portfolio_id: Uuid) -> Result<Option<Portfolio>>;

    async fn get_holding(&self, portfolio_id: Uuid, coin_id: &str) -> Result<Option<Holding>>;

    /// Insert a new holding (`version == 0`) or update quantity and average price of a
    /// stored one, provided its version is unchanged. Returns the stored holding.
    async fn upsert_holding(&self, holding: &Holding) -> Result<Holding>;

    /// Upsert the holding and append `entry` as one unit of work.
    async fn record_trade(&self, holding: &Holding, entry: &PriceHistoryEntry) -> Result<Holding> {
        let saved = self.upsert_holding(holding).await?;
        self.append_history(entry).await?;
        Ok(saved)
    }

    async fn list_holdings(&self, portfolio_id: Uuid) -> Result<Vec<Holding>>;

    async fn list_all_holdings(&self) -> Result<Vec<Holding>>;

    /// Delete every holding in the portfolio. Price history is kept.
    async fn delete_all_holdings(&self, portfolio_id: Uuid) -> Result<u64>;

    /// Store the latest market price and append a refresh history entry.
    /// Returns `false` when the holding no longer exists.
    async fn record_market_price(
        &self,
        holding: &Holding,
        price: Decimal,
        at: DateTime<Utc>
    ) -> Result<bool>;

    /// Store the alert loop's new baseline. Returns `false` when the holding no longer exists.
    async fn set_checked_price(&self, holding_id: Uuid, price: Decimal) -> Result<bool>;

    async fn append_history(&self, entry: &PriceHistoryEntry) -> Result<()>;

    /// History for a coin in a portfolio, oldest first. Survives holding deletion.
    async fn list_history(&self, portfolio_id: Uuid, coin_id: &str) -> Result<Vec<PriceHistoryEntry>>;

    async fn get_alert_config(&self, user_id: &str) -> Result<AlertThresholdConfig>;

    /// Set (`Some`) or clear (`None`) one window's threshold.
    async fn set_alert_config(
        &self,
        user_id: &str,
        window: TimeWindow,
        value: Option<Decimal>
    ) -> Result<()>;
}
