use std::sync::Arc;

use chrono::{ DateTime, Utc };
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::db::HoldingsRepository;
use crate::enums::HistorySource;
use crate::error::{ AppError, Result };
use crate::models::{ Holding, Portfolio, PriceHistoryEntry };
use crate::services::cost_basis::{ self, normalize_coin_id };
use crate::services::price_service::PriceSource;

/// Attempts at a compare-and-swap holding write before giving up.
pub const MAX_WRITE_ATTEMPTS: usize = 5;

/// Result of a buy or sell: the stored holding and the price the trade was booked at.
#[derive(Debug, Clone, Serialize)]
pub struct Trade {
    pub holding: Holding,
    pub quantity: Decimal,
    pub price: Decimal,
}

/// Buy, sell and clear operations against a portfolio.
#[derive(Clone)]
pub struct PortfolioService {
    repo: Arc<dyn HoldingsRepository>,
    prices: Arc<dyn PriceSource>,
}

impl PortfolioService {
    pub fn new(repo: Arc<dyn HoldingsRepository>, prices: Arc<dyn PriceSource>) -> Self {
        Self { repo, prices }
    }

    /// Get or create the user's portfolio.
    pub async fn open(&self, user_id: &str) -> Result<Portfolio> {
        self.repo.open_portfolio(user_id).await
    }

    /// Add `quantity` of `coin_id`, at `unit_price` if given or at the current market price.
    pub async fn buy(
        &self,
        portfolio_id: Uuid,
        coin_id: &str,
        quantity: Decimal,
        unit_price: Option<Decimal>
    ) -> Result<Trade> {
        let coin_id = normalize_coin_id(coin_id)?;
        if quantity <= Decimal::ZERO {
            return Err(AppError::InvalidAmount(format!("quantity must be positive, got {}", quantity)));
        }

        let price = match unit_price {
            Some(price) => {
                if !self.prices.coin_exists(&coin_id).await? {
                    return Err(AppError::CoinNotFound(coin_id));
                }
                price
            }
            None => self.prices.current_price(&coin_id).await?,
        };

        let holding = self.commit_with_retry(portfolio_id, &coin_id, |existing, now| {
            let next = cost_basis::apply_buy(existing, portfolio_id, &coin_id, quantity, price, now)?;
            let entry = PriceHistoryEntry::for_holding(&next, price, HistorySource::Buy, now);
            Ok((next, entry))
        }).await?;

        tracing::info!(
            "Bought {} {} at {} for portfolio {} (avg {}, qty {})",
            quantity,
            coin_id,
            price,
            portfolio_id,
            holding.average_price,
            holding.quantity
        );

        Ok(Trade { holding, quantity, price })
    }

    /// Remove `quantity` of `coin_id`. The average price of the remainder is unchanged.
    pub async fn sell(&self, portfolio_id: Uuid, coin_id: &str, quantity: Decimal) -> Result<Trade> {
        let coin_id = normalize_coin_id(coin_id)?;

        let holding = self.commit_with_retry(portfolio_id, &coin_id, |existing, now| {
            let next = cost_basis::apply_sell(existing, &coin_id, quantity, now)?;
            let entry = PriceHistoryEntry::for_holding(&next, sell_price(&next), HistorySource::Sell, now);
            Ok((next, entry))
        }).await?;
        let booked_price = sell_price(&holding);

        tracing::info!(
            "Sold {} {} from portfolio {} (remaining {})",
            quantity,
            coin_id,
            portfolio_id,
            holding.quantity
        );

        Ok(Trade { holding, quantity, price: booked_price })
    }

    /// Delete every holding in the portfolio. Returns how many were removed.
    pub async fn clear(&self, portfolio_id: Uuid) -> Result<u64> {
        let removed = self.repo.delete_all_holdings(portfolio_id).await?;
        tracing::info!("Cleared {} holdings from portfolio {}", removed, portfolio_id);
        Ok(removed)
    }

    pub async fn holdings(&self, portfolio_id: Uuid) -> Result<Vec<Holding>> {
        self.repo.list_holdings(portfolio_id).await
    }

    pub async fn history(&self, portfolio_id: Uuid, coin_id: &str) -> Result<Vec<PriceHistoryEntry>> {
        let coin_id = normalize_coin_id(coin_id)?;
        self.repo.list_history(portfolio_id, &coin_id).await
    }

    /// Read the holding, compute its next state and write it back, re-reading on
    /// a version conflict. Validation errors from `step` are returned immediately.
    async fn commit_with_retry<F>(&self, portfolio_id: Uuid, coin_id: &str, step: F) -> Result<Holding>
        where F: Fn(Option<&Holding>, DateTime<Utc>) -> Result<(Holding, PriceHistoryEntry)> + Send + Sync
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let existing = self.repo.get_holding(portfolio_id, coin_id).await?;
            let (next, entry) = step(existing.as_ref(), Utc::now())?;

            match self.repo.record_trade(&next, &entry).await {
                Ok(saved) => {
                    return Ok(saved);
                }
                Err(AppError::Conflict(reason)) => {
                    tracing::debug!(
                        "Write conflict on {} in portfolio {} (attempt {}/{}): {}",
                        coin_id,
                        portfolio_id,
                        attempt,
                        MAX_WRITE_ATTEMPTS,
                        reason
                    );
                }
                Err(e) => {
                    return Err(e);
                }
            }
        }

        tracing::warn!("Giving up on {} in portfolio {} after {} conflicts", coin_id, portfolio_id, MAX_WRITE_ATTEMPTS);
        Err(AppError::Conflict(format!("{} kept changing concurrently, try again", coin_id)))
    }
}

/// Sells are booked at the last refreshed price, or at cost if none was observed yet.
fn sell_price(holding: &Holding) -> Decimal {
    holding.current_price.unwrap_or(holding.average_price)
}
