//! In-memory repository, used by tests and local runs without a database.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{ DateTime, Utc };
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::HoldingsRepository;
use crate::enums::{ HistorySource, TimeWindow };
use crate::error::{ AppError, Result };
use crate::models::{ AlertThresholdConfig, Holding, Portfolio, PriceHistoryEntry };

#[derive(Default)]
struct State {
    portfolios: HashMap<String, Portfolio>,
    holdings: HashMap<Uuid, Holding>,
    history: Vec<PriceHistoryEntry>,
    thresholds: HashMap<String, AlertThresholdConfig>,
}

impl State {
    fn write_holding(&mut self, h: &Holding) -> Result<Holding> {
        let now = Utc::now();

        if !h.is_persisted() {
            let duplicate = self.holdings
                .values()
                .any(|x| x.portfolio_id == h.portfolio_id && x.coin_id == h.coin_id);
            if duplicate {
                return Err(
                    AppError::Conflict(format!("holding {} was created concurrently", h.coin_id))
                );
            }
            let mut saved = h.clone();
            saved.version = 1;
            saved.updated_at = now;
            self.holdings.insert(saved.id, saved.clone());
            return Ok(saved);
        }

        let stored = self.holdings
            .get_mut(&h.id)
            .filter(|s| s.version == h.version)
            .ok_or_else(|| {
                AppError::Conflict(format!("holding {} changed since version {}", h.coin_id, h.version))
            })?;

        stored.quantity = h.quantity;
        stored.average_price = h.average_price;
        stored.version = h.version + 1;
        stored.updated_at = now;
        Ok(stored.clone())
    }
}

/// Every operation takes a single lock, so each call is atomic.
#[derive(Default)]
pub struct InMemoryRepository {
    state: Mutex<State>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HoldingsRepository for InMemoryRepository {
    async fn open_portfolio(&self, user_id: &str) -> Result<Portfolio> {
        let mut state = self.state.lock().await;
        let portfolio = state.portfolios
            .entry(user_id.to_string())
            .or_insert_with(|| Portfolio {
                id: Uuid::new_v4(),
                user_id: user_id.to_string(),
                created_at: Utc::now(),
            });
        Ok(portfolio.clone())
    }

    async fn find_portfolio(&self, portfolio_id: Uuid) -> Result<Option<Portfolio>> {
        let state = self.state.lock().await;
        Ok(
            state.portfolios
                .values()
                .find(|p| p.id == portfolio_id)
                .cloned()
        )
    }

    async fn get_holding(&self, portfolio_id: Uuid, coin_id: &str) -> Result<Option<Holding>> {
        let state = self.state.lock().await;
        Ok(
            state.holdings
                .values()
                .find(|h| h.portfolio_id == portfolio_id && h.coin_id == coin_id)
                .cloned()
        )
    }

    async fn upsert_holding(&self, holding: &Holding) -> Result<Holding> {
        self.state.lock().await.write_holding(holding)
    }

    async fn record_trade(&self, holding: &Holding, entry: &PriceHistoryEntry) -> Result<Holding> {
        let mut state = self.state.lock().await;
        let saved = state.write_holding(holding)?;
        state.history.push(entry.clone());
        Ok(saved)
    }

    async fn list_holdings(&self, portfolio_id: Uuid) -> Result<Vec<Holding>> {
        let state = self.state.lock().await;
        let mut holdings: Vec<Holding> = state.holdings
            .values()
            .filter(|h| h.portfolio_id == portfolio_id)
            .cloned()
            .collect();
        holdings.sort_by_key(|h| h.created_at);
        Ok(holdings)
    }

    async fn list_all_holdings(&self) -> Result<Vec<Holding>> {
        let state = self.state.lock().await;
        let mut holdings: Vec<Holding> = state.holdings.values().cloned().collect();
        holdings.sort_by_key(|h| (h.portfolio_id, h.created_at));
        Ok(holdings)
    }

    async fn delete_all_holdings(&self, portfolio_id: Uuid) -> Result<u64> {
        let mut state = self.state.lock().await;
        let before = state.holdings.len();
        state.holdings.retain(|_, h| h.portfolio_id != portfolio_id);
        Ok((before - state.holdings.len()) as u64)
    }

    async fn record_market_price(
        &self,
        holding: &Holding,
        price: Decimal,
        at: DateTime<Utc>
    ) -> Result<bool> {
        let mut state = self.state.lock().await;
        let Some(stored) = state.holdings.get_mut(&holding.id) else {
            return Ok(false);
        };
        stored.current_price = Some(price);
        state.history.push(
            PriceHistoryEntry::for_holding(holding, price, HistorySource::Refresh, at)
        );
        Ok(true)
    }

    async fn set_checked_price(&self, holding_id: Uuid, price: Decimal) -> Result<bool> {
        let mut state = self.state.lock().await;
        match state.holdings.get_mut(&holding_id) {
            Some(stored) => {
                stored.last_checked_price = Some(price);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn append_history(&self, entry: &PriceHistoryEntry) -> Result<()> {
        self.state.lock().await.history.push(entry.clone());
        Ok(())
    }

    async fn list_history(&self, portfolio_id: Uuid, coin_id: &str) -> Result<Vec<PriceHistoryEntry>> {
        let state = self.state.lock().await;
        let mut entries: Vec<PriceHistoryEntry> = state.history
            .iter()
            .filter(|e| e.portfolio_id == portfolio_id && e.coin_id == coin_id)
            .cloned()
            .collect();
        // Stable sort keeps append order for equal timestamps
        entries.sort_by_key(|e| e.timestamp);
        Ok(entries)
    }

    async fn get_alert_config(&self, user_id: &str) -> Result<AlertThresholdConfig> {
        let state = self.state.lock().await;
        Ok(state.thresholds.get(user_id).cloned().unwrap_or_default())
    }

    async fn set_alert_config(
        &self,
        user_id: &str,
        window: TimeWindow,
        value: Option<Decimal>
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        state.thresholds.entry(user_id.to_string()).or_default().set(window, value);
        Ok(())
    }
}
