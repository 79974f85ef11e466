//! Test doubles for the repository, price source and notification sink.

use std::collections::HashMap;
use std::sync::atomic::{ AtomicUsize, Ordering };
use std::sync::{ Arc, Mutex };

use async_trait::async_trait;
use chrono::{ DateTime, Utc };
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::db::{ HoldingsRepository, InMemoryRepository };
use crate::enums::TimeWindow;
use crate::error::{ AppError, Result };
use crate::models::{ AlertThresholdConfig, Holding, Portfolio, PriceAlert, PriceHistoryEntry };
use crate::notifier::NotificationSink;
use crate::services::PriceSource;

#[derive(Default)]
pub struct StaticPriceSource {
    prices: Mutex<HashMap<String, Decimal>>,
    failing: Mutex<Vec<String>>,
    calls: Mutex<Vec<String>>,
}

impl StaticPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(self, coin_id: &str, price: Decimal) -> Self {
        self.set_price(coin_id, price);
        self
    }

    pub fn set_price(&self, coin_id: &str, price: Decimal) {
        self.prices.lock().unwrap().insert(coin_id.to_string(), price);
    }

    /// Make lookups for `coin_id` fail with `PriceUnavailable`.
    pub fn fail(&self, coin_id: &str) {
        self.failing.lock().unwrap().push(coin_id.to_string());
    }

    pub fn calls_for(&self, coin_id: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == coin_id)
            .count()
    }
}

#[async_trait]
impl PriceSource for StaticPriceSource {
    async fn current_price(&self, coin_id: &str) -> Result<Decimal> {
        self.calls.lock().unwrap().push(coin_id.to_string());
        if self.failing.lock().unwrap().iter().any(|c| c == coin_id) {
            return Err(AppError::PriceUnavailable(format!("{} lookup timed out", coin_id)));
        }
        self.prices
            .lock()
            .unwrap()
            .get(coin_id)
            .copied()
            .ok_or_else(|| AppError::CoinNotFound(coin_id.to_string()))
    }

    async fn coin_exists(&self, coin_id: &str) -> Result<bool> {
        Ok(self.prices.lock().unwrap().contains_key(coin_id))
    }

    fn name(&self) -> &str {
        "static"
    }
}

#[derive(Default)]
pub struct RecordingSink {
    alerts: Mutex<Vec<PriceAlert>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<PriceAlert> {
        self.alerts.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, alert: &PriceAlert) -> Result<()> {
        self.alerts.lock().unwrap().push(alert.clone());
        Ok(())
    }
}

/// Repository whose first `list_all_holdings` calls fail, as during a database outage.
pub struct FlakyRepository {
    inner: Arc<InMemoryRepository>,
    scan_failures_left: AtomicUsize,
    scans: AtomicUsize,
}

impl FlakyRepository {
    pub fn new(inner: Arc<InMemoryRepository>, scan_failures: usize) -> Self {
        Self {
            inner,
            scan_failures_left: AtomicUsize::new(scan_failures),
            scans: AtomicUsize::new(0),
        }
    }

    pub fn scans(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HoldingsRepository for FlakyRepository {
    async fn open_portfolio(&self, user_id: &str) -> Result<Portfolio> {
        self.inner.open_portfolio(user_id).await
    }
    async fn find_portfolio(&self, id: Uuid) -> Result<Option<Portfolio>> {
        self.inner.find_portfolio(id).await
    }
    async fn get_holding(&self, portfolio_id: Uuid, coin_id: &str) -> Result<Option<Holding>> {
        self.inner.get_holding(portfolio_id, coin_id).await
    }
    async fn upsert_holding(&self, holding: &Holding) -> Result<Holding> {
        self.inner.upsert_holding(holding).await
    }
    async fn record_trade(&self, holding: &Holding, entry: &PriceHistoryEntry) -> Result<Holding> {
        self.inner.record_trade(holding, entry).await
    }
    async fn list_holdings(&self, portfolio_id: Uuid) -> Result<Vec<Holding>> {
        self.inner.list_holdings(portfolio_id).await
    }
    async fn list_all_holdings(&self) -> Result<Vec<Holding>> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        let failing = self.scan_failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(AppError::Internal("connection reset".to_string()));
        }
        self.inner.list_all_holdings().await
    }
    async fn delete_all_holdings(&self, portfolio_id: Uuid) -> Result<u64> {
        self.inner.delete_all_holdings(portfolio_id).await
    }
    async fn record_market_price(&self, h: &Holding, price: Decimal, at: DateTime<Utc>) -> Result<bool> {
        self.inner.record_market_price(h, price, at).await
    }
    async fn set_checked_price(&self, id: Uuid, price: Decimal) -> Result<bool> {
        self.inner.set_checked_price(id, price).await
    }
    async fn append_history(&self, entry: &PriceHistoryEntry) -> Result<()> {
        self.inner.append_history(entry).await
    }
    async fn list_history(&self, portfolio_id: Uuid, coin_id: &str) -> Result<Vec<PriceHistoryEntry>> {
        self.inner.list_history(portfolio_id, coin_id).await
    }
    async fn get_alert_config(&self, user_id: &str) -> Result<AlertThresholdConfig> {
        self.inner.get_alert_config(user_id).await
    }
    async fn set_alert_config(&self, user_id: &str, w: TimeWindow, v: Option<Decimal>) -> Result<()> {
        self.inner.set_alert_config(user_id, w, v).await
    }
}
