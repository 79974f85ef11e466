use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;

use crate::db::HoldingsRepository;
use crate::error::Result;
use crate::services::PriceSource;

/// Outcome of one refresh pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshStats {
    pub holdings: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
}

/// Periodically writes the market price of every held coin.
pub struct PriceRefresher {
    repo: Arc<dyn HoldingsRepository>,
    prices: Arc<dyn PriceSource>,
    interval: Duration,
}

impl PriceRefresher {
    pub fn new(repo: Arc<dyn HoldingsRepository>, prices: Arc<dyn PriceSource>, interval: Duration) -> Self {
        Self { repo, prices, interval }
    }

    /// Refresh, then sleep for the interval, until cancelled.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!("Price refresher started (every {:?}, source {})", self.interval, self.prices.name());

        loop {
            match self.run_cycle().await {
                Ok(stats) => tracing::debug!("Price refresh done: {:?}", stats),
                Err(e) => tracing::error!("Price refresh failed: {}", e),
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Price refresher stopped");
                    return;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }

    pub async fn run_cycle(&self) -> Result<RefreshStats> {
        let holdings = self.repo.list_all_holdings().await?;
        let mut stats = RefreshStats {
            holdings: holdings.len(),
            ..Default::default()
        };

        // One lookup per coin per pass; a failed lookup is remembered as None
        let mut fetched: HashMap<String, Option<Decimal>> = HashMap::new();

        for holding in &holdings {
            let price = match fetched.get(&holding.coin_id) {
                Some(price) => *price,
                None => {
                    let price = match self.prices.current_price(&holding.coin_id).await {
                        Ok(price) => Some(price),
                        Err(e) => {
                            tracing::warn!("Cannot refresh price for {}: {}", holding.coin_id, e);
                            None
                        }
                    };
                    fetched.insert(holding.coin_id.clone(), price);
                    price
                }
            };

            let Some(price) = price else {
                stats.failed += 1;
                continue;
            };

            if holding.current_price == Some(price) {
                stats.unchanged += 1;
                continue;
            }

            match self.repo.record_market_price(holding, price, Utc::now()).await {
                Ok(true) => {
                    stats.updated += 1;
                }
                Ok(false) => {
                    tracing::debug!("Holding {} was removed during refresh", holding.id);
                }
                Err(e) => {
                    tracing::warn!("Failed to store price for holding {}: {}", holding.id, e);
                    stats.failed += 1;
                }
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryRepository;
    use crate::enums::HistorySource;
    use crate::models::Holding;
    use crate::testing::{ FlakyRepository, StaticPriceSource };
    use rust_decimal_macros::dec;

    async fn setup(
        prices: StaticPriceSource
    ) -> (PriceRefresher, Arc<InMemoryRepository>, Arc<StaticPriceSource>, uuid::Uuid) {
        let repo = Arc::new(InMemoryRepository::new());
        let prices = Arc::new(prices);
        let portfolio = repo.open_portfolio("1").await.unwrap();
        let refresher = PriceRefresher::new(repo.clone(), prices.clone(), Duration::from_secs(20));
        (refresher, repo, prices, portfolio.id)
    }

    #[tokio::test]
    async fn test_cycle_writes_price_and_history() {
        let (refresher, repo, _, pid) = setup(StaticPriceSource::new().with_price("bitcoin", dec!(120))).await;
        repo.upsert_holding(&Holding::new(pid, "bitcoin", dec!(2), dec!(100), Utc::now())).await.unwrap();

        let stats = refresher.run_cycle().await.unwrap();
        assert_eq!(stats.updated, 1);

        let h = repo.get_holding(pid, "bitcoin").await.unwrap().unwrap();
        assert_eq!(h.current_price, Some(dec!(120)));
        assert_eq!(h.quantity, dec!(2));
        assert_eq!(h.average_price, dec!(100));

        let history = repo.list_history(pid, "bitcoin").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].source, HistorySource::Refresh);
        assert_eq!(history[0].price, dec!(120));
    }

    #[tokio::test]
    async fn test_unchanged_price_adds_no_history() {
        let (refresher, repo, _, pid) = setup(StaticPriceSource::new().with_price("bitcoin", dec!(120))).await;
        repo.upsert_holding(&Holding::new(pid, "bitcoin", dec!(1), dec!(100), Utc::now())).await.unwrap();

        refresher.run_cycle().await.unwrap();
        let stats = refresher.run_cycle().await.unwrap();

        assert_eq!(stats.unchanged, 1);
        assert_eq!(repo.list_history(pid, "bitcoin").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_one_coin_failing_does_not_stop_the_pass() {
        let prices = StaticPriceSource::new().with_price("bitcoin", dec!(1)).with_price("ethereum", dec!(2));
        prices.fail("bitcoin");
        let (refresher, repo, _, pid) = setup(prices).await;
        repo.upsert_holding(&Holding::new(pid, "bitcoin", dec!(1), dec!(1), Utc::now())).await.unwrap();
        repo.upsert_holding(&Holding::new(pid, "ethereum", dec!(1), dec!(1), Utc::now())).await.unwrap();

        let stats = refresher.run_cycle().await.unwrap();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.updated, 1);
        let eth = repo.get_holding(pid, "ethereum").await.unwrap().unwrap();
        assert_eq!(eth.current_price, Some(dec!(2)));
    }

    #[tokio::test]
    async fn test_each_coin_is_fetched_once_per_pass() {
        let (refresher, repo, prices, pid) = setup(StaticPriceSource::new().with_price("bitcoin", dec!(5))).await;
        let other = repo.open_portfolio("2").await.unwrap();
        repo.upsert_holding(&Holding::new(pid, "bitcoin", dec!(1), dec!(1), Utc::now())).await.unwrap();
        repo.upsert_holding(&Holding::new(other.id, "bitcoin", dec!(3), dec!(2), Utc::now())).await.unwrap();

        let stats = refresher.run_cycle().await.unwrap();
        assert_eq!(stats.updated, 2);
        assert_eq!(prices.calls_for("bitcoin"), 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let (refresher, _, _, _) = setup(StaticPriceSource::new()).await;
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(refresher.run(cancel.clone()));

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_run_keeps_going_after_a_failed_pass() {
        let inner = Arc::new(InMemoryRepository::new());
        let portfolio = inner.open_portfolio("1").await.unwrap();
        inner.upsert_holding(&Holding::new(portfolio.id, "bitcoin", dec!(1), dec!(100), Utc::now())).await.unwrap();
        let repo = Arc::new(FlakyRepository::new(inner.clone(), 1));
        let prices = Arc::new(StaticPriceSource::new().with_price("bitcoin", dec!(150)));

        let refresher = PriceRefresher::new(repo.clone(), prices, Duration::from_millis(10));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(refresher.run(cancel.clone()));

        let refreshed = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let h = inner.get_holding(portfolio.id, "bitcoin").await.unwrap().unwrap();
                if h.current_price == Some(dec!(150)) {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }).await;
        cancel.cancel();
        handle.await.unwrap();

        assert!(refreshed.is_ok(), "price was never refreshed after the failed pass");
        assert!(repo.scans() >= 2);
    }
}
