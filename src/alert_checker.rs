use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::db::HoldingsRepository;
use crate::enums::AlertDirection;
use crate::error::{ AppError, Result };
use crate::models::{ AlertThresholdConfig, Holding, PriceAlert };
use crate::notifier::NotificationSink;
use crate::services::PriceSource;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertStats {
    pub checked: usize,
    pub baselined: usize,
    pub unchanged: usize,
    pub fired: usize,
    pub failed: usize,
}

/// Compares each holding's price with its last checked price and notifies the
/// owner when the move reaches one of their window thresholds.
pub struct AlertChecker {
    repo: Arc<dyn HoldingsRepository>,
    prices: Arc<dyn PriceSource>,
    sink: Arc<dyn NotificationSink>,
    interval: Duration,
    direction: AlertDirection,
}

/// `(new - old) / old * 100`
pub fn percent_change(old: Decimal, new: Decimal) -> Result<Decimal> {
    (new - old)
        .checked_div(old)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .ok_or_else(|| AppError::Internal(format!("cannot compute change from {} to {}", old, new)))
}

impl AlertChecker {
    pub fn new(
        repo: Arc<dyn HoldingsRepository>,
        prices: Arc<dyn PriceSource>,
        sink: Arc<dyn NotificationSink>,
        interval: Duration,
        direction: AlertDirection
    ) -> Self {
        Self {
            repo,
            prices,
            sink,
            interval,
            direction,
        }
    }

    /// Check, then sleep for the interval, until cancelled.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!("Alert checker started (every {:?}, direction {})", self.interval, self.direction);

        loop {
            match self.run_cycle().await {
                Ok(stats) => tracing::debug!("Alert check done: {:?}", stats),
                Err(e) => tracing::error!("Alert check failed: {}", e),
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Alert checker stopped");
                    return;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }

    pub async fn run_cycle(&self) -> Result<AlertStats> {
        let holdings = self.repo.list_all_holdings().await?;
        let mut stats = AlertStats::default();

        let mut fetched: HashMap<String, Option<Decimal>> = HashMap::new();
        let mut owners: HashMap<Uuid, Option<String>> = HashMap::new();
        let mut configs: HashMap<String, AlertThresholdConfig> = HashMap::new();

        for holding in &holdings {
            // Fully sold positions stay in place but are not watched
            if holding.is_empty() {
                continue;
            }
            stats.checked += 1;

            let price = match fetched.get(&holding.coin_id) {
                Some(price) => *price,
                None => {
                    let price = match self.prices.current_price(&holding.coin_id).await {
                        Ok(price) => Some(price),
                        Err(e) => {
                            tracing::warn!("Cannot check alerts for {}: {}", holding.coin_id, e);
                            None
                        }
                    };
                    fetched.insert(holding.coin_id.clone(), price);
                    price
                }
            };
            let Some(new_price) = price else {
                stats.failed += 1;
                continue;
            };

            let old_price = match holding.last_checked_price {
                Some(old) if old == new_price => {
                    stats.unchanged += 1;
                    continue;
                }
                Some(old) if !old.is_zero() => old,
                _ => {
                    // First observation, or a zero baseline a percentage can't be taken from
                    if let Err(e) = self.repo.set_checked_price(holding.id, new_price).await {
                        tracing::warn!("Failed to store baseline for holding {}: {}", holding.id, e);
                        stats.failed += 1;
                    } else {
                        stats.baselined += 1;
                    }
                    continue;
                }
            };

            let change = match percent_change(old_price, new_price) {
                Ok(change) => change,
                Err(e) => {
                    tracing::warn!("Holding {}: {}", holding.id, e);
                    stats.failed += 1;
                    continue;
                }
            };

            match self.repo.set_checked_price(holding.id, new_price).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!("Holding {} was removed during alert check", holding.id);
                    continue;
                }
                Err(e) => {
                    tracing::warn!("Failed to store checked price for holding {}: {}", holding.id, e);
                    stats.failed += 1;
                    continue;
                }
            }

            let Some(user_id) = self.owner_of(holding, &mut owners).await else {
                continue;
            };

            if !configs.contains_key(&user_id) {
                match self.repo.get_alert_config(&user_id).await {
                    Ok(config) => {
                        configs.insert(user_id.clone(), config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load thresholds for user {}: {}", user_id, e);
                        stats.failed += 1;
                        continue;
                    }
                }
            }
            let Some(config) = configs.get(&user_id) else {
                continue;
            };

            for (window, threshold) in config.configured() {
                if !self.direction.crosses(change, threshold) {
                    continue;
                }

                let alert = PriceAlert {
                    user_id: user_id.clone(),
                    coin_id: holding.coin_id.clone(),
                    quantity: holding.quantity,
                    window,
                    new_price,
                    percentage_change: change,
                };

                tracing::info!(
                    "Alert for user {}: {} moved {}% (threshold {}% / {})",
                    user_id,
                    holding.coin_id,
                    change.round_dp(2),
                    threshold,
                    window
                );

                match self.sink.notify(&alert).await {
                    Ok(()) => {
                        stats.fired += 1;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to deliver alert to user {}: {}", user_id, e);
                        stats.failed += 1;
                    }
                }
            }
        }

        Ok(stats)
    }

    async fn owner_of(&self, holding: &Holding, owners: &mut HashMap<Uuid, Option<String>>) -> Option<String> {
        if let Some(owner) = owners.get(&holding.portfolio_id) {
            return owner.clone();
        }

        let owner = match self.repo.find_portfolio(holding.portfolio_id).await {
            Ok(portfolio) => portfolio.map(|p| p.user_id),
            Err(e) => {
                tracing::warn!("Failed to load portfolio {}: {}", holding.portfolio_id, e);
                return None;
            }
        };
        owners.insert(holding.portfolio_id, owner.clone());
        owner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::TimeWindow;
    use crate::db::InMemoryRepository;
    use crate::testing::{ FlakyRepository, RecordingSink, StaticPriceSource };
    use chrono::Utc;
    use rust_decimal_macros::dec;

    struct Harness {
        repo: Arc<InMemoryRepository>,
        prices: Arc<StaticPriceSource>,
        sink: Arc<RecordingSink>,
        portfolio_id: Uuid,
    }

    impl Harness {
        async fn new() -> Self {
            let repo = Arc::new(InMemoryRepository::new());
            let portfolio = repo.open_portfolio("100").await.unwrap();
            Self {
                repo,
                prices: Arc::new(StaticPriceSource::new()),
                sink: Arc::new(RecordingSink::new()),
                portfolio_id: portfolio.id,
            }
        }

        fn checker(&self, direction: AlertDirection) -> AlertChecker {
            AlertChecker::new(
                self.repo.clone(),
                self.prices.clone(),
                self.sink.clone(),
                Duration::from_secs(60),
                direction
            )
        }

        /// A bitcoin holding whose alert baseline is `baseline`.
        async fn holding_with_baseline(&self, baseline: Decimal) -> Holding {
            let saved = self.repo
                .upsert_holding(&Holding::new(self.portfolio_id, "bitcoin", dec!(0.5), dec!(90), Utc::now())).await
                .unwrap();
            self.repo.set_checked_price(saved.id, baseline).await.unwrap();
            saved
        }

        async fn thresholds(&self, pairs: &[(TimeWindow, Decimal)]) {
            for (window, value) in pairs {
                self.repo.set_alert_config("100", *window, Some(*value)).await.unwrap();
            }
        }
    }

    #[tokio::test]
    async fn test_six_percent_rise_fires_five_percent_threshold() {
        let h = Harness::new().await;
        h.holding_with_baseline(dec!(100)).await;
        h.thresholds(&[(TimeWindow::FiveMinutes, dec!(5))]).await;
        h.prices.set_price("bitcoin", dec!(106));

        let stats = h.checker(AlertDirection::Rising).run_cycle().await.unwrap();
        assert_eq!(stats.fired, 1);

        let alerts = h.sink.alerts();
        assert_eq!(alerts[0].window, TimeWindow::FiveMinutes);
        assert_eq!(alerts[0].percentage_change, dec!(6));
        assert_eq!(alerts[0].new_price, dec!(106));
        assert_eq!(alerts[0].quantity, dec!(0.5));
        assert_eq!(alerts[0].user_id, "100");

        let stored = h.repo.get_holding(h.portfolio_id, "bitcoin").await.unwrap().unwrap();
        assert_eq!(stored.last_checked_price, Some(dec!(106)));
    }

    #[tokio::test]
    async fn test_four_percent_rise_stays_quiet() {
        let h = Harness::new().await;
        h.holding_with_baseline(dec!(100)).await;
        h.thresholds(&[(TimeWindow::FiveMinutes, dec!(5))]).await;
        h.prices.set_price("bitcoin", dec!(104));

        h.checker(AlertDirection::Rising).run_cycle().await.unwrap();
        assert!(h.sink.alerts().is_empty());
        // The baseline still moves forward
        let stored = h.repo.get_holding(h.portfolio_id, "bitcoin").await.unwrap().unwrap();
        assert_eq!(stored.last_checked_price, Some(dec!(104)));
    }

    #[tokio::test]
    async fn test_exact_threshold_fires() {
        let h = Harness::new().await;
        h.holding_with_baseline(dec!(100)).await;
        h.thresholds(&[(TimeWindow::OneMinute, dec!(5))]).await;
        h.prices.set_price("bitcoin", dec!(105));

        h.checker(AlertDirection::Rising).run_cycle().await.unwrap();
        assert_eq!(h.sink.alerts().len(), 1);
    }

    #[tokio::test]
    async fn test_every_crossed_window_fires() {
        let h = Harness::new().await;
        h.holding_with_baseline(dec!(100)).await;
        h.thresholds(
            &[
                (TimeWindow::OneMinute, dec!(1)),
                (TimeWindow::FifteenMinutes, dec!(3)),
                (TimeWindow::OneHour, dec!(20)),
            ]
        ).await;
        h.prices.set_price("bitcoin", dec!(110));

        h.checker(AlertDirection::Rising).run_cycle().await.unwrap();
        let windows: Vec<_> = h.sink.alerts().iter().map(|a| a.window).collect();
        assert_eq!(windows, vec![TimeWindow::OneMinute, TimeWindow::FifteenMinutes]);
    }

    #[tokio::test]
    async fn test_drop_fires_only_when_both_directions_enabled() {
        let h = Harness::new().await;
        let holding = h.holding_with_baseline(dec!(100)).await;
        h.thresholds(&[(TimeWindow::FiveMinutes, dec!(5))]).await;
        h.prices.set_price("bitcoin", dec!(90));

        h.checker(AlertDirection::Rising).run_cycle().await.unwrap();
        assert!(h.sink.alerts().is_empty());

        h.repo.set_checked_price(holding.id, dec!(100)).await.unwrap();
        h.checker(AlertDirection::Both).run_cycle().await.unwrap();
        let alerts = h.sink.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].percentage_change, dec!(-10));
    }

    #[tokio::test]
    async fn test_first_observation_only_sets_baseline() {
        let h = Harness::new().await;
        h.repo
            .upsert_holding(&Holding::new(h.portfolio_id, "bitcoin", dec!(1), dec!(1), Utc::now())).await
            .unwrap();
        h.thresholds(&[(TimeWindow::OneMinute, dec!(0.1))]).await;
        h.prices.set_price("bitcoin", dec!(50));

        let stats = h.checker(AlertDirection::Rising).run_cycle().await.unwrap();
        assert_eq!(stats.baselined, 1);
        assert!(h.sink.alerts().is_empty());
        let stored = h.repo.get_holding(h.portfolio_id, "bitcoin").await.unwrap().unwrap();
        assert_eq!(stored.last_checked_price, Some(dec!(50)));
    }

    #[tokio::test]
    async fn test_zero_baseline_is_replaced_without_alert() {
        let h = Harness::new().await;
        h.holding_with_baseline(dec!(0)).await;
        h.thresholds(&[(TimeWindow::OneMinute, dec!(1))]).await;
        h.prices.set_price("bitcoin", dec!(3));

        let stats = h.checker(AlertDirection::Both).run_cycle().await.unwrap();
        assert_eq!(stats.baselined, 1);
        assert!(h.sink.alerts().is_empty());
    }

    #[tokio::test]
    async fn test_no_thresholds_no_alerts() {
        let h = Harness::new().await;
        h.holding_with_baseline(dec!(100)).await;
        h.prices.set_price("bitcoin", dec!(200));

        let stats = h.checker(AlertDirection::Both).run_cycle().await.unwrap();
        assert_eq!(stats.fired, 0);
        assert!(h.sink.alerts().is_empty());
    }

    #[tokio::test]
    async fn test_price_failure_keeps_baseline() {
        let h = Harness::new().await;
        h.holding_with_baseline(dec!(100)).await;
        h.thresholds(&[(TimeWindow::OneMinute, dec!(1))]).await;
        h.prices.set_price("bitcoin", dec!(200));
        h.prices.fail("bitcoin");

        let stats = h.checker(AlertDirection::Rising).run_cycle().await.unwrap();
        assert_eq!(stats.failed, 1);
        let stored = h.repo.get_holding(h.portfolio_id, "bitcoin").await.unwrap().unwrap();
        assert_eq!(stored.last_checked_price, Some(dec!(100)));
    }

    #[test]
    fn test_percent_change() {
        assert_eq!(percent_change(dec!(100), dec!(106)).unwrap(), dec!(6));
        assert_eq!(percent_change(dec!(200), dec!(150)).unwrap(), dec!(-25));
        assert!(percent_change(dec!(0), dec!(1)).is_err());
    }

    #[tokio::test]
    async fn test_sold_out_holding_raises_no_alert() {
        let h = Harness::new().await;
        let saved = h.holding_with_baseline(dec!(100)).await;
        let mut sold = saved.clone();
        sold.quantity = Decimal::ZERO;
        h.repo.upsert_holding(&sold).await.unwrap();
        h.thresholds(&[(TimeWindow::OneMinute, dec!(1))]).await;
        h.prices.set_price("bitcoin", dec!(150));

        let stats = h.checker(AlertDirection::Rising).run_cycle().await.unwrap();
        assert_eq!(stats.checked, 0);
        assert!(h.sink.alerts().is_empty());
    }

    #[tokio::test]
    async fn test_run_keeps_going_after_a_failed_pass() {
        let h = Harness::new().await;
        h.holding_with_baseline(dec!(100)).await;
        h.thresholds(&[(TimeWindow::OneMinute, dec!(5))]).await;
        h.prices.set_price("bitcoin", dec!(110));

        let repo = Arc::new(FlakyRepository::new(h.repo.clone(), 1));
        let checker = AlertChecker::new(
            repo.clone(),
            h.prices.clone(),
            h.sink.clone(),
            Duration::from_millis(10),
            AlertDirection::Rising
        );
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(checker.run(cancel.clone()));

        let fired = tokio::time::timeout(Duration::from_secs(2), async {
            while h.sink.alerts().is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }).await;
        cancel.cancel();
        handle.await.unwrap();

        assert!(fired.is_ok(), "no alert after the failed pass");
        assert!(repo.scans() >= 2);
        assert_eq!(h.sink.alerts()[0].percentage_change, dec!(10));
    }
}
