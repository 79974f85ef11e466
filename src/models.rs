//! Domain types shared by the services, the repository and the loops.

use std::collections::BTreeMap;

use chrono::{ DateTime, Utc };
use rust_decimal::Decimal;
use serde::{ Deserialize, Serialize };
use uuid::Uuid;

use crate::enums::{ HistorySource, TimeWindow };

/// A user's portfolio. One per user, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Portfolio {
    pub id: Uuid,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

/// A position in one coin within a portfolio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    pub id: Uuid,
    pub portfolio_id: Uuid,
    pub coin_id: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub quantity: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub average_price: Decimal,
    /// Last market price written by the refresh loop.
    #[serde(with = "rust_decimal::serde::str_option")]
    pub current_price: Option<Decimal>,
    /// Baseline the alert loop compares against.
    #[serde(with = "rust_decimal::serde::str_option")]
    pub last_checked_price: Option<Decimal>,
    /// Optimistic concurrency token. Zero means the holding was never stored.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Holding {
    pub fn new(
        portfolio_id: Uuid,
        coin_id: impl Into<String>,
        quantity: Decimal,
        average_price: Decimal,
        now: DateTime<Utc>
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            portfolio_id,
            coin_id: coin_id.into(),
            quantity,
            average_price,
            current_price: None,
            last_checked_price: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.version > 0
    }

    pub fn is_empty(&self) -> bool {
        self.quantity.is_zero()
    }
}

/// Immutable price observation for a holding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceHistoryEntry {
    pub id: Uuid,
    pub holding_id: Uuid,
    pub portfolio_id: Uuid,
    pub coin_id: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    pub source: HistorySource,
    pub timestamp: DateTime<Utc>,
}

impl PriceHistoryEntry {
    pub fn for_holding(
        holding: &Holding,
        price: Decimal,
        source: HistorySource,
        timestamp: DateTime<Utc>
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            holding_id: holding.id,
            portfolio_id: holding.portfolio_id,
            coin_id: holding.coin_id.clone(),
            price,
            source,
            timestamp,
        }
    }
}

/// Per-user percentage thresholds keyed by time window.
///
/// A window without an entry (or with a zero value) is unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertThresholdConfig {
    thresholds: BTreeMap<TimeWindow, Decimal>,
}

impl AlertThresholdConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, window: TimeWindow) -> Option<Decimal> {
        self.thresholds
            .get(&window)
            .copied()
            .filter(|v| !v.is_zero())
    }

    pub fn set(&mut self, window: TimeWindow, value: Option<Decimal>) {
        match value.filter(|v| !v.is_zero()) {
            Some(v) => {
                self.thresholds.insert(window, v);
            }
            None => {
                self.thresholds.remove(&window);
            }
        }
    }

    pub fn with(mut self, window: TimeWindow, value: Decimal) -> Self {
        self.set(window, Some(value));
        self
    }

    /// Configured windows in window order.
    pub fn configured(&self) -> impl Iterator<Item = (TimeWindow, Decimal)> + '_ {
        TimeWindow::all()
            .iter()
            .filter_map(|w| self.get(*w).map(|v| (*w, v)))
    }

    pub fn is_empty(&self) -> bool {
        self.configured().next().is_none()
    }
}

/// Event emitted when a holding's price move crosses a configured threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceAlert {
    pub user_id: String,
    pub coin_id: String,
    pub quantity: Decimal,
    pub window: TimeWindow,
    pub new_price: Decimal,
    pub percentage_change: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_zero_threshold_is_unset() {
        let mut config = AlertThresholdConfig::new();
        config.set(TimeWindow::OneMinute, Some(dec!(0)));
        config.set(TimeWindow::OneHour, Some(dec!(2.5)));

        assert_eq!(config.get(TimeWindow::OneMinute), None);
        assert_eq!(config.get(TimeWindow::OneHour), Some(dec!(2.5)));
        assert_eq!(config.configured().count(), 1);
    }

    #[test]
    fn test_configured_iterates_in_window_order() {
        let config = AlertThresholdConfig::new()
            .with(TimeWindow::OneHour, dec!(10))
            .with(TimeWindow::OneMinute, dec!(1));

        let windows: Vec<_> = config.configured().map(|(w, _)| w).collect();
        assert_eq!(windows, vec![TimeWindow::OneMinute, TimeWindow::OneHour]);
    }

    #[test]
    fn test_clearing_a_window() {
        let mut config = AlertThresholdConfig::new().with(TimeWindow::FiveMinutes, dec!(5));
        config.set(TimeWindow::FiveMinutes, None);
        assert!(config.is_empty());
    }
}
