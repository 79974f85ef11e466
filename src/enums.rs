use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{ Deserialize, Serialize };

use crate::error::AppError;

// ─── TimeWindow ──────────────────────────────────────────────────────

/// Observation windows a user can attach a percentage-change threshold to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeWindow {
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    OneHour,
}

impl TimeWindow {
    /// Canonical string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeWindow::OneMinute => "1m",
            TimeWindow::FiveMinutes => "5m",
            TimeWindow::FifteenMinutes => "15m",
            TimeWindow::ThirtyMinutes => "30m",
            TimeWindow::OneHour => "1h",
        }
    }

    /// Human readable label used in notifications.
    pub fn label(&self) -> &'static str {
        match self {
            TimeWindow::OneMinute => "1 minute",
            TimeWindow::FiveMinutes => "5 minutes",
            TimeWindow::FifteenMinutes => "15 minutes",
            TimeWindow::ThirtyMinutes => "30 minutes",
            TimeWindow::OneHour => "1 hour",
        }
    }

    pub fn all() -> &'static [TimeWindow] {
        &[
            TimeWindow::OneMinute,
            TimeWindow::FiveMinutes,
            TimeWindow::FifteenMinutes,
            TimeWindow::ThirtyMinutes,
            TimeWindow::OneHour,
        ]
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeWindow {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1m" | "1min" | "minute" | "one_minute" => Ok(TimeWindow::OneMinute),
            "5m" | "5min" | "five_minutes" => Ok(TimeWindow::FiveMinutes),
            "15m" | "15min" | "fifteen_minutes" => Ok(TimeWindow::FifteenMinutes),
            "30m" | "30min" | "thirty_minutes" => Ok(TimeWindow::ThirtyMinutes),
            "1h" | "60m" | "hour" | "one_hour" => Ok(TimeWindow::OneHour),
            _ => Err(AppError::InvalidInput(format!(
                "Invalid time window: {}. Supported: 1m, 5m, 15m, 30m, 1h",
                s
            ))),
        }
    }
}

// ─── HistorySource ───────────────────────────────────────────────────

/// What produced a price history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistorySource {
    Buy,
    Sell,
    Refresh,
}

impl HistorySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistorySource::Buy => "buy",
            HistorySource::Sell => "sell",
            HistorySource::Refresh => "refresh",
        }
    }
}

impl fmt::Display for HistorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistorySource {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "buy" => Ok(HistorySource::Buy),
            "sell" => Ok(HistorySource::Sell),
            "refresh" => Ok(HistorySource::Refresh),
            _ => Err(AppError::InvalidInput(format!("Invalid history source: {}", s))),
        }
    }
}

// ─── AlertDirection ──────────────────────────────────────────────────

/// Which price moves are compared against a threshold.
///
/// `Rising` compares the signed change, so a drop never fires.
/// `Both` compares the magnitude of the change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertDirection {
    #[default]
    Rising,
    Both,
}

impl AlertDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertDirection::Rising => "rising",
            AlertDirection::Both => "both",
        }
    }

    /// Whether a percentage change reaches `threshold` (inclusive).
    pub fn crosses(&self, percent_change: Decimal, threshold: Decimal) -> bool {
        match self {
            AlertDirection::Rising => percent_change >= threshold,
            AlertDirection::Both => percent_change.abs() >= threshold,
        }
    }
}

impl fmt::Display for AlertDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertDirection {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rising" | "up" => Ok(AlertDirection::Rising),
            "both" | "any" | "absolute" => Ok(AlertDirection::Both),
            _ => Err(AppError::InvalidInput(format!(
                "Invalid alert direction: {}. Supported: rising, both",
                s
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_window_round_trips_through_db_string() {
        for window in TimeWindow::all() {
            assert_eq!(window.as_str().parse::<TimeWindow>().unwrap(), *window);
        }
    }

    #[test]
    fn test_time_window_aliases() {
        assert_eq!("5min".parse::<TimeWindow>().unwrap(), TimeWindow::FiveMinutes);
        assert_eq!("HOUR".parse::<TimeWindow>().unwrap(), TimeWindow::OneHour);
        assert!("2m".parse::<TimeWindow>().is_err());
    }

    #[test]
    fn test_alert_direction_default_is_rising() {
        assert_eq!(AlertDirection::default(), AlertDirection::Rising);
        assert_eq!("both".parse::<AlertDirection>().unwrap(), AlertDirection::Both);
    }

    #[test]
    fn test_crosses_is_inclusive() {
        let five = Decimal::from(5);
        assert!(AlertDirection::Rising.crosses(five, five));
        assert!(!AlertDirection::Rising.crosses(-Decimal::from(6), five));
        assert!(AlertDirection::Both.crosses(-Decimal::from(6), five));
        assert!(!AlertDirection::Both.crosses(Decimal::from(4), five));
    }
}
