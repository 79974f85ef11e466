use std::sync::Arc;

use rust_decimal::Decimal;

use crate::db::HoldingsRepository;
use crate::enums::TimeWindow;
use crate::error::{ AppError, Result };
use crate::models::AlertThresholdConfig;

/// Per-user percentage thresholds for the alert loop.
#[derive(Clone)]
pub struct AlertSettingsService {
    repo: Arc<dyn HoldingsRepository>,
}

impl AlertSettingsService {
    pub fn new(repo: Arc<dyn HoldingsRepository>) -> Self {
        Self { repo }
    }

    pub async fn set_threshold(&self, user_id: &str, window: TimeWindow, percent: Decimal) -> Result<()> {
        if percent <= Decimal::ZERO {
            return Err(AppError::InvalidAmount(format!("threshold must be positive, got {}", percent)));
        }
        self.repo.set_alert_config(user_id, window, Some(percent)).await?;
        tracing::info!("User {} set {} threshold to {}%", user_id, window, percent);
        Ok(())
    }

    pub async fn clear_threshold(&self, user_id: &str, window: TimeWindow) -> Result<()> {
        self.repo.set_alert_config(user_id, window, None).await?;
        tracing::info!("User {} cleared {} threshold", user_id, window);
        Ok(())
    }

    pub async fn get_thresholds(&self, user_id: &str) -> Result<AlertThresholdConfig> {
        self.repo.get_alert_config(user_id).await
    }
}
