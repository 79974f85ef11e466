use async_trait::async_trait;
use rust_decimal::{ Decimal, RoundingStrategy };
use teloxide::prelude::*;

use crate::error::{ AppError, Result };
use crate::models::PriceAlert;

/// Delivers fired price alerts to their owner.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, alert: &PriceAlert) -> Result<()>;
}

/// Sends alerts as Telegram messages. The alert's `user_id` is the chat id.
pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl NotificationSink for TelegramNotifier {
    async fn notify(&self, alert: &PriceAlert) -> Result<()> {
        let chat_id = alert.user_id
            .parse::<i64>()
            .map(ChatId)
            .map_err(|_| AppError::Notification(format!("'{}' is not a chat id", alert.user_id)))?;

        self.bot
            .send_message(chat_id, format_alert_message(alert)).await
            .map_err(|e| AppError::Notification(format!("Failed to message {}: {}", alert.user_id, e)))?;
        Ok(())
    }
}

pub fn format_alert_message(alert: &PriceAlert) -> String {
    let emoji = if alert.percentage_change.is_sign_negative() { "📉" } else { "📈" };
    let change = alert.percentage_change.round_dp_with_strategy(2, RoundingStrategy::ToZero);
    let sign = if change > Decimal::ZERO { "+" } else { "" };

    format!(
        "{emoji} Price Alert: {coin}\n\n\
        Change: {sign}{change}% (threshold window: {window})\n\
        New Price: ${price}\n\
        Your Holding: {quantity} {coin}",
        emoji = emoji,
        coin = alert.coin_id,
        sign = sign,
        change = change,
        window = alert.window.label(),
        price = alert.new_price,
        quantity = alert.quantity.normalize()
    )
}
