use std::sync::Arc;

use rust_decimal::Decimal;
use teloxide::prelude::*;
use teloxide::types::User;

use crate::bot::{ BotState, DialogueState, commands::Command, keyboards };
use crate::enums::TimeWindow;
use crate::error::{ AppError, Result };
use crate::models::AlertThresholdConfig;
use crate::services::cost_basis::parse_amount;
use crate::services::{ PortfolioReport, Trade };
use super::constants::{ command_descriptions as desc, messages as msg };

// Handler for dispatcher-based command handling
pub async fn handle_command_dispatch(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: Arc<BotState>
) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
    handle_command(bot, msg, cmd, state).await?;
    Ok(())
}

pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: Arc<BotState>
) -> ResponseResult<()> {
    let chat_id = msg.chat.id;
    let user_id = owner_key(msg.from.as_ref(), chat_id);

    // Any command abandons a half-finished threshold prompt
    state.dialogue_storage.write().await.remove(&user_id);

    match cmd {
        Command::Start => handle_start(bot, chat_id, user_id, state).await,
        Command::Help => {
            bot.send_message(chat_id, msg::HELP_TEXT).reply_markup(keyboards::main_menu()).await?;
            Ok(())
        }
        Command::Add(ref args) => {
            let result = handle_add(args, &user_id, &state).await;
            reply(&bot, chat_id, result, cmd.usage()).await
        }
        Command::Sell(ref args) => {
            let result = handle_sell(args, &user_id, &state).await;
            reply(&bot, chat_id, result, cmd.usage()).await
        }
        Command::Portfolio => {
            let result = portfolio_text(&user_id, &state).await;
            reply(&bot, chat_id, result, desc::HELP).await
        }
        Command::Clear => {
            bot.send_message(chat_id, msg::CLEAR_CONFIRM)
                .reply_markup(keyboards::clear_confirmation()).await?;
            Ok(())
        }
        Command::Perc(ref args) => handle_perc(bot, chat_id, args, &user_id, &state).await,
        Command::Vperc => {
            let result = thresholds_text(&user_id, &state).await;
            reply(&bot, chat_id, result, desc::HELP).await
        }
    }
}

async fn handle_start(bot: Bot, chat_id: ChatId, user_id: String, state: Arc<BotState>) -> ResponseResult<()> {
    match state.portfolio_service.open(&user_id).await {
        Ok(portfolio) => {
            tracing::info!("User {} opened portfolio {}", user_id, portfolio.id);
            bot.send_message(chat_id, msg::WELCOME_NEW).reply_markup(keyboards::main_menu()).await?;
        }
        Err(e) => {
            tracing::error!("Failed to open portfolio for {}: {}", user_id, e);
            bot.send_message(chat_id, msg::ERR_INTERNAL).await?;
        }
    }
    Ok(())
}

async fn handle_add(args: &str, user_id: &str, state: &BotState) -> Result<String> {
    let args = parse_add_args(args)?;
    let portfolio = state.portfolio_service.open(user_id).await?;
    let trade = state.portfolio_service.buy(portfolio.id, &args.coin_id, args.quantity, args.price).await?;
    Ok(format_trade("✅ Added", &trade))
}

async fn handle_sell(args: &str, user_id: &str, state: &BotState) -> Result<String> {
    let args = parse_sell_args(args)?;
    let portfolio = state.portfolio_service.open(user_id).await?;
    let trade = state.portfolio_service.sell(portfolio.id, &args.coin_id, args.quantity).await?;
    Ok(format_trade("✅ Sold", &trade))
}

async fn handle_perc(
    bot: Bot,
    chat_id: ChatId,
    args: &str,
    user_id: &str,
    state: &BotState
) -> ResponseResult<()> {
    let result = match parse_perc_args(args) {
        Ok(PercArgs::Menu) => {
            bot.send_message(chat_id, msg::CHOOSE_WINDOW).reply_markup(keyboards::threshold_windows()).await?;
            return Ok(());
        }
        Ok(PercArgs::Set(window, Some(percent))) => {
            state.alert_settings_service
                .set_threshold(user_id, window, percent).await
                .map(|_| threshold_set_text(window, percent))
        }
        Ok(PercArgs::Set(window, None)) => {
            state.alert_settings_service
                .clear_threshold(user_id, window).await
                .map(|_| threshold_cleared_text(window))
        }
        Err(e) => Err(e),
    };
    reply(&bot, chat_id, result, desc::PERC).await
}

pub(super) async fn portfolio_text(user_id: &str, state: &BotState) -> Result<String> {
    let portfolio = state.portfolio_service.open(user_id).await?;
    let report = state.report_service.build_report(portfolio.id).await?;
    Ok(format_report(&report))
}

pub(super) async fn thresholds_text(user_id: &str, state: &BotState) -> Result<String> {
    let config = state.alert_settings_service.get_thresholds(user_id).await?;
    Ok(format_thresholds(&config))
}

/// Put the sender into the "waiting for a percentage" state for `window`.
pub(super) async fn begin_threshold_prompt(state: &BotState, user_id: &str, window: TimeWindow) {
    let mut storage = state.dialogue_storage.write().await;
    storage.insert(user_id.to_string(), DialogueState::WaitingForThreshold { window });
}

/// Portfolios and thresholds belong to the sender, not the chat, so group members
/// each keep their own. Messages without a sender (channel posts) fall back to the chat.
pub fn owner_key(sender: Option<&User>, chat_id: ChatId) -> String {
    match sender {
        Some(user) => user.id.0.to_string(),
        None => chat_id.0.to_string(),
    }
}

async fn reply(bot: &Bot, chat_id: ChatId, result: Result<String>, usage: &str) -> ResponseResult<()> {
    let text = match result {
        Ok(text) => text,
        Err(e) => error_text(&e, usage),
    };
    bot.send_message(chat_id, text).await?;
    Ok(())
}

// ─── Argument parsing ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeArgs {
    pub coin_id: String,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PercArgs {
    /// No arguments: show the window keyboard.
    Menu,
    /// `None` removes the threshold.
    Set(TimeWindow, Option<Decimal>),
}

/// `<coin> <quantity> [price]`
pub fn parse_add_args(args: &str) -> Result<TradeArgs> {
    let parts: Vec<&str> = args.split_whitespace().collect();
    let (coin, quantity, price) = match parts.as_slice() {
        [coin, quantity] => (*coin, *quantity, None),
        [coin, quantity, price] => (*coin, *quantity, Some(*price)),
        _ => {
            return Err(AppError::InvalidInput("expected a coin and a quantity".to_string()));
        }
    };

    Ok(TradeArgs {
        coin_id: coin.to_lowercase(),
        quantity: parse_amount(quantity)?,
        price: price.map(parse_amount).transpose()?,
    })
}

/// `<coin> <quantity>`
pub fn parse_sell_args(args: &str) -> Result<TradeArgs> {
    let parts: Vec<&str> = args.split_whitespace().collect();
    let [coin, quantity] = parts.as_slice() else {
        return Err(AppError::InvalidInput("expected a coin and a quantity".to_string()));
    };

    Ok(TradeArgs {
        coin_id: coin.to_lowercase(),
        quantity: parse_amount(quantity)?,
        price: None,
    })
}

/// `[<window> <percent|off>]`
pub fn parse_perc_args(args: &str) -> Result<PercArgs> {
    let parts: Vec<&str> = args.split_whitespace().collect();
    match parts.as_slice() {
        [] => Ok(PercArgs::Menu),
        [window, value] => Ok(PercArgs::Set(window.parse()?, parse_percent(value)?)),
        _ => Err(AppError::InvalidInput("expected a window and a percentage".to_string())),
    }
}

/// A threshold percentage. `off` and zero mean "remove".
pub fn parse_percent(text: &str) -> Result<Option<Decimal>> {
    let text = text.trim().trim_end_matches('%');
    if matches!(text.to_lowercase().as_str(), "off" | "none" | "-") {
        return Ok(None);
    }
    let value = parse_amount(text)?;
    Ok(if value.is_zero() { None } else { Some(value) })
}

// ─── Formatting ──────────────────────────────────────────────────────

fn money(value: Decimal) -> String {
    format!("${:.2}", value)
}

fn signed(value: Decimal) -> String {
    if value > Decimal::ZERO { format!("+{:.2}", value) } else { format!("{:.2}", value) }
}

pub fn format_trade(verb: &str, trade: &Trade) -> String {
    let h = &trade.holding;
    format!(
        "{verb} {qty} {coin} at {price}\n\n\
        Holding: {total} {coin}\n\
        Average price: {avg}",
        verb = verb,
        qty = trade.quantity.normalize(),
        coin = h.coin_id,
        price = money(trade.price),
        total = h.quantity.normalize(),
        avg = money(h.average_price)
    )
}

pub fn format_report(report: &PortfolioReport) -> String {
    if report.is_empty() {
        return msg::EMPTY_PORTFOLIO.to_string();
    }

    let mut text = String::from("📊 Your Portfolio\n");
    for h in &report.holdings {
        text.push_str(
            &format!(
                "\n{coin}\n\
                Quantity: {qty}\n\
                Avg price: {avg} | Now: {now}\n\
                Value: {value} (cost {cost})\n\
                Change: {pct}% ({chg} per coin, {chg_value} total)\n",
                coin = h.coin_id,
                qty = h.quantity.normalize(),
                avg = money(h.average_price),
                now = money(h.current_price),
                value = money(h.value),
                cost = money(h.cost),
                pct = signed(h.price_change_percent),
                chg = signed(h.price_change),
                chg_value = signed(h.price_change_value)
            )
        );
    }

    let totals = &report.totals;
    text.push_str(
        &format!(
            "\nTotal value: {}\nTotal cost: {}\nTotal change: {}% ({})",
            money(totals.total_value),
            money(totals.total_cost),
            signed(totals.total_change_percent),
            signed(totals.total_change_value)
        )
    );

    if !report.skipped.is_empty() {
        text.push_str(&format!("\n\n⚠️ Price unavailable for: {}", report.skipped.join(", ")));
    }
    text
}

pub fn format_thresholds(config: &AlertThresholdConfig) -> String {
    let mut text = String::from("🔔 Price change thresholds:\n");
    for window in TimeWindow::all() {
        match config.get(*window) {
            Some(percent) => text.push_str(&format!("{}: {}%\n", window.label(), percent.normalize())),
            None => text.push_str(&format!("{}: not set\n", window.label())),
        }
    }
    text.push_str("\nChange them with /perc");
    text
}

pub fn threshold_set_text(window: TimeWindow, percent: Decimal) -> String {
    format!("✅ You'll be alerted when a coin moves {}% within {}.", percent.normalize(), window.label())
}

pub fn threshold_cleared_text(window: TimeWindow) -> String {
    format!("✅ Threshold for {} removed.", window.label())
}

/// What the user sees for a failed operation. System errors are logged, not shown.
pub fn error_text(e: &AppError, usage: &str) -> String {
    match e {
        AppError::InvalidInput(_) | AppError::InvalidAmount(_) => format!("❌ {}\n\n{}", e, usage),
        AppError::CoinNotFound(coin) =>
            format!("❌ Coin '{}' was not found. Use CoinGecko ids such as bitcoin or ethereum.", coin),
        AppError::HoldingNotFound(coin) => format!("❌ You don't hold any {}.", coin),
        AppError::InsufficientQuantity { held, requested } =>
            format!(
                "❌ Not enough coins: you hold {}, tried to sell {}.",
                held.normalize(),
                requested.normalize()
            ),
        AppError::PriceUnavailable(_) => {
            tracing::warn!("Price lookup failed: {}", e);
            msg::ERR_PRICE_UNAVAILABLE.to_string()
        }
        AppError::Conflict(_) => msg::ERR_BUSY.to_string(),
        _ => {
            tracing::error!("Bot operation failed: {}", e);
            msg::ERR_INTERNAL.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::report_service::{ HoldingReport, PortfolioTotals };
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    #[test]
    fn test_owner_key_prefers_sender_over_chat() {
        let alice: User = serde_json::from_value(
            serde_json::json!({ "id": 42, "is_bot": false, "first_name": "Alice" })
        ).unwrap();
        let bob: User = serde_json::from_value(
            serde_json::json!({ "id": 43, "is_bot": false, "first_name": "Bob" })
        ).unwrap();
        let group = ChatId(-1001234567890);

        assert_eq!(owner_key(Some(&alice), group), "42");
        assert_eq!(owner_key(Some(&bob), group), "43");
        assert_eq!(owner_key(None, group), "-1001234567890");
    }

    #[test]
    fn test_parse_add_args() {
        let args = parse_add_args("Bitcoin 0.5").unwrap();
        assert_eq!(args.coin_id, "bitcoin");
        assert_eq!(args.quantity, dec!(0.5));
        assert_eq!(args.price, None);

        let args = parse_add_args(" ethereum  2   1850,25 ").unwrap();
        assert_eq!(args.price, Some(dec!(1850.25)));

        assert!(matches!(parse_add_args("bitcoin"), Err(AppError::InvalidInput(_))));
        assert!(matches!(parse_add_args("bitcoin lots"), Err(AppError::InvalidAmount(_))));
    }

    #[test]
    fn test_parse_sell_args() {
        let args = parse_sell_args("solana 3").unwrap();
        assert_eq!(args.quantity, dec!(3));
        assert!(parse_sell_args("solana 3 4").is_err());
        assert!(parse_sell_args("").is_err());
    }

    #[test]
    fn test_parse_perc_args() {
        assert_eq!(parse_perc_args("").unwrap(), PercArgs::Menu);
        assert_eq!(
            parse_perc_args("5m 3.5").unwrap(),
            PercArgs::Set(TimeWindow::FiveMinutes, Some(dec!(3.5)))
        );
        assert_eq!(parse_perc_args("1h off").unwrap(), PercArgs::Set(TimeWindow::OneHour, None));
        assert_eq!(parse_perc_args("15m 0").unwrap(), PercArgs::Set(TimeWindow::FifteenMinutes, None));
        assert!(matches!(parse_perc_args("2m 3"), Err(AppError::InvalidInput(_))));
        assert!(matches!(parse_perc_args("5m -3"), Err(AppError::InvalidAmount(_))));
    }

    #[test]
    fn test_parse_percent_accepts_suffix() {
        assert_eq!(parse_percent("2.5%").unwrap(), Some(dec!(2.5)));
        assert_eq!(parse_percent("OFF").unwrap(), None);
    }

    #[test]
    fn test_format_report() {
        let report = PortfolioReport {
            portfolio_id: Uuid::new_v4(),
            holdings: vec![HoldingReport {
                coin_id: "bitcoin".to_string(),
                quantity: dec!(2),
                average_price: dec!(150),
                current_price: dec!(180),
                value: dec!(360),
                cost: dec!(300),
                price_change: dec!(30),
                price_change_percent: dec!(20),
                price_change_value: dec!(60),
            }],
            skipped: vec!["ethereum".to_string()],
            totals: PortfolioTotals {
                total_value: dec!(360),
                total_cost: dec!(300),
                total_change_percent: dec!(20),
                total_change_value: dec!(60),
            },
        };

        let text = format_report(&report);
        assert!(text.contains("Value: $360.00 (cost $300.00)"));
        assert!(text.contains("Change: +20.00%"));
        assert!(text.contains("Total change: +20.00% (+60.00)"));
        assert!(text.contains("Price unavailable for: ethereum"));
    }

    #[test]
    fn test_format_empty_report() {
        assert_eq!(format_report(&PortfolioReport::default()), msg::EMPTY_PORTFOLIO);
    }

    #[test]
    fn test_format_thresholds_lists_every_window() {
        let config = AlertThresholdConfig::new().with(TimeWindow::FiveMinutes, dec!(5));
        let text = format_thresholds(&config);
        assert!(text.contains("5 minutes: 5%"));
        assert!(text.contains("1 hour: not set"));
        assert_eq!(text.matches("not set").count(), 4);
    }

    #[test]
    fn test_error_text_for_oversell() {
        let e = AppError::InsufficientQuantity {
            held: dec!(1.00),
            requested: dec!(3),
        };
        assert_eq!(error_text(&e, ""), "❌ Not enough coins: you hold 1, tried to sell 3.");
    }
}
