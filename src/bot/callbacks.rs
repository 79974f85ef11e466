use std::sync::Arc;
use teloxide::prelude::*;

use crate::enums::TimeWindow;
use super::{ BotState, DialogueState };
use super::constants::{ callbacks as cb, messages as msg };
use super::handlers::{
    begin_threshold_prompt,
    error_text,
    owner_key,
    parse_percent,
    portfolio_text,
    threshold_cleared_text,
    threshold_set_text,
    thresholds_text,
};
use super::keyboards;

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Handle plain text messages for dialogue flow
pub async fn handle_text_message(bot: Bot, msg: Message, state: Arc<BotState>) -> HandlerResult {
    let chat_id = msg.chat.id;
    let user_id = owner_key(msg.from.as_ref(), chat_id);
    let text = msg.text().unwrap_or("");

    let dialogue_state = {
        let storage = state.dialogue_storage.read().await;
        storage.get(&user_id).cloned().unwrap_or_default()
    };

    let DialogueState::WaitingForThreshold { window } = dialogue_state else {
        // Free text outside a dialogue: point at the commands
        bot.send_message(chat_id, msg::HELP_TEXT).await?;
        return Ok(());
    };

    let percent = match parse_percent(text) {
        Ok(percent) => percent,
        Err(_) => {
            bot.send_message(chat_id, msg::ERR_INVALID_PERCENT)
                .reply_markup(keyboards::cancel_threshold()).await?;
            return Ok(());
        }
    };

    {
        let mut storage = state.dialogue_storage.write().await;
        storage.remove(&user_id);
    }

    let result = match percent {
        Some(percent) => {
            state.alert_settings_service
                .set_threshold(&user_id, window, percent).await
                .map(|_| threshold_set_text(window, percent))
        }
        None => {
            state.alert_settings_service
                .clear_threshold(&user_id, window).await
                .map(|_| threshold_cleared_text(window))
        }
    };

    let text = result.unwrap_or_else(|e| error_text(&e, msg::ENTER_PERCENT_HINT));
    bot.send_message(chat_id, text).await?;
    Ok(())
}

pub async fn handle_callback(bot: Bot, q: CallbackQuery, state: Arc<BotState>) -> HandlerResult {
    // Answer callback to remove loading state
    bot.answer_callback_query(q.id.clone()).await?;

    let data = match q.data {
        Some(ref d) => d.as_str(),
        None => {
            return Ok(());
        }
    };

    let (chat_id, message_id) = match q.message {
        Some(ref m) => (m.chat().id, m.id()),
        None => {
            return Ok(());
        }
    };
    let user_id = owner_key(Some(&q.from), chat_id);

    match data {
        cb::MENU_PORTFOLIO => {
            let text = portfolio_text(&user_id, &state).await.unwrap_or_else(|e| error_text(&e, ""));
            bot.send_message(chat_id, text).await?;
        }
        cb::MENU_THRESHOLDS => {
            let text = thresholds_text(&user_id, &state).await.unwrap_or_else(|e| error_text(&e, ""));
            bot.send_message(chat_id, text).await?;
        }
        cb::MENU_SET_THRESHOLD => {
            bot.send_message(chat_id, msg::CHOOSE_WINDOW).reply_markup(keyboards::threshold_windows()).await?;
        }
        cb::MENU_HELP => {
            bot.send_message(chat_id, msg::HELP_TEXT).await?;
        }
        cb::PERC_CANCEL => {
            state.dialogue_storage.write().await.remove(&user_id);
            bot.edit_message_text(chat_id, message_id, msg::THRESHOLD_CANCELLED).await?;
        }
        cb::CLEAR_CONFIRM => {
            let text = match clear_portfolio(&user_id, &state).await {
                Ok(0) => msg::NOTHING_TO_CLEAR.to_string(),
                Ok(removed) => format!("🗑 Removed {} coin(s) from your portfolio.", removed),
                Err(e) => error_text(&e, ""),
            };
            bot.edit_message_text(chat_id, message_id, text).await?;
        }
        cb::CLEAR_CANCEL => {
            bot.edit_message_text(chat_id, message_id, msg::CLEAR_CANCELLED).await?;
        }
        other => {
            match other.split_once(':') {
                Some((cb::PERC_PREFIX, window)) => {
                    match window.parse::<TimeWindow>() {
                        Ok(window) => {
                            let current = state.alert_settings_service
                                .get_thresholds(&user_id).await
                                .ok()
                                .and_then(|c| c.get(window));
                            begin_threshold_prompt(&state, &user_id, window).await;

                            let current_text = match current {
                                Some(p) => format!("Current threshold: {}%", p.normalize()),
                                None => "No threshold set yet.".to_string(),
                            };
                            bot.edit_message_text(
                                chat_id,
                                message_id,
                                format!(
                                    "⏱ {}\n{}\n\n{}",
                                    window.label(),
                                    current_text,
                                    msg::ENTER_PERCENT_HINT
                                )
                            )
                                .reply_markup(keyboards::cancel_threshold()).await?;
                        }
                        Err(e) => {
                            tracing::warn!("Bad threshold callback {}: {}", other, e);
                        }
                    }
                }
                _ => {
                    tracing::warn!("Unknown callback data: {}", other);
                }
            }
        }
    }

    Ok(())
}

async fn clear_portfolio(user_id: &str, state: &BotState) -> crate::error::Result<u64> {
    let portfolio = state.portfolio_service.open(user_id).await?;
    state.portfolio_service.clear(portfolio.id).await
}
