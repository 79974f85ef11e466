pub mod handlers;
pub mod commands;
pub mod constants;
pub mod keyboards;
mod callbacks;

use std::sync::Arc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use teloxide::prelude::*;
use teloxide::dispatching::{ UpdateHandler, UpdateFilterExt };
use teloxide::utils::command::BotCommands;

use crate::enums::TimeWindow;
use crate::services::{ AlertSettingsService, PortfolioService, ReportService };

/// User dialogue state for interactive flows
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum DialogueState {
    /// No active dialogue
    #[default]
    None,
    /// Window picked from the /perc keyboard, waiting for the percentage
    WaitingForThreshold {
        window: TimeWindow,
    },
}

/// Dialogue storage keyed by chat id
/// Keyed by the owner key of the sender (see [`handlers::owner_key`]).
pub type DialogueStorage = Arc<RwLock<HashMap<String, DialogueState>>>;

#[derive(Clone)]
pub struct BotState {
    pub portfolio_service: Arc<PortfolioService>,
    pub report_service: Arc<ReportService>,
    pub alert_settings_service: Arc<AlertSettingsService>,
    pub dialogue_storage: DialogueStorage,
}

impl BotState {
    pub fn new(
        portfolio_service: Arc<PortfolioService>,
        report_service: Arc<ReportService>,
        alert_settings_service: Arc<AlertSettingsService>
    ) -> Self {
        Self {
            portfolio_service,
            report_service,
            alert_settings_service,
            dialogue_storage: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

fn schema() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
    let command_handler = Update::filter_message()
        .filter_command::<commands::Command>()
        .endpoint(handlers::handle_command_dispatch);

    let callback_handler = Update::filter_callback_query().endpoint(callbacks::handle_callback);

    // Plain text answers a pending threshold prompt
    let message_handler = Update::filter_message()
        .filter(|msg: Message| msg.text().is_some_and(|t| !t.starts_with('/')))
        .endpoint(callbacks::handle_text_message);

    dptree::entry().branch(command_handler).branch(callback_handler).branch(message_handler)
}

/// Run the dispatcher until Ctrl-C.
pub async fn run_bot(bot: Bot, state: BotState) {
    tracing::info!("Starting Telegram bot...");

    // Set bot commands for slash menu
    if let Err(e) = bot.set_my_commands(commands::Command::bot_commands()).await {
        tracing::warn!("Failed to set bot commands: {}", e);
    } else {
        tracing::info!("Bot commands registered successfully");
    }

    let state = Arc::new(state);

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch().await;
}
