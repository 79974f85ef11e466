use teloxide::utils::command::BotCommands;

use super::constants::command_descriptions as desc;

#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "Portfolio Bot Commands:")]
pub enum Command {
    #[command(description = "Start the bot and open your portfolio")]
    Start,

    #[command(description = "Add coins - Usage: /add <coin> <quantity> [price]")] Add(String),

    #[command(description = "Sell coins - Usage: /sell <coin> <quantity>")] Sell(String),

    #[command(description = "Show your portfolio valued at current prices")]
    Portfolio,

    #[command(description = "Remove every coin from your portfolio")]
    Clear,

    #[command(
        description = "Set an alert threshold - Usage: /perc or /perc <1m|5m|15m|30m|1h> <percent|off>"
    )] Perc(String),

    #[command(description = "View your alert thresholds")]
    Vperc,

    #[command(description = "Show help message")]
    Help,
}

impl Command {
    /// Usage line shown when a command's arguments don't parse.
    pub fn usage(&self) -> &'static str {
        match self {
            Command::Add(_) => desc::ADD,
            Command::Sell(_) => desc::SELL,
            Command::Perc(_) => desc::PERC,
            _ => desc::HELP,
        }
    }
}
