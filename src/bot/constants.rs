// Usage lines
pub mod command_descriptions {
    pub const ADD: &str = "Usage: /add <coin> <quantity> [price]\nExample: /add bitcoin 0.5 27000";
    pub const SELL: &str = "Usage: /sell <coin> <quantity>\nExample: /sell bitcoin 0.1";
    pub const PERC: &str =
        "Usage: /perc <window> <percent|off>\nWindows: 1m, 5m, 15m, 30m, 1h\nExample: /perc 5m 3.5";
    pub const HELP: &str = "Send /help to see all commands";
}

// Bot messages
pub mod messages {
    pub const WELCOME_NEW: &str =
        "👋 Welcome! Your portfolio is ready.\n\n\
        Add a coin with /add <coin> <quantity> [price], using CoinGecko ids such as bitcoin or ethereum.\n\
        Prices are refreshed automatically and you can get alerts on sharp moves with /perc.";

    pub const HELP_TEXT: &str =
        "❓ Commands\n\n\
        /add <coin> <quantity> [price] - buy coins, at market price if none given\n\
        /sell <coin> <quantity> - sell coins\n\
        /portfolio - value your holdings at current prices\n\
        /clear - remove all holdings\n\
        /perc - set a price change threshold for a time window\n\
        /vperc - view your thresholds\n\
        /help - this message";

    pub const EMPTY_PORTFOLIO: &str = "📭 Your portfolio is empty. Add a coin with /add <coin> <quantity>.";
    pub const CLEAR_CONFIRM: &str = "⚠️ Remove every coin from your portfolio? Price history is kept.";
    pub const CLEAR_CANCELLED: &str = "Cancelled. Your portfolio is unchanged.";
    pub const NOTHING_TO_CLEAR: &str = "Your portfolio is already empty.";

    pub const CHOOSE_WINDOW: &str = "⏱ Choose a time window for the alert threshold:";
    pub const THRESHOLD_CANCELLED: &str = "Threshold setup cancelled.";
    pub const ENTER_PERCENT_HINT: &str = "Send a positive percentage such as 2.5, or 'off' to remove it.";

    pub const ERR_INVALID_PERCENT: &str = "❌ Please enter a positive number, or 'off'.";
    pub const ERR_INTERNAL: &str = "❌ Something went wrong. Please try again later.";
    pub const ERR_PRICE_UNAVAILABLE: &str = "⚠️ Price service is unavailable right now. Please try again shortly.";
    pub const ERR_BUSY: &str = "⚠️ Your portfolio was being updated at the same time. Please try again.";
}

// Callback data
pub mod callbacks {
    pub const MENU_PORTFOLIO: &str = "menu:portfolio";
    pub const MENU_THRESHOLDS: &str = "menu:thresholds";
    pub const MENU_SET_THRESHOLD: &str = "menu:perc";
    pub const MENU_HELP: &str = "menu:help";
    pub const PERC_PREFIX: &str = "perc";
    pub const PERC_CANCEL: &str = "perc:cancel";
    pub const CLEAR_CONFIRM: &str = "clear:confirm";
    pub const CLEAR_CANCEL: &str = "clear:cancel";
}
