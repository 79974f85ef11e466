use std::env;
use std::time::Duration;

use crate::enums::AlertDirection;

const DEFAULT_COINGECKO_API_BASE: &str = "https://api.coingecko.com/api/v3";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub telegram_bot_token: String,
    pub coingecko_api_base: String,
    pub quote_currency: String,
    pub price_timeout: Duration,
    pub price_cache_ttl: Duration,
    pub refresh_interval: Duration,
    pub alert_interval: Duration,
    pub alert_direction: AlertDirection,
    pub server_host: String,
    pub server_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenv::dotenv().ok();

        let database_url = env::var("DATABASE_URL")?;
        let telegram_bot_token = env::var("TELEGRAM_BOT_TOKEN")?;

        let coingecko_api_base = env::var("COINGECKO_API_BASE")
            .unwrap_or_else(|_| DEFAULT_COINGECKO_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();
        let quote_currency = env::var("QUOTE_CURRENCY")
            .unwrap_or_else(|_| "usd".to_string())
            .to_lowercase();

        let price_timeout = Self::secs_var("PRICE_TIMEOUT_SECS", 10)?;
        let price_cache_ttl = Self::secs_var("PRICE_CACHE_SECS", 10)?;
        let refresh_interval = Self::secs_var("PRICE_REFRESH_INTERVAL_SECS", 20)?;
        let alert_interval = Self::secs_var("ALERT_CHECK_INTERVAL_SECS", 60)?;

        if refresh_interval.is_zero() || alert_interval.is_zero() {
            return Err("Loop intervals must be greater than zero".into());
        }

        let alert_direction = match env::var("ALERT_DIRECTION") {
            Ok(val) => val.parse::<AlertDirection>()?,
            Err(_) => AlertDirection::default(),
        };

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()?;

        Ok(Config {
            database_url,
            telegram_bot_token,
            coingecko_api_base,
            quote_currency,
            price_timeout,
            price_cache_ttl,
            refresh_interval,
            alert_interval,
            alert_direction,
            server_host,
            server_port,
        })
    }

    fn secs_var(key: &str, default: u64) -> Result<Duration, Box<dyn std::error::Error>> {
        let secs: u64 = match env::var(key) {
            Ok(val) => val
                .trim()
                .parse()
                .map_err(|_| format!("{} must be a whole number of seconds", key))?,
            Err(_) => default,
        };
        Ok(Duration::from_secs(secs))
    }
}
