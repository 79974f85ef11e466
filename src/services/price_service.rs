use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{ Duration, Instant };

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::value::RawValue;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::error::{ AppError, Result };

const MAX_RETRIES: u32 = 3;

/// Current market price lookup for a coin identifier.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Price of one unit of `coin_id` in the quote currency.
    ///
    /// Fails with [`AppError::CoinNotFound`] for unknown coins and
    /// [`AppError::PriceUnavailable`] on network, timeout or parse errors.
    async fn current_price(&self, coin_id: &str) -> Result<Decimal>;

    async fn coin_exists(&self, coin_id: &str) -> Result<bool>;

    fn name(&self) -> &str;
}

#[derive(Debug, Clone)]
struct CachedPrice {
    price: Decimal,
    fetched_at: Instant,
}

/// CoinGecko-backed price source with a short per-coin cache.
pub struct CoinGeckoPriceSource {
    client: reqwest::Client,
    api_base: String,
    quote_currency: String,
    cache_ttl: Duration,
    cache: Arc<RwLock<HashMap<String, CachedPrice>>>,
}

impl CoinGeckoPriceSource {
    pub fn new(
        api_base: impl Into<String>,
        quote_currency: impl Into<String>,
        timeout: Duration,
        cache_ttl: Duration
    ) -> Result<Self> {
        let client = reqwest::Client
            ::builder()
            .timeout(timeout)
            .user_agent(concat!("portfolio-bot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            quote_currency: quote_currency.into().to_lowercase(),
            cache_ttl,
            cache: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.coingecko_api_base.clone(),
            config.quote_currency.clone(),
            config.price_timeout,
            config.price_cache_ttl
        )
    }

    async fn get_from_cache(&self, coin_id: &str) -> Option<Decimal> {
        if self.cache_ttl.is_zero() {
            return None;
        }
        let cache = self.cache.read().await;
        cache
            .get(coin_id)
            .filter(|c| c.fetched_at.elapsed() < self.cache_ttl)
            .map(|c| c.price)
    }

    async fn update_cache(&self, coin_id: String, price: Decimal) {
        if self.cache_ttl.is_zero() {
            return;
        }
        let mut cache = self.cache.write().await;
        cache.insert(coin_id, CachedPrice {
            price,
            fetched_at: Instant::now(),
        });
    }

    /// Fetch a URL, backing off on 429 rate-limit responses.
    async fn fetch_with_retry(&self, url: &str) -> Result<reqwest::Response> {
        let mut last_err = None;
        for attempt in 0..MAX_RETRIES {
            let response = self.client
                .get(url)
                .header("Accept", "application/json")
                .send().await
                .map_err(|e| AppError::PriceUnavailable(format!("CoinGecko request failed: {}", e)))?;

            if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                let wait_secs = 2u64.pow(attempt + 1);
                tracing::debug!("CoinGecko rate limited, retrying in {}s", wait_secs);
                tokio::time::sleep(Duration::from_secs(wait_secs)).await;
                last_err = Some(AppError::PriceUnavailable("CoinGecko rate limited".to_string()));
                continue;
            }

            return Ok(response);
        }
        Err(
            last_err.unwrap_or_else(|| {
                AppError::PriceUnavailable("CoinGecko request failed after retries".to_string())
            })
        )
    }

    async fn fetch_simple_price(&self, coin_id: &str) -> Result<Decimal> {
        let url = format!(
            "{}/simple/price?ids={}&vs_currencies={}",
            self.api_base,
            urlencoding::encode(coin_id),
            self.quote_currency
        );

        let response = self.fetch_with_retry(&url).await?;
        if !response.status().is_success() {
            return Err(
                AppError::PriceUnavailable(format!("CoinGecko returned status: {}", response.status()))
            );
        }

        let body = response
            .text().await
            .map_err(|e| AppError::PriceUnavailable(format!("Failed to read CoinGecko response: {}", e)))?;

        extract_price(&body, coin_id, &self.quote_currency)
    }
}

/// `/simple/price` body. Quotes stay as raw JSON text so no digit passes through `f64`.
type SimplePriceBody = HashMap<String, HashMap<String, Box<RawValue>>>;

/// Pull `body[coin_id][currency]` out of a `/simple/price` response.
fn extract_price(body: &str, coin_id: &str, currency: &str) -> Result<Decimal> {
    let quotes: SimplePriceBody = serde_json::from_str(body).map_err(|e| AppError::PriceUnavailable(format!("Failed to parse CoinGecko response: {}", e)))?;

    let Some(coin_quotes) = quotes.get(coin_id) else {
        return Err(AppError::CoinNotFound(coin_id.to_string()));
    };

    match coin_quotes.get(currency).map(|raw| raw.get()) {
        Some(raw) if raw.starts_with(|c: char| c == '-' || c.is_ascii_digit()) => parse_decimal(raw),
        Some(other) => {
            Err(AppError::PriceUnavailable(format!("Unexpected price value for {}: {}", coin_id, other)))
        }
        None => {
            Err(AppError::PriceUnavailable(format!("No {} price for {}", currency, coin_id)))
        }
    }
}

/// JSON numbers may come back in exponent form (`1e-7`).
fn parse_decimal(raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .map(|d| d.normalize())
        .map_err(|_| AppError::PriceUnavailable(format!("Unparseable price: {}", raw)))
}

#[async_trait]
impl PriceSource for CoinGeckoPriceSource {
    async fn current_price(&self, coin_id: &str) -> Result<Decimal> {
        let coin_id = coin_id.trim().to_lowercase();
        if coin_id.is_empty() {
            return Err(AppError::CoinNotFound(coin_id));
        }

        if let Some(cached) = self.get_from_cache(&coin_id).await {
            return Ok(cached);
        }

        let price = self.fetch_simple_price(&coin_id).await?;
        self.update_cache(coin_id, price).await;
        Ok(price)
    }

    async fn coin_exists(&self, coin_id: &str) -> Result<bool> {
        let coin_id = coin_id.trim().to_lowercase();
        if coin_id.is_empty() {
            return Ok(false);
        }

        let url = format!(
            "{}/coins/{}?localization=false&tickers=false&market_data=false&community_data=false&developer_data=false",
            self.api_base,
            urlencoding::encode(&coin_id)
        );

        let response = self.fetch_with_retry(&url).await?;
        let status = response.status();
        if status.is_success() {
            Ok(true)
        } else if status == reqwest::StatusCode::NOT_FOUND {
            Ok(false)
        } else {
            Err(AppError::PriceUnavailable(format!("CoinGecko returned status: {}", status)))
        }
    }

    fn name(&self) -> &str {
        "coingecko"
    }
}
