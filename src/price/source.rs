use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::logging::{LogContext, PerformanceMonitor};
use crate::price::{PriceError, PriceTicker};

/// CoinMarketCap v2 ticker for TRX (id 1958) quoted in USD
pub const DEFAULT_TICKER_URL: &str = "https://api.coinmarketcap.com/v2/ticker/1958/?convert=USD";

/// Somewhere a current market quote can be read from
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_ticker(&self) -> Result<PriceTicker, PriceError>;
}

#[derive(Debug, Deserialize)]
struct TickerResponse {
    data: Option<TickerData>,
}

#[derive(Debug, Deserialize)]
struct TickerData {
    name: Option<String>,
    symbol: Option<String>,
    last_updated: Option<i64>,
    #[serde(default)]
    quotes: Option<Quotes>,
}

#[derive(Debug, Deserialize)]
struct Quotes {
    #[serde(rename = "USD")]
    usd: Option<Value>,
}

/// HTTP client for a CoinMarketCap-style ticker endpoint
#[derive(Clone)]
pub struct CoinMarketCapSource {
    client: Client,
    url: String,
}

impl CoinMarketCapSource {
    pub fn new(url: String, timeout_seconds: u64) -> Result<Self, PriceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;

        LogContext::new("price_source", "initialization")
            .with_metadata("url", serde_json::json!(url))
            .info("Initializing price source");

        Ok(Self { client, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl PriceSource for CoinMarketCapSource {
    async fn fetch_ticker(&self) -> Result<PriceTicker, PriceError> {
        let monitor = PerformanceMonitor::new("price_fetch");

        let result: Result<PriceTicker, PriceError> = async {
            let response = self.client.get(&self.url).send().await?;

            let status = response.status();
            if !status.is_success() {
                return Err(PriceError::Status { status: status.as_u16() });
            }

            let text = response.text().await?;
            parse_ticker(&text)
        }
        .await;

        monitor.finish_with_result(&result);
        result
    }
}

fn parse_ticker(body: &str) -> Result<PriceTicker, PriceError> {
    let response: TickerResponse = serde_json::from_str(body)?;
    let data = response
        .data
        .ok_or_else(|| PriceError::Malformed("missing data".to_string()))?;

    let usd = data
        .quotes
        .and_then(|quotes| quotes.usd)
        .ok_or_else(|| PriceError::Malformed("missing quotes.USD".to_string()))?;

    Ok(PriceTicker {
        name: data.name.ok_or_else(|| PriceError::Malformed("missing name".to_string()))?,
        symbol: data.symbol.ok_or_else(|| PriceError::Malformed("missing symbol".to_string()))?,
        last_updated: data.last_updated.unwrap_or(0),
        usd,
    })
}
