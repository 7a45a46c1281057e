pub mod broadcaster;
pub mod source;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub use broadcaster::PriceBroadcaster;
pub use source::{CoinMarketCapSource, PriceSource, DEFAULT_TICKER_URL};

#[derive(Error, Debug)]
pub enum PriceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Price source returned HTTP {status}")]
    Status { status: u16 },
    #[error("Malformed ticker: {0}")]
    Malformed(String),
    #[error("Ticker is for {got}, expected {expected}")]
    AssetMismatch { expected: String, got: String },
    #[error("Ticker has non-positive last_updated: {last_updated}")]
    Stale { last_updated: i64 },
}

/// One ticker reading as returned by the price source
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTicker {
    pub name: String,
    pub symbol: String,
    pub last_updated: i64,
    /// The USD quote object, relayed verbatim
    pub usd: Value,
}

impl PriceTicker {
    /// Check the ticker describes `expected_asset` and is dated
    pub fn validate(self, expected_asset: &str) -> Result<Self, PriceError> {
        if self.name != expected_asset {
            return Err(PriceError::AssetMismatch {
                expected: expected_asset.to_string(),
                got: self.name,
            });
        }
        if self.last_updated <= 0 {
            return Err(PriceError::Stale {
                last_updated: self.last_updated,
            });
        }
        Ok(self)
    }

    pub fn to_message(&self) -> PriceMessage {
        PriceMessage {
            symbol: self.symbol.clone(),
            usd: self.usd.clone(),
        }
    }
}

/// Outbound price payload: `{"symbol":"TRX","USD":{...}}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceMessage {
    pub symbol: String,
    #[serde(rename = "USD")]
    pub usd: Value,
}

impl PriceMessage {
    pub fn to_payload(&self) -> Result<String, PriceError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ticker(name: &str, last_updated: i64) -> PriceTicker {
        PriceTicker {
            name: name.to_string(),
            symbol: "TRX".to_string(),
            last_updated,
            usd: json!({"price": 0.0712, "volume_24h": 151_000_000.0}),
        }
    }

    #[test]
    fn test_validate_accepts_matching_ticker() {
        assert!(ticker("TRON", 1_525_137_271).validate("TRON").is_ok());
    }

    #[test]
    fn test_validate_rejects_other_asset() {
        let result = ticker("Bitcoin", 1_525_137_271).validate("TRON");
        assert!(matches!(result, Err(PriceError::AssetMismatch { .. })));
    }

    #[test]
    fn test_validate_rejects_undated_ticker() {
        assert!(matches!(ticker("TRON", 0).validate("TRON"), Err(PriceError::Stale { last_updated: 0 })));
        assert!(matches!(ticker("TRON", -5).validate("TRON"), Err(PriceError::Stale { .. })));
    }

    #[test]
    fn test_message_payload_shape() {
        let payload = ticker("TRON", 1).to_message().to_payload().unwrap();
        assert_eq!(
            payload,
            r#"{"symbol":"TRX","USD":{"price":0.0712,"volume_24h":151000000.0}}"#
        );
    }
}
