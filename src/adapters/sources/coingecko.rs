//! CoinGecko Source - Primary Crypto Price Provider
//!
//! Batch-fetches USD spot prices with 24h change, volume, and market
//! cap from CoinGecko's `simple/price` endpoint. One HTTP call per
//! cycle covers every tracked crypto symbol.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::domain::feed::{AssetClass, Quote, Symbol};
use crate::ports::quote_source::{QuoteSource, SourceError, SourceResult};

pub const SOURCE_NAME: &str = "coingecko";

/// CoinGecko coin id for a tracked symbol.
///
/// Symbols without a mapping are simply not satisfiable by this
/// source; the fallback chain carries them to the next rung.
fn coin_id(symbol: &str) -> Option<&'static str> {
    match symbol {
        "BTC" => Some("bitcoin"),
        "ETH" => Some("ethereum"),
        "ADA" => Some("cardano"),
        "SOL" => Some("solana"),
        "LINK" => Some("chainlink"),
        "DOT" => Some("polkadot"),
        "AVAX" => Some("avalanche-2"),
        "MATIC" => Some("polygon"),
        _ => None,
    }
}

/// One coin entry in the `simple/price` response.
#[derive(Debug, Deserialize)]
struct PriceEntry {
    usd: Option<f64>,
    #[serde(rename = "usd_24h_change")]
    change_24h: Option<f64>,
    #[serde(rename = "usd_24h_vol")]
    volume_24h: Option<f64>,
    #[serde(rename = "usd_market_cap")]
    market_cap: Option<f64>,
}

/// CoinGecko HTTP adapter.
pub struct CoinGeckoSource {
    base_url: String,
    http: Client,
}

impl CoinGeckoSource {
    /// Create an adapter against the given base URL.
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }
}

#[async_trait]
impl QuoteSource for CoinGeckoSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn asset_class(&self) -> AssetClass {
        AssetClass::Crypto
    }

    #[instrument(skip(self, symbols), fields(source = SOURCE_NAME))]
    async fn fetch(&self, symbols: &[Symbol]) -> SourceResult {
        let mut id_to_symbol: HashMap<&str, &str> = HashMap::new();
        for symbol in symbols {
            if let Some(id) = coin_id(symbol) {
                id_to_symbol.insert(id, symbol.as_str());
            }
        }
        if id_to_symbol.is_empty() {
            return Ok(HashMap::new());
        }

        let ids: Vec<&str> = id_to_symbol.keys().copied().collect();
        let url = format!("{}/api/v3/simple/price", self.base_url);

        let response = self
            .http
            .get(&url)
            .query(&[
                ("ids", ids.join(",").as_str()),
                ("vs_currencies", "usd"),
                ("include_24hr_change", "true"),
                ("include_24hr_vol", "true"),
                ("include_market_cap", "true"),
            ])
            .send()
            .await
            .map_err(request_error)?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => return Err(SourceError::RateLimited),
            status if !status.is_success() => {
                return Err(SourceError::Unavailable {
                    status: status.as_u16(),
                })
            }
            _ => {}
        }

        let payload: HashMap<String, PriceEntry> = response
            .json()
            .await
            .map_err(|e| SourceError::Malformed(e.to_string()))?;

        let now = Utc::now();
        let mut quotes = HashMap::new();

        for (id, entry) in payload {
            let Some(symbol) = id_to_symbol.get(id.as_str()) else {
                continue;
            };
            let Some(price) = entry.usd.and_then(Decimal::from_f64) else {
                debug!(coin = %id, "Entry missing usd price, skipping");
                continue;
            };
            quotes.insert(
                (*symbol).to_string(),
                Quote {
                    symbol: (*symbol).to_string(),
                    price,
                    change_24h: entry
                        .change_24h
                        .and_then(Decimal::from_f64)
                        .unwrap_or(Decimal::ZERO),
                    volume_24h: entry.volume_24h.and_then(Decimal::from_f64),
                    market_cap: entry.market_cap.and_then(Decimal::from_f64),
                    observed_at: now,
                    source: SOURCE_NAME.to_string(),
                },
            );
        }

        if quotes.is_empty() {
            return Err(SourceError::Malformed(
                "response contained no usable coin entries".to_string(),
            ));
        }

        Ok(quotes)
    }
}

fn request_error(e: reqwest::Error) -> SourceError {
    if e.is_timeout() {
        SourceError::Timeout
    } else {
        SourceError::Unavailable {
            status: e.status().map_or(0, |s| s.as_u16()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_server(status: u16, body: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/simple/price"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&server)
            .await;
        server
    }

    fn source(server: &MockServer) -> CoinGeckoSource {
        CoinGeckoSource::new(&server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_successful_batch_fetch() {
        let body = r#"{
            "bitcoin": {"usd": 46350.0, "usd_24h_change": 3.0, "usd_24h_vol": 1000000.0, "usd_market_cap": 900000000.0},
            "ethereum": {"usd": 2800.5, "usd_24h_change": -1.2}
        }"#;
        let server = mock_server(200, body).await;

        let quotes = source(&server)
            .fetch(&["BTC".to_string(), "ETH".to_string()])
            .await
            .unwrap();

        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes["BTC"].price, dec!(46350.0));
        assert_eq!(quotes["ETH"].price, dec!(2800.5));
        assert_eq!(quotes["BTC"].source, "coingecko");
        assert!(quotes["ETH"].volume_24h.is_none());
    }

    #[tokio::test]
    async fn test_unmapped_symbol_returns_empty_without_calling() {
        let server = mock_server(200, "{}").await;
        let quotes = source(&server)
            .fetch(&["XYZ".to_string()])
            .await
            .unwrap();
        assert!(quotes.is_empty());
    }

    #[tokio::test]
    async fn test_server_error_maps_to_unavailable() {
        let server = mock_server(503, "").await;
        let err = source(&server)
            .fetch(&["BTC".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Unavailable { status: 503 }));
    }

    #[tokio::test]
    async fn test_rate_limit_maps_to_rate_limited() {
        let server = mock_server(429, "").await;
        let err = source(&server)
            .fetch(&["BTC".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::RateLimited));
    }

    #[tokio::test]
    async fn test_malformed_payload() {
        let server = mock_server(200, "not json at all").await;
        let err = source(&server)
            .fetch(&["BTC".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_empty_payload_is_malformed() {
        let server = mock_server(200, "{}").await;
        let err = source(&server)
            .fetch(&["BTC".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Malformed(_)));
    }
}
