//! CoinPaprika Source - Secondary Crypto Price Provider
//!
//! Fallback rung for crypto symbols. The `/v1/tickers` endpoint
//! returns every listed coin in one call; the adapter filters the
//! payload down to the requested symbols.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::Deserialize;
use tracing::instrument;

use crate::domain::feed::{AssetClass, Quote, Symbol};
use crate::ports::quote_source::{QuoteSource, SourceError, SourceResult};

pub const SOURCE_NAME: &str = "coinpaprika";

#[derive(Debug, Deserialize)]
struct Ticker {
    symbol: String,
    quotes: TickerQuotes,
}

#[derive(Debug, Deserialize)]
struct TickerQuotes {
    #[serde(rename = "USD")]
    usd: UsdQuote,
}

#[derive(Debug, Deserialize)]
struct UsdQuote {
    price: Option<f64>,
    percent_change_24h: Option<f64>,
    volume_24h: Option<f64>,
    market_cap: Option<f64>,
}

/// CoinPaprika HTTP adapter.
pub struct CoinPaprikaSource {
    base_url: String,
    http: Client,
}

impl CoinPaprikaSource {
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
impl QuoteSource for CoinPaprikaSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn asset_class(&self) -> AssetClass {
        AssetClass::Crypto
    }

    #[instrument(skip(self, symbols), fields(source = SOURCE_NAME))]
    async fn fetch(&self, symbols: &[Symbol]) -> SourceResult {
        let url = format!("{}/v1/tickers", self.base_url);

        let response = self
            .http
            .get(&url)
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

        let tickers: Vec<Ticker> = response
            .json()
            .await
            .map_err(|e| SourceError::Malformed(e.to_string()))?;

        let wanted: std::collections::HashSet<&str> =
            symbols.iter().map(String::as_str).collect();
        let now = Utc::now();
        let mut quotes = HashMap::new();

        for ticker in tickers {
            if !wanted.contains(ticker.symbol.as_str()) {
                continue;
            }
            // Paprika lists duplicate symbols for forks; first wins,
            // which is the highest-ranked listing.
            if quotes.contains_key(&ticker.symbol) {
                continue;
            }
            let Some(price) = ticker.quotes.usd.price.and_then(Decimal::from_f64)
            else {
                continue;
            };
            // Provider reports a percentage; convert to an absolute
            // 24h delta against the current price.
            let change = ticker
                .quotes
                .usd
                .percent_change_24h
                .and_then(Decimal::from_f64)
                .map_or(Decimal::ZERO, |pct| {
                    (price * pct / Decimal::ONE_HUNDRED).round_dp(2)
                });

            quotes.insert(
                ticker.symbol.clone(),
                Quote {
                    symbol: ticker.symbol.clone(),
                    price,
                    change_24h: change,
                    volume_24h: ticker
                        .quotes
                        .usd
                        .volume_24h
                        .and_then(Decimal::from_f64),
                    market_cap: ticker
                        .quotes
                        .usd
                        .market_cap
                        .and_then(Decimal::from_f64),
                    observed_at: now,
                    source: SOURCE_NAME.to_string(),
                },
            );
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
