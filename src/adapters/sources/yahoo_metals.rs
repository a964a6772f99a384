//! Yahoo Metals Source - ETF-Proxy Metals Fallback
//!
//! Secondary rung for metals: approximates spot prices from metal
//! ETF charts (GLD/SLV/PPLT) scaled by a fixed per-metal factor. The
//! conversion is rough but keeps the feed moving when the dedicated
//! metals provider is down. One chart request per requested metal.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::Deserialize;
use tracing::{instrument, warn};

use crate::domain::feed::{AssetClass, Quote, Symbol};
use crate::ports::quote_source::{QuoteSource, SourceError, SourceResult};

pub const SOURCE_NAME: &str = "yahoo_metals";

/// ETF ticker and spot-price scale factor for a metal symbol.
fn etf_proxy(symbol: &str) -> Option<(&'static str, Decimal)> {
    match symbol {
        "XAU" => Some(("GLD", Decimal::TEN)),
        "XAG" => Some(("SLV", Decimal::from(50))),
        "XPT" => Some(("PPLT", Decimal::from(5))),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Vec<ChartItem>,
}

#[derive(Debug, Deserialize)]
struct ChartItem {
    meta: ChartMeta,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(alias = "regularMarketPrice")]
    regular_market_price: f64,
    #[serde(alias = "previousClose", alias = "chartPreviousClose")]
    previous_close: Option<f64>,
}

/// Yahoo Finance chart-API adapter for metal ETF proxies.
pub struct YahooMetalsSource {
    base_url: String,
    http: Client,
}

impl YahooMetalsSource {
    /// Create an adapter against the given base URL.
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("pricefeed-engine/0.4")
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn fetch_one(
        &self,
        symbol: &str,
        etf: &str,
        scale: Decimal,
    ) -> Result<Quote, SourceError> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, etf);

        let response = self.http.get(&url).send().await.map_err(request_error)?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => return Err(SourceError::RateLimited),
            status if !status.is_success() => {
                return Err(SourceError::Unavailable {
                    status: status.as_u16(),
                })
            }
            _ => {}
        }

        let payload: ChartResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Malformed(e.to_string()))?;

        let item = payload.chart.result.first().ok_or_else(|| {
            SourceError::Malformed(format!("no chart result for {etf}"))
        })?;

        let etf_price = Decimal::from_f64(item.meta.regular_market_price)
            .ok_or_else(|| {
                SourceError::Malformed(format!("bad price for {etf}"))
            })?;

        let change = item
            .meta
            .previous_close
            .and_then(Decimal::from_f64)
            .map_or(Decimal::ZERO, |prev| {
                ((etf_price - prev) * scale).round_dp(2)
            });

        Ok(Quote {
            symbol: symbol.to_string(),
            price: (etf_price * scale).round_dp(2),
            change_24h: change,
            volume_24h: None,
            market_cap: None,
            observed_at: Utc::now(),
            source: SOURCE_NAME.to_string(),
        })
    }
}

#[async_trait]
impl QuoteSource for YahooMetalsSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn asset_class(&self) -> AssetClass {
        AssetClass::Metal
    }

    #[instrument(skip(self, symbols), fields(source = SOURCE_NAME))]
    async fn fetch(&self, symbols: &[Symbol]) -> SourceResult {
        let mut quotes = HashMap::new();
        let mut last_error = None;

        for symbol in symbols {
            let Some((etf, scale)) = etf_proxy(symbol) else {
                continue;
            };
            match self.fetch_one(symbol, etf, scale).await {
                Ok(quote) => {
                    quotes.insert(symbol.clone(), quote);
                }
                Err(e) => {
                    warn!(symbol = %symbol, etf, error = %e, "ETF chart fetch failed");
                    last_error = Some(e);
                }
            }
        }

        // Partial coverage is a success; a total miss surfaces the
        // last failure so the chain logs something meaningful.
        if quotes.is_empty() {
            if let Some(e) = last_error {
                return Err(e);
            }
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
