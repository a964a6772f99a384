//! Metals-API Source - Primary Precious Metals Provider
//!
//! Fetches spot rates for XAU/XAG/XPT/XPD against USD. The API
//! reports rates as troy ounces per USD, so the quoted price is the
//! reciprocal. No 24h change is available from this endpoint; the
//! reconcile step derives deltas against the stored feed instead.

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

pub const SOURCE_NAME: &str = "metals_api";

#[derive(Debug, Deserialize)]
struct RatesResponse {
    success: bool,
    #[serde(default)]
    rates: HashMap<String, f64>,
}

/// Metals-API HTTP adapter.
pub struct MetalsApiSource {
    base_url: String,
    access_key: String,
    http: Client,
}

impl MetalsApiSource {
    /// Create an adapter against the given base URL.
    pub fn new(
        base_url: &str,
        access_key: &str,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            access_key: access_key.to_string(),
            http,
        })
    }
}

#[async_trait]
impl QuoteSource for MetalsApiSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn asset_class(&self) -> AssetClass {
        AssetClass::Metal
    }

    #[instrument(skip(self, symbols), fields(source = SOURCE_NAME))]
    async fn fetch(&self, symbols: &[Symbol]) -> SourceResult {
        let url = format!("{}/api/latest", self.base_url);
        let wanted = symbols.join(",");

        let response = self
            .http
            .get(&url)
            .query(&[
                ("access_key", self.access_key.as_str()),
                ("base", "USD"),
                ("symbols", wanted.as_str()),
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

        let payload: RatesResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Malformed(e.to_string()))?;

        if !payload.success {
            return Err(SourceError::Malformed(
                "provider reported success=false".to_string(),
            ));
        }

        let now = Utc::now();
        let mut quotes = HashMap::new();

        for symbol in symbols {
            let Some(&rate) = payload.rates.get(symbol.as_str()) else {
                continue;
            };
            if rate <= 0.0 {
                debug!(symbol = %symbol, rate, "Non-positive rate, skipping");
                continue;
            }
            // Rate is oz-per-USD; invert to USD-per-oz.
            let Some(price) = Decimal::from_f64(1.0 / rate) else {
                continue;
            };
            quotes.insert(
                symbol.clone(),
                Quote {
                    symbol: symbol.clone(),
                    price: price.round_dp(2),
                    change_24h: Decimal::ZERO,
                    volume_24h: None,
                    market_cap: None,
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

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_server(status: u16, body: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/latest"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&server)
            .await;
        server
    }

    fn source(server: &MockServer) -> MetalsApiSource {
        MetalsApiSource::new(&server.uri(), "test-key", Duration::from_secs(5))
            .unwrap()
    }

    #[tokio::test]
    async fn test_rates_inverted_to_usd_per_ounce() {
        let body = r#"{"success": true, "rates": {"XAU": 0.0005, "XAG": 0.04}}"#;
        let server = mock_server(200, body).await;

        let quotes = source(&server)
            .fetch(&["XAU".to_string(), "XAG".to_string()])
            .await
            .unwrap();

        assert_eq!(quotes["XAU"].price, dec!(2000.00));
        assert_eq!(quotes["XAG"].price, dec!(25.00));
        assert_eq!(quotes["XAU"].change_24h, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_access_key_passed_as_query_param() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/latest"))
            .and(query_param("access_key", "test-key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"success": true, "rates": {"XAU": 0.0005}}"#),
            )
            .mount(&server)
            .await;

        let quotes = source(&server).fetch(&["XAU".to_string()]).await.unwrap();
        assert_eq!(quotes.len(), 1);
    }

    #[tokio::test]
    async fn test_success_false_is_malformed() {
        let body = r#"{"success": false, "rates": {}}"#;
        let server = mock_server(200, body).await;
        let err = source(&server)
            .fetch(&["XAU".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_zero_rate_skipped() {
        let body = r#"{"success": true, "rates": {"XAU": 0.0}}"#;
        let server = mock_server(200, body).await;
        let quotes = source(&server).fetch(&["XAU".to_string()]).await.unwrap();
        assert!(quotes.is_empty());
    }

    #[tokio::test]
    async fn test_server_error_maps_to_unavailable() {
        let server = mock_server(502, "").await;
        let err = source(&server)
            .fetch(&["XAU".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Unavailable { status: 502 }));
    }
}
