//! Quote Source Adapters - External Price Providers
//!
//! Concrete `QuoteSource` implementations, ordered into per-class
//! fallback chains by the wiring in `main`:
//! - Crypto: CoinGecko (primary), CoinPaprika (secondary)
//! - Metals: Metals-API (primary), Yahoo ETF proxies (secondary)
//! - Real estate: no real provider exists; the chain runs on the
//!   synthetic floor alone

pub mod coingecko;
pub mod coinpaprika;
pub mod metals_api;
pub mod yahoo_metals;

pub use coingecko::CoinGeckoSource;
pub use coinpaprika::CoinPaprikaSource;
pub use metals_api::MetalsApiSource;
pub use yahoo_metals::YahooMetalsSource;
