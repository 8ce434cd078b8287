// In crates/market-data/src/lib.rs

//! Market data boundary. The agent consumes normalized [`Snapshot`]s through
//! the [`MarketDataProvider`] trait; a fetch failure turns that symbol's cycle
//! into a no-op, never into a crash.

pub mod error;
pub mod rest;

use async_trait::async_trait;
use core_types::{Snapshot, Symbol};
use serde::Deserialize;

pub use error::{Error, Result};
pub use rest::RestMarketData;

#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn fetch_snapshot(&self, symbol: &Symbol) -> Result<Snapshot>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketDataSettings {
    /// Exchange REST endpoint, e.g. "https://api.binance.com".
    pub base_url: String,
    /// Candle interval used for indicator computation.
    #[serde(default = "default_interval")]
    pub kline_interval: String,
    #[serde(default = "default_kline_limit")]
    pub kline_limit: u32,
}

fn default_interval() -> String {
    "1h".to_string()
}

fn default_kline_limit() -> u32 {
    100
}
