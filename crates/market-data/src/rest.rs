// In crates/market-data/src/rest.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use core_types::{Snapshot, Symbol};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use ta::Next;
use ta::indicators::{ExponentialMovingAverage as Ema, RelativeStrengthIndex as Rsi};
use tracing::debug;

use crate::{Error, MarketDataProvider, MarketDataSettings, Result};

const FAST_EMA_PERIOD: usize = 20;
const SLOW_EMA_PERIOD: usize = 50;
const RSI_PERIOD: usize = 14;

/// Snapshots from a Binance-style public REST API: book ticker for prices,
/// recent klines for the indicator set.
pub struct RestMarketData {
    client: reqwest::Client,
    settings: MarketDataSettings,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookTicker {
    bid_price: String,
    ask_price: String,
}

impl RestMarketData {
    pub fn new(settings: MarketDataSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
        }
    }

    async fn fetch_book_ticker(&self, symbol: &Symbol) -> Result<(Decimal, Decimal)> {
        let url = format!(
            "{}/api/v3/ticker/bookTicker?symbol={}",
            self.settings.base_url, symbol
        );
        let ticker = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<BookTicker>()
            .await?;

        let bid = ticker
            .bid_price
            .parse::<Decimal>()
            .map_err(|e| Error::MalformedResponse(format!("bid price: {e}")))?;
        let ask = ticker
            .ask_price
            .parse::<Decimal>()
            .map_err(|e| Error::MalformedResponse(format!("ask price: {e}")))?;
        Ok((bid, ask))
    }

    async fn fetch_closes(&self, symbol: &Symbol) -> Result<Vec<f64>> {
        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.settings.base_url, symbol, self.settings.kline_interval, self.settings.kline_limit
        );
        let rows = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<Vec<Value>>>()
            .await?;

        // Kline rows are positional arrays; index 4 is the close, as a string.
        rows.iter()
            .map(|row| {
                row.get(4)
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse::<f64>().ok())
                    .ok_or_else(|| Error::MalformedResponse("kline close field".to_string()))
            })
            .collect()
    }
}

#[async_trait]
impl MarketDataProvider for RestMarketData {
    async fn fetch_snapshot(&self, symbol: &Symbol) -> Result<Snapshot> {
        let (bid, ask) = self.fetch_book_ticker(symbol).await?;
        let closes = self.fetch_closes(symbol).await?;
        let indicators = compute_indicators(&closes)?;

        let price = (bid + ask) / Decimal::TWO;
        debug!(symbol = %symbol, %price, indicators = indicators.len(), "Snapshot fetched");

        Ok(Snapshot {
            symbol: symbol.clone(),
            timestamp_ms: Utc::now().timestamp_millis(),
            price,
            bid,
            ask,
            indicators,
        })
    }
}

/// Run the close series through the indicator set. With fewer closes than the
/// slowest period the map comes back empty and the oracle sees "no data".
fn compute_indicators(closes: &[f64]) -> Result<HashMap<String, f64>> {
    let mut indicators = HashMap::new();
    if closes.len() < SLOW_EMA_PERIOD {
        return Ok(indicators);
    }

    let mut fast = Ema::new(FAST_EMA_PERIOD).map_err(|e| Error::Indicator(e.to_string()))?;
    let mut slow = Ema::new(SLOW_EMA_PERIOD).map_err(|e| Error::Indicator(e.to_string()))?;
    let mut rsi = Rsi::new(RSI_PERIOD).map_err(|e| Error::Indicator(e.to_string()))?;

    let (mut fast_val, mut slow_val, mut rsi_val) = (0.0, 0.0, 50.0);
    for close in closes {
        fast_val = fast.next(*close);
        slow_val = slow.next(*close);
        rsi_val = rsi.next(*close);
    }

    indicators.insert("ema_20".to_string(), fast_val);
    indicators.insert("ema_50".to_string(), slow_val);
    indicators.insert("rsi_14".to_string(), rsi_val);
    Ok(indicators)
}
