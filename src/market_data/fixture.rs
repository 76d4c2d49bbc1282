// =============================================================================
// StaticMarketData: fixed in-memory candles for unit and route tests
// =============================================================================

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::SourceError;
use crate::market_data::{MarketDataSource, RawCandle};

type Key = (String, String);

fn key(symbol: &str, exchange: &str) -> Key {
    (symbol.to_uppercase(), exchange.to_uppercase())
}

/// Fixed, in-memory candle store.  Unknown symbols are `Unavailable`.
#[derive(Debug, Clone, Default)]
pub struct StaticMarketData {
    candles: HashMap<Key, Vec<RawCandle>>,
    ltp: HashMap<Key, f64>,
    delays: HashMap<Key, Duration>,
}

impl StaticMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_candles(mut self, symbol: &str, exchange: &str, candles: Vec<RawCandle>) -> Self {
        self.candles.insert(key(symbol, exchange), candles);
        self
    }

    pub fn with_ltp(mut self, symbol: &str, exchange: &str, price: f64) -> Self {
        self.ltp.insert(key(symbol, exchange), price);
        self
    }

    /// Delay every candle fetch for this symbol (simulates a slow upstream).
    pub fn with_delay(mut self, symbol: &str, exchange: &str, delay: Duration) -> Self {
        self.delays.insert(key(symbol, exchange), delay);
        self
    }
}

#[async_trait]
impl MarketDataSource for StaticMarketData {
    async fn get_candles(
        &self,
        symbol: &str,
        exchange: &str,
        _period_days: u32,
    ) -> Result<Vec<RawCandle>, SourceError> {
        let k = key(symbol, exchange);
        if let Some(delay) = self.delays.get(&k) {
            tokio::time::sleep(*delay).await;
        }
        self.candles
            .get(&k)
            .cloned()
            .ok_or_else(|| SourceError::Unavailable(format!("no candles for {symbol}@{exchange}")))
    }

    async fn get_ltp(&self, symbol: &str, exchange: &str) -> Result<f64, SourceError> {
        self.ltp
            .get(&key(symbol, exchange))
            .copied()
            .ok_or_else(|| SourceError::Unavailable(format!("no LTP for {symbol}@{exchange}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_source_serves_registered_symbols_only() {
        let src = StaticMarketData::new()
            .with_candles("INFY", "NSE", vec![RawCandle::new(1, 10.0, 11.0, 9.0, 10.5, 5.0)])
            .with_ltp("INFY", "NSE", 10.7);

        assert_eq!(src.get_candles("infy", "nse", 30).await.unwrap().len(), 1);
        assert!((src.get_ltp("INFY", "NSE").await.unwrap() - 10.7).abs() < 1e-10);
        assert!(matches!(
            src.get_candles("TCS", "NSE", 30).await,
            Err(SourceError::Unavailable(_))
        ));
        assert!(src.get_ltp("TCS", "NSE").await.is_err());
    }
}
