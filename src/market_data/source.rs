// =============================================================================
// Market data capability consumed by the analysis core
// =============================================================================
//
// The core never talks to a broker directly.  It asks a `MarketDataSource`
// for raw candles and the last traded price, and treats any failure as
// `SourceError::Unavailable`.
//
// `DemoMarketData` synthesises a deterministic daily random walk per symbol so
// the service runs end-to-end without broker credentials.
// =============================================================================

use async_trait::async_trait;
use chrono::Utc;

use crate::error::SourceError;
use crate::market_data::RawCandle;

/// Source of historical candles and last traded prices.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Daily candles covering the last `period_days` calendar days, in any
    /// order.
    async fn get_candles(
        &self,
        symbol: &str,
        exchange: &str,
        period_days: u32,
    ) -> Result<Vec<RawCandle>, SourceError>;

    /// Last traded price.
    async fn get_ltp(&self, symbol: &str, exchange: &str) -> Result<f64, SourceError>;
}

// =============================================================================
// DemoMarketData
// =============================================================================

const DAY_MS: i64 = 86_400_000;

/// Deterministic synthetic daily candles.  The same symbol always yields the
/// same price path for a given calendar day.
#[derive(Debug, Clone, Default)]
pub struct DemoMarketData;

impl DemoMarketData {
    pub fn new() -> Self {
        Self
    }

    /// FNV-1a over the upper-cased symbol; seeds the walk.
    fn seed(symbol: &str) -> u64 {
        symbol.to_uppercase().bytes().fold(0xcbf2_9ce4_8422_2325_u64, |h, b| {
            (h ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
        })
    }

    /// Generate `days` candles ending at `end_day_ms` (midnight UTC).
    ///
    /// The walk runs backwards from the latest close, so the most recent `k`
    /// candles are identical whatever `days` is requested.
    fn generate(symbol: &str, days: u32, end_day_ms: i64) -> Vec<RawCandle> {
        let mut state = Self::seed(symbol);
        let mut next_unit = move || {
            // xorshift64*
            state ^= state >> 12;
            state ^= state << 25;
            state ^= state >> 27;
            let bits = state.wrapping_mul(0x2545_f491_4f6c_dd1d) >> 11;
            bits as f64 / (1u64 << 53) as f64
        };

        let mut close = 100.0 + next_unit() * 2_400.0;
        let mut candles = Vec::with_capacity(days as usize);

        for back in 0..days {
            let drift = (next_unit() - 0.5) * 0.04;
            let open = close / (1.0 + drift);
            let wick = open.max(close) * next_unit() * 0.01;
            let tail = open.min(close) * next_unit() * 0.01;
            let volume = 50_000.0 + next_unit() * 950_000.0;
            candles.push(RawCandle::new(
                end_day_ms - i64::from(back) * DAY_MS,
                open,
                open.max(close) + wick,
                open.min(close) - tail,
                close,
                volume.round(),
            ));
            close = open;
        }

        candles.reverse();
        candles
    }

    fn today_ms() -> i64 {
        let ms = Utc::now().timestamp_millis();
        ms - ms.rem_euclid(DAY_MS)
    }
}

#[async_trait]
impl MarketDataSource for DemoMarketData {
    async fn get_candles(
        &self,
        symbol: &str,
        _exchange: &str,
        period_days: u32,
    ) -> Result<Vec<RawCandle>, SourceError> {
        if symbol.trim().is_empty() {
            return Err(SourceError::Unavailable("empty symbol".to_string()));
        }
        Ok(Self::generate(symbol, period_days, Self::today_ms()))
    }

    async fn get_ltp(&self, symbol: &str, exchange: &str) -> Result<f64, SourceError> {
        let candles = self.get_candles(symbol, exchange, 1).await?;
        candles
            .last()
            .map(|c| c.close)
            .ok_or_else(|| SourceError::Unavailable(format!("no LTP for {symbol}@{exchange}")))
    }
}
