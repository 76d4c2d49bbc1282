// =============================================================================
// Candle series: validated, time-ordered OHLCV input for every indicator
// =============================================================================
//
// Raw records arrive from a `MarketDataSource` in whatever order the broker
// returned them.  `CandleSeries::from_raw` validates each record, sorts by
// timestamp and rejects duplicate timestamps outright (they are never merged).
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Relative slack allowed when checking that high/low enclose open/close.
/// Brokers occasionally round the extremes to a coarser tick than the body.
const RANGE_TOLERANCE: f64 = 1e-6;

/// Unvalidated candle as delivered by a market data source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawCandle {
    /// Candle open time, UNIX milliseconds.
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl RawCandle {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

/// A single validated OHLCV candle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Validate a raw record.  `index` is the record's position in the input
    /// and only used for error reporting.
    fn validate(index: usize, raw: &RawCandle) -> Result<Self, AnalysisError> {
        let malformed = |reason: String| AnalysisError::MalformedCandle { index, reason };

        let prices = [
            ("open", raw.open),
            ("high", raw.high),
            ("low", raw.low),
            ("close", raw.close),
        ];
        for (name, value) in prices {
            if !value.is_finite() || value <= 0.0 {
                return Err(malformed(format!("{name} must be positive, got {value}")));
            }
        }
        if !raw.volume.is_finite() || raw.volume < 0.0 {
            return Err(malformed(format!(
                "volume must be non-negative, got {}",
                raw.volume
            )));
        }
        if raw.high < raw.low {
            return Err(malformed(format!(
                "high {} is below low {}",
                raw.high, raw.low
            )));
        }

        let body_top = raw.open.max(raw.close);
        let body_bottom = raw.open.min(raw.close);
        let slack = body_top * RANGE_TOLERANCE;
        if raw.high + slack < body_top {
            return Err(malformed(format!(
                "high {} is below candle body top {}",
                raw.high, body_top
            )));
        }
        if raw.low - slack > body_bottom {
            return Err(malformed(format!(
                "low {} is above candle body bottom {}",
                raw.low, body_bottom
            )));
        }

        Ok(Self {
            timestamp: raw.timestamp,
            open: raw.open,
            high: raw.high,
            low: raw.low,
            close: raw.close,
            volume: raw.volume,
        })
    }
}

/// Immutable, ascending-by-timestamp candle sequence with unique timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct CandleSeries {
    candles: Vec<Candle>,
}

impl CandleSeries {
    /// Validate, sort and de-duplicate-check raw candles.
    ///
    /// # Errors
    /// - [`AnalysisError::MalformedCandle`] for the first invalid record (by
    ///   input position).
    /// - [`AnalysisError::DuplicateTimestamp`] if two records share a
    ///   timestamp.
    pub fn from_raw(raw: &[RawCandle]) -> Result<Self, AnalysisError> {
        let mut candles = raw
            .iter()
            .enumerate()
            .map(|(i, r)| Candle::validate(i, r))
            .collect::<Result<Vec<_>, _>>()?;

        candles.sort_by_key(|c| c.timestamp);

        if let Some(pair) = candles.windows(2).find(|w| w[0].timestamp == w[1].timestamp) {
            return Err(AnalysisError::DuplicateTimestamp {
                timestamp: pair[0].timestamp,
            });
        }

        Ok(Self { candles })
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// Close prices, oldest first.
    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }
}
