// =============================================================================
// IndicatorSet: every indicator value for the latest candle of a series
// =============================================================================
//
// An indicator whose history requirement is unmet is `None` and is omitted
// from the serialised form.  It is never replaced by a zero placeholder.
// =============================================================================

use serde::{Deserialize, Serialize};

use super::bollinger::{self, calculate_bollinger, BollingerBands};
use super::macd::{self, calculate_macd, MacdResult};
use super::rsi::current_rsi;
use super::sma::calculate_sma;
use crate::market_data::CandleSeries;

pub const RSI_PERIOD: usize = 14;
pub const SMA_SHORT_PERIOD: usize = 14;
pub const SMA_LONG_PERIOD: usize = 20;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorSet {
    /// Close of the candle the set was computed for.  Internal only: the
    /// report carries the price separately.
    #[serde(skip)]
    pub close: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsi_14: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sma_14: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sma_20: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macd: Option<MacdResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bollinger_bands: Option<BollingerBands>,
}

impl IndicatorSet {
    /// Compute every indicator over `closes` (oldest first).
    pub fn from_closes(closes: &[f64]) -> Self {
        Self {
            close: closes.last().copied(),
            rsi_14: current_rsi(closes, RSI_PERIOD),
            sma_14: calculate_sma(closes, SMA_SHORT_PERIOD),
            sma_20: calculate_sma(closes, SMA_LONG_PERIOD),
            macd: calculate_macd(
                closes,
                macd::DEFAULT_FAST,
                macd::DEFAULT_SLOW,
                macd::DEFAULT_SIGNAL,
            ),
            bollinger_bands: calculate_bollinger(
                closes,
                bollinger::DEFAULT_PERIOD,
                bollinger::DEFAULT_NUM_STD,
            ),
        }
    }

    /// Indicators for the latest candle and the one before it.  The previous
    /// set is `None` for a single-candle series.
    pub fn compute_with_previous(series: &CandleSeries) -> (Self, Option<Self>) {
        let closes = series.closes();
        let current = Self::from_closes(&closes);
        let previous = match closes.len() {
            0 | 1 => None,
            n => Some(Self::from_closes(&closes[..n - 1])),
        };
        (current, previous)
    }

    /// Number of indicators present (the `close` field is not counted).
    pub fn available(&self) -> usize {
        [
            self.rsi_14.is_some(),
            self.sma_14.is_some(),
            self.sma_20.is_some(),
            self.macd.is_some(),
            self.bollinger_bands.is_some(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count()
    }
}
