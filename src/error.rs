// =============================================================================
// Error taxonomy for the analysis core
// =============================================================================
//
// Insufficient history for an indicator is NOT an error: the indicator is
// simply absent from the `IndicatorSet`.  Only the conditions below surface
// to callers.
// =============================================================================

use thiserror::Error;

/// Failures raised by candle normalisation, the symbol analyzer and the
/// watchlist aggregator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// A raw candle failed validation (bad prices, inverted range, ...).
    #[error("malformed candle at index {index}: {reason}")]
    MalformedCandle { index: usize, reason: String },

    /// Two candles in one series share a timestamp.
    #[error("duplicate candle timestamp {timestamp}")]
    DuplicateTimestamp { timestamp: i64 },

    /// The market data source could not supply data (upstream failure or
    /// timeout).
    #[error("data unavailable for {symbol} on {exchange}: {reason}")]
    DataUnavailable {
        symbol: String,
        exchange: String,
        reason: String,
    },

    /// `analyze_watchlist` was called with no symbols.
    #[error("watchlist is empty")]
    EmptyWatchlist,
}

impl AnalysisError {
    /// Stable machine-readable code used in API payloads and the error log.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedCandle { .. } => "MALFORMED_CANDLE",
            Self::DuplicateTimestamp { .. } => "DUPLICATE_TIMESTAMP",
            Self::DataUnavailable { .. } => "DATA_UNAVAILABLE",
            Self::EmptyWatchlist => "EMPTY_WATCHLIST",
        }
    }
}

/// Failure reported by a [`MarketDataSource`](crate::market_data::MarketDataSource)
/// implementation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    #[error("market data unavailable: {0}")]
    Unavailable(String),
}
