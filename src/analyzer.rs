// =============================================================================
// Symbol Analyzer: fetch, compute, evaluate, report
// =============================================================================
//
// Pipeline for one (symbol, exchange):
//   1. Fetch raw candles (bounded by `fetch_timeout`)
//   2. Normalise into a `CandleSeries`
//   3. Compute the current and previous `IndicatorSet`
//   4. Run the rule engine
//   5. Fetch the last traded price (falls back to the latest close)
//
// The candle series lives only for the duration of one call.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::AnalysisError;
use crate::indicators::IndicatorSet;
use crate::market_data::{CandleSeries, MarketDataSource};
use crate::signals::{SignalResult, SignalRuleEngine};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-symbol analysis result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolReport {
    pub symbol: String,
    pub exchange: String,
    pub current_price: f64,
    pub indicators: IndicatorSet,
    pub signals: SignalResult,
    /// Number of candles the indicators were computed from.
    pub data_points: usize,
    /// Requested look-back window in calendar days.
    pub analysis_period: u32,
    /// RFC 3339 timestamp of report creation.
    pub generated_at: String,
}

/// Runs the fetch → indicators → rules pipeline for a single symbol.
#[derive(Clone)]
pub struct SymbolAnalyzer {
    source: Arc<dyn MarketDataSource>,
    rules: SignalRuleEngine,
    fetch_timeout: Duration,
}

impl SymbolAnalyzer {
    pub fn new(source: Arc<dyn MarketDataSource>) -> Self {
        Self {
            source,
            rules: SignalRuleEngine::default(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_rules(mut self, rules: SignalRuleEngine) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    /// Analyse one symbol.
    ///
    /// # Errors
    /// - [`AnalysisError::DataUnavailable`] when the source fails, times out
    ///   or returns no candles.
    /// - [`AnalysisError::MalformedCandle`] / [`AnalysisError::DuplicateTimestamp`]
    ///   from candle normalisation.
    #[instrument(skip(self), name = "analyzer::analyze")]
    pub async fn analyze(
        &self,
        symbol: &str,
        exchange: &str,
        period_days: u32,
    ) -> Result<SymbolReport, AnalysisError> {
        let unavailable = |reason: String| AnalysisError::DataUnavailable {
            symbol: symbol.to_string(),
            exchange: exchange.to_string(),
            reason,
        };

        let raw = tokio::time::timeout(
            self.fetch_timeout,
            self.source.get_candles(symbol, exchange, period_days),
        )
        .await
        .map_err(|_| unavailable(format!("candle fetch timed out after {:?}", self.fetch_timeout)))?
        .map_err(|e| unavailable(e.to_string()))?;

        let series = CandleSeries::from_raw(&raw)?;
        let latest_close = match series.last() {
            Some(c) => c.close,
            None => return Err(unavailable("no candles returned".to_string())),
        };

        let (indicators, previous) = IndicatorSet::compute_with_previous(&series);
        let signals = self.rules.evaluate(&indicators, previous.as_ref());

        let current_price = match tokio::time::timeout(
            self.fetch_timeout,
            self.source.get_ltp(symbol, exchange),
        )
        .await
        {
            Ok(Ok(price)) if price.is_finite() && price > 0.0 => price,
            Ok(Ok(price)) => {
                warn!(symbol, exchange, price, "invalid LTP: using latest close");
                latest_close
            }
            Ok(Err(e)) => {
                warn!(symbol, exchange, error = %e, "LTP unavailable: using latest close");
                latest_close
            }
            Err(_) => {
                warn!(symbol, exchange, "LTP fetch timed out: using latest close");
                latest_close
            }
        };

        debug!(
            symbol,
            exchange,
            data_points = series.len(),
            indicators = indicators.available(),
            recommendation = %signals.recommendation,
            "symbol analysed"
        );

        Ok(SymbolReport {
            symbol: symbol.to_string(),
            exchange: exchange.to_string(),
            current_price,
            indicators,
            signals,
            data_points: series.len(),
            analysis_period: period_days,
            generated_at: chrono::Utc::now().to_rfc3339(),
        })
    }
}

impl std::fmt::Debug for SymbolAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolAnalyzer")
            .field("rules", &self.rules)
            .field("fetch_timeout", &self.fetch_timeout)
            .finish_non_exhaustive()
    }
}
