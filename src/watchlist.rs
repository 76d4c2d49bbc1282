// =============================================================================
// Watchlist Aggregator: concurrent per-symbol analysis with failure isolation
// =============================================================================
//
// Each requested symbol becomes an independent task on a `JoinSet`, bounded
// by a semaphore.  Tasks return `(slot, outcome)` and the outcome is written
// into a pre-sized slot vector indexed by request position, so the report
// order always matches the request order regardless of completion order.
//
// A failing symbol produces an `error` entry; it never aborts its siblings.
// Dropping the returned future drops the `JoinSet`, which aborts every task
// still in flight.
// =============================================================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::analyzer::{SymbolAnalyzer, SymbolReport};
use crate::error::AnalysisError;
use crate::types::WatchlistStatus;

pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// One (symbol, exchange) pair to analyse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WatchlistRequest {
    pub symbol: String,
    pub exchange: String,
}

impl WatchlistRequest {
    pub fn new(symbol: impl Into<String>, exchange: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            exchange: exchange.into(),
        }
    }
}

/// Why a single symbol failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryError {
    pub code: String,
    pub message: String,
}

/// Result for one requested symbol.  Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    symbol: String,
    exchange: String,
    status: WatchlistStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<SymbolReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<EntryError>,
}

impl WatchlistEntry {
    fn success(report: SymbolReport) -> Self {
        Self {
            symbol: report.symbol.clone(),
            exchange: report.exchange.clone(),
            status: WatchlistStatus::Success,
            report: Some(report),
            error: None,
        }
    }

    fn failure(request: &WatchlistRequest, code: &str, message: String) -> Self {
        Self {
            symbol: request.symbol.clone(),
            exchange: request.exchange.clone(),
            status: WatchlistStatus::Error,
            report: None,
            error: Some(EntryError {
                code: code.to_string(),
                message,
            }),
        }
    }

    fn from_outcome(request: &WatchlistRequest, outcome: Result<SymbolReport, AnalysisError>) -> Self {
        match outcome {
            Ok(report) => Self::success(report),
            Err(e) => Self::failure(request, e.code(), e.to_string()),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    pub fn status(&self) -> WatchlistStatus {
        self.status
    }

    pub fn report(&self) -> Option<&SymbolReport> {
        self.report.as_ref()
    }

    pub fn error(&self) -> Option<&EntryError> {
        self.error.as_ref()
    }
}

/// Aggregate result, one entry per requested symbol in request order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistReport {
    pub id: String,
    pub total_symbols: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub analysis_period: u32,
    pub generated_at: String,
    pub entries: Vec<WatchlistEntry>,
}

impl WatchlistReport {
    fn new(entries: Vec<WatchlistEntry>, analysis_period: u32) -> Self {
        let succeeded = entries
            .iter()
            .filter(|e| e.status() == WatchlistStatus::Success)
            .count();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            total_symbols: entries.len(),
            succeeded,
            failed: entries.len() - succeeded,
            analysis_period,
            generated_at: chrono::Utc::now().to_rfc3339(),
            entries,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &WatchlistEntry> {
        self.entries
            .iter()
            .filter(|e| e.status() == WatchlistStatus::Error)
    }
}

/// Runs [`SymbolAnalyzer`] over many symbols concurrently.
#[derive(Debug, Clone)]
pub struct WatchlistAggregator {
    analyzer: SymbolAnalyzer,
    max_concurrency: usize,
}

impl WatchlistAggregator {
    pub fn new(analyzer: SymbolAnalyzer) -> Self {
        Self {
            analyzer,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Cap on simultaneously running analyses (minimum 1).
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn analyzer(&self) -> &SymbolAnalyzer {
        &self.analyzer
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Analyse every symbol on a single exchange.
    pub async fn analyze_symbols(
        &self,
        symbols: &[String],
        exchange: &str,
        period_days: u32,
    ) -> Result<WatchlistReport, AnalysisError> {
        let requests: Vec<WatchlistRequest> = symbols
            .iter()
            .map(|s| WatchlistRequest::new(s.clone(), exchange))
            .collect();
        self.analyze_watchlist(&requests, period_days).await
    }

    /// Analyse every request concurrently.
    ///
    /// # Errors
    /// Only [`AnalysisError::EmptyWatchlist`]; per-symbol failures are
    /// reported inside the matching entry.
    pub async fn analyze_watchlist(
        &self,
        requests: &[WatchlistRequest],
        period_days: u32,
    ) -> Result<WatchlistReport, AnalysisError> {
        if requests.is_empty() {
            return Err(AnalysisError::EmptyWatchlist);
        }

        let limiter = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();

        for (slot, request) in requests.iter().cloned().enumerate() {
            let analyzer = self.analyzer.clone();
            let limiter = limiter.clone();
            tasks.spawn(async move {
                let _permit = limiter.acquire_owned().await.ok();
                let outcome = analyzer
                    .analyze(&request.symbol, &request.exchange, period_days)
                    .await;
                (slot, outcome)
            });
        }

        let mut slots: Vec<Option<WatchlistEntry>> = vec![None; requests.len()];

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((slot, outcome)) => {
                    let request = &requests[slot];
                    if let Err(e) = &outcome {
                        warn!(
                            symbol = %request.symbol,
                            exchange = %request.exchange,
                            error = %e,
                            "watchlist symbol failed"
                        );
                    }
                    slots[slot] = Some(WatchlistEntry::from_outcome(request, outcome));
                }
                Err(e) => {
                    // The slot of a panicked task stays empty and is filled below.
                    warn!(error = %e, "watchlist task did not complete");
                }
            }
        }

        let entries: Vec<WatchlistEntry> = slots
            .into_iter()
            .zip(requests)
            .map(|(slot, request)| {
                slot.unwrap_or_else(|| {
                    WatchlistEntry::failure(
                        request,
                        "TASK_FAILED",
                        format!("analysis of {} did not complete", request.symbol),
                    )
                })
            })
            .collect();

        let report = WatchlistReport::new(entries, period_days);
        info!(
            total = report.total_symbols,
            succeeded = report.succeeded,
            failed = report.failed,
            "watchlist analysed"
        );
        debug!(id = %report.id, "watchlist report assembled");

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    use async_trait::async_trait;

    use super::*;
    use crate::analyzer::tests::{candles_from_closes, rising};
    use crate::error::SourceError;
    use crate::market_data::{MarketDataSource, RawCandle, StaticMarketData};

    fn aggregator(source: impl MarketDataSource + 'static) -> WatchlistAggregator {
        WatchlistAggregator::new(SymbolAnalyzer::new(Arc::new(source)))
    }

    fn requests(symbols: &[&str]) -> Vec<WatchlistRequest> {
        symbols.iter().map(|s| WatchlistRequest::new(*s, "NSE")).collect()
    }

    fn entry<'a>(report: &'a WatchlistReport, symbol: &str) -> &'a WatchlistEntry {
        report.entries.iter().find(|e| e.symbol() == symbol).unwrap()
    }

    #[tokio::test]
    async fn empty_watchlist_fails() {
        let err = aggregator(StaticMarketData::new())
            .analyze_watchlist(&[], 30)
            .await
            .unwrap_err();
        assert_eq!(err, AnalysisError::EmptyWatchlist);
    }

    #[tokio::test]
    async fn one_failure_does_not_affect_siblings() {
        let source = StaticMarketData::new()
            .with_candles("A", "NSE", candles_from_closes(&rising(40)))
            .with_ltp("A", "NSE", 200.0)
            .with_candles("C", "NSE", candles_from_closes(&rising(40)))
            .with_ltp("C", "NSE", 200.0);
        let agg = aggregator(source);

        let report = agg.analyze_watchlist(&requests(&["A", "B", "C"]), 60).await.unwrap();
        assert_eq!(report.total_symbols, 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);

        let order: Vec<&str> = report.entries.iter().map(|e| e.symbol()).collect();
        assert_eq!(order, vec!["A", "B", "C"]);

        let b = &report.entries[1];
        assert_eq!(b.status(), WatchlistStatus::Error);
        assert!(b.report().is_none());
        assert_eq!(b.error().unwrap().code, "DATA_UNAVAILABLE");

        // A and C match a standalone analysis of the same data.
        let solo = agg.analyzer().analyze("A", "NSE", 60).await.unwrap();
        for entry in [&report.entries[0], &report.entries[2]] {
            assert_eq!(entry.status(), WatchlistStatus::Success);
            let r = entry.report().unwrap();
            assert_eq!(r.indicators, solo.indicators);
            assert_eq!(r.signals, solo.signals);
            assert_eq!(r.data_points, 40);
        }
        assert_eq!(report.failures().count(), 1);
    }

    #[tokio::test]
    async fn order_follows_request_not_completion() {
        let source = StaticMarketData::new()
            .with_candles("SLOW", "NSE", candles_from_closes(&rising(20)))
            .with_delay("SLOW", "NSE", Duration::from_millis(80))
            .with_candles("FAST", "NSE", candles_from_closes(&rising(20)));

        let report = aggregator(source)
            .analyze_watchlist(&requests(&["SLOW", "FAST"]), 30)
            .await
            .unwrap();
        assert_eq!(report.entries[0].symbol(), "SLOW");
        assert_eq!(report.entries[1].symbol(), "FAST");
        assert!(report.entries.iter().all(|e| e.status() == WatchlistStatus::Success));
    }

    #[tokio::test]
    async fn duplicates_are_kept() {
        let source =
            StaticMarketData::new().with_candles("TCS", "NSE", candles_from_closes(&rising(20)));
        let report = aggregator(source)
            .analyze_symbols(&["TCS".to_string(), "TCS".to_string()], "NSE", 30)
            .await
            .unwrap();
        assert_eq!(report.total_symbols, 2);
        assert_eq!(report.succeeded, 2);
        assert!(report.entries.iter().all(|e| e.symbol() == "TCS"));
    }

    #[tokio::test]
    async fn malformed_data_is_isolated() {
        let mut bad = candles_from_closes(&rising(20));
        bad[0].open = -1.0;
        let source = StaticMarketData::new()
            .with_candles("GOOD", "NSE", candles_from_closes(&rising(20)))
            .with_candles("BAD", "NSE", bad);

        let report = aggregator(source)
            .analyze_watchlist(&requests(&["BAD", "GOOD"]), 30)
            .await
            .unwrap();
        assert_eq!(report.entries[0].error().unwrap().code, "MALFORMED_CANDLE");
        assert_eq!(report.entries[1].status(), WatchlistStatus::Success);
    }

    #[tokio::test]
    async fn timeout_is_an_error_entry() {
        let source = StaticMarketData::new()
            .with_candles("HANG", "NSE", candles_from_closes(&rising(20)))
            .with_delay("HANG", "NSE", Duration::from_secs(5))
            .with_candles("OK", "NSE", candles_from_closes(&rising(20)));
        let analyzer =
            SymbolAnalyzer::new(Arc::new(source)).with_fetch_timeout(Duration::from_millis(30));

        let report = WatchlistAggregator::new(analyzer)
            .analyze_watchlist(&requests(&["HANG", "OK"]), 30)
            .await
            .unwrap();
        let hang = entry(&report, "HANG");
        assert_eq!(hang.status(), WatchlistStatus::Error);
        assert!(hang.error().unwrap().message.contains("timed out"));
        assert_eq!(entry(&report, "OK").status(), WatchlistStatus::Success);
    }

    #[tokio::test]
    async fn symbols_run_concurrently() {
        let mut source = StaticMarketData::new();
        for s in ["X", "Y", "Z"] {
            source = source
                .with_candles(s, "NSE", candles_from_closes(&rising(20)))
                .with_delay(s, "NSE", Duration::from_millis(300));
        }
        let started = Instant::now();
        let report = aggregator(source)
            .analyze_watchlist(&requests(&["X", "Y", "Z"]), 30)
            .await
            .unwrap();
        assert_eq!(report.succeeded, 3);
        assert!(started.elapsed() < Duration::from_millis(800));
    }

    /// Counts fetches that ran to completion.
    struct CountingSource {
        completed: Arc<AtomicUsize>,
        delay: Duration,
    }

    #[async_trait]
    impl MarketDataSource for CountingSource {
        async fn get_candles(
            &self,
            _symbol: &str,
            _exchange: &str,
            _period_days: u32,
        ) -> Result<Vec<RawCandle>, SourceError> {
            tokio::time::sleep(self.delay).await;
            self.completed.fetch_add(1, Ordering::SeqCst);
            Ok(candles_from_closes(&rising(20)))
        }

        async fn get_ltp(&self, _symbol: &str, _exchange: &str) -> Result<f64, SourceError> {
            Ok(100.0)
        }
    }

    #[tokio::test]
    async fn cancelling_the_call_aborts_pending_tasks() {
        let completed = Arc::new(AtomicUsize::new(0));
        let agg = aggregator(CountingSource {
            completed: completed.clone(),
            delay: Duration::from_millis(200),
        });

        let reqs = requests(&["P", "Q", "R"]);
        let cancelled =
            tokio::time::timeout(Duration::from_millis(20), agg.analyze_watchlist(&reqs, 30)).await;
        assert!(cancelled.is_err());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(completed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn concurrency_limit_of_one_still_completes() {
        let source = StaticMarketData::new()
            .with_candles("A", "NSE", candles_from_closes(&rising(20)))
            .with_candles("B", "NSE", candles_from_closes(&rising(20)));
        let report = aggregator(source)
            .with_max_concurrency(0)
            .analyze_watchlist(&requests(&["A", "B"]), 30)
            .await
            .unwrap();
        assert_eq!(report.succeeded, 2);
    }

    #[test]
    fn entry_serialises_status_and_payload() {
        let entry = WatchlistEntry::failure(
            &WatchlistRequest::new("INFY", "NSE"),
            "DATA_UNAVAILABLE",
            "upstream down".to_string(),
        );
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"]["message"], "upstream down");
        assert!(json.get("report").is_none());
    }
}
