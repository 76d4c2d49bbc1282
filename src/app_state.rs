// =============================================================================
// Central Application State: shared across all HTTP handlers
// =============================================================================
//
// `AppState` holds the immutable configuration, the watchlist aggregator (and
// through it the symbol analyzer and market data source), the session guard
// and a capped log of recent analysis failures.
//
// Thread safety:
//   - Analysis collaborators are immutable after construction.
//   - parking_lot::RwLock guards the only mutable collection.
// =============================================================================

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;

use crate::analyzer::SymbolAnalyzer;
use crate::config::AppConfig;
use crate::market_data::MarketDataSource;
use crate::session::SessionGuard;
use crate::signals::SignalRuleEngine;
use crate::watchlist::WatchlistAggregator;

// =============================================================================
// Error Record
// =============================================================================

/// A recorded failure for the `/errors` log.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    /// Human-readable error message.
    pub message: String,
    /// Machine-readable error code (e.g. `DATA_UNAVAILABLE`).
    pub code: Option<String>,
    /// Symbol the failure relates to, if any.
    pub symbol: Option<String>,
    /// ISO 8601 timestamp.
    pub at: String,
}

// =============================================================================
// AppState
// =============================================================================

/// Maximum number of recent errors to retain.
pub const MAX_RECENT_ERRORS: usize = 50;

/// Central application state shared across all handlers via `Arc<AppState>`.
pub struct AppState {
    pub config: AppConfig,
    pub aggregator: WatchlistAggregator,
    pub session_guard: SessionGuard,
    /// Whether market data comes from the synthetic demo source.
    pub demo_mode: bool,
    pub recent_errors: RwLock<Vec<ErrorRecord>>,
    pub start_time: Instant,
}

impl AppState {
    /// Wire the analysis stack from `config` on top of `source`.
    pub fn new(config: AppConfig, source: Arc<dyn MarketDataSource>, demo_mode: bool) -> Self {
        let analysis = &config.analysis;
        let analyzer = SymbolAnalyzer::new(source)
            .with_rules(SignalRuleEngine::new(analysis.rsi_oversold, analysis.rsi_overbought))
            .with_fetch_timeout(analysis.fetch_timeout());
        let aggregator = WatchlistAggregator::new(analyzer).with_max_concurrency(analysis.max_concurrency);
        let session_guard = SessionGuard::new(&config.session);

        Self {
            config,
            aggregator,
            session_guard,
            demo_mode,
            recent_errors: RwLock::new(Vec::new()),
            start_time: Instant::now(),
        }
    }

    pub fn analyzer(&self) -> &SymbolAnalyzer {
        self.aggregator.analyzer()
    }

    // ── Error Logging ───────────────────────────────────────────────────

    /// Record an error.  The ring buffer is capped at [`MAX_RECENT_ERRORS`];
    /// oldest entries are evicted first.
    pub fn push_error(&self, message: String, code: Option<&str>, symbol: Option<&str>) {
        let record = ErrorRecord {
            message,
            code: code.map(str::to_string),
            symbol: symbol.map(str::to_string),
            at: Utc::now().to_rfc3339(),
        };

        let mut errors = self.recent_errors.write();
        errors.push(record);
        if errors.len() > MAX_RECENT_ERRORS {
            let excess = errors.len() - MAX_RECENT_ERRORS;
            errors.drain(..excess);
        }
    }

    /// Most recent errors, newest last.
    pub fn recent_errors(&self) -> Vec<ErrorRecord> {
        self.recent_errors.read().clone()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("aggregator", &self.aggregator)
            .field("demo_mode", &self.demo_mode)
            .finish_non_exhaustive()
    }
}
