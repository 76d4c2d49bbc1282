// =============================================================================
// REST API Endpoints: Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`.  Health and login are public; every
// other endpoint requires a valid session via the `AuthBearer` extractor.
//
// Analysis errors map to status codes:
//   DataUnavailable                      => 502
//   MalformedCandle / DuplicateTimestamp => 422
//   EmptyWatchlist                       => 400
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Path, Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{debug, info, warn};

use crate::api::auth::AuthBearer;
use crate::analyzer::SymbolReport;
use crate::app_state::AppState;
use crate::config::{parse_symbols, ServerConfig, SymbolInfo};
use crate::error::AnalysisError;
use crate::session::SessionError;

/// Longest look-back a request may ask for.
const MAX_PERIOD_DAYS: u32 = 3650;

/// Cap on search results per request.
const MAX_SEARCH_RESULTS: usize = 20;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server);

    Router::new()
        // ── Public ──────────────────────────────────────────────────
        .route("/api/v1/health", get(health))
        .route("/api/v1/auth/login", post(login))
        // ── Authenticated ───────────────────────────────────────────
        .route("/api/v1/auth/logout", post(logout))
        .route("/api/v1/stocks/search", get(search_stocks))
        .route("/api/v1/stocks/ltp/:symbol", get(symbol_ltp))
        .route("/api/v1/stocks/signals/:symbol", get(symbol_signals))
        .route("/api/v1/stocks/watchlist", get(watchlist))
        .route("/api/v1/errors", get(recent_errors))
        // ── Middleware & State ───────────────────────────────────────
        .layer(cors)
        .with_state(state)
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if server.allowed_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = server
        .allowed_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

// =============================================================================
// Error responses
// =============================================================================

/// JSON error body with a stable machine-readable code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code,
            message: message.into(),
        }
    }
}

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        let status = match err {
            AnalysisError::DataUnavailable { .. } => StatusCode::BAD_GATEWAY,
            AnalysisError::MalformedCandle { .. } | AnalysisError::DuplicateTimestamp { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AnalysisError::EmptyWatchlist => StatusCode::BAD_REQUEST,
        };
        Self {
            status,
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            code: "UNAUTHORIZED",
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message,
            "code": self.code,
        });
        (self.status, Json(body)).into_response()
    }
}

/// Resolve the `period` query parameter against the configured default.
fn resolve_period(state: &AppState, period: Option<u32>) -> Result<u32, ApiError> {
    match period {
        None => Ok(state.config.analysis.default_period_days),
        Some(p) if (1..=MAX_PERIOD_DAYS).contains(&p) => Ok(p),
        Some(p) => Err(ApiError::bad_request(
            "INVALID_PERIOD",
            format!("period must be between 1 and {MAX_PERIOD_DAYS} days, got {p}"),
        )),
    }
}

fn resolve_exchange(state: &AppState, exchange: Option<String>) -> String {
    exchange
        .map(|e| e.trim().to_uppercase())
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| state.config.analysis.default_exchange.clone())
}

// =============================================================================
// Health (public)
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    demo_mode: bool,
    uptime_secs: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        demo_mode: state.demo_mode,
        uptime_secs: state.uptime_secs(),
        server_time: chrono::Utc::now().timestamp_millis(),
    })
}

// =============================================================================
// Sessions
// =============================================================================

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    pin: String,
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.session_guard.login(req.username.trim(), &req.pin)?;
    info!(username = %session.username, "login succeeded");
    Ok(Json(session))
}

#[derive(Serialize)]
struct LogoutResponse {
    message: &'static str,
    username: String,
}

async fn logout(
    auth: AuthBearer,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = state.session_guard.revoke(&auth.token)?;
    info!(username = %claims.username, "logout");
    Ok(Json(LogoutResponse {
        message: "Logged out",
        username: claims.username,
    }))
}

// =============================================================================
// Analysis (authenticated)
// =============================================================================

#[derive(Deserialize)]
struct SignalsQuery {
    exchange: Option<String>,
    period: Option<u32>,
}

async fn symbol_signals(
    auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(query): Query<SignalsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let period = resolve_period(&state, query.period)?;
    let exchange = resolve_exchange(&state, query.exchange);
    analyze_one(&state, &auth, &symbol, &exchange, period).await
}

#[derive(Deserialize)]
struct LtpQuery {
    exchange: Option<String>,
}

/// Current price with indicators and signals over the default period.
async fn symbol_ltp(
    auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(query): Query<LtpQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let period = state.config.analysis.default_period_days;
    let exchange = resolve_exchange(&state, query.exchange);
    analyze_one(&state, &auth, &symbol, &exchange, period).await
}

async fn analyze_one(
    state: &AppState,
    auth: &AuthBearer,
    symbol: &str,
    exchange: &str,
    period: u32,
) -> Result<Json<SymbolReport>, ApiError> {
    let symbol = symbol.trim().to_uppercase();
    debug!(user = %auth.claims.username, symbol = %symbol, exchange, period, "analysis requested");

    match state.analyzer().analyze(&symbol, exchange, period).await {
        Ok(report) => Ok(Json(report)),
        Err(e) => {
            warn!(symbol = %symbol, exchange, error = %e, "analysis failed");
            state.push_error(e.to_string(), Some(e.code()), Some(&symbol));
            Err(e.into())
        }
    }
}

#[derive(Deserialize)]
struct WatchlistQuery {
    /// Comma-separated symbols; absent => configured default watchlist.
    symbols: Option<String>,
    exchange: Option<String>,
    period: Option<u32>,
}

async fn watchlist(
    auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Query(query): Query<WatchlistQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let symbols = match query.symbols.as_deref() {
        Some(raw) => parse_symbols(raw),
        None => state.config.analysis.default_watchlist.clone(),
    };
    let exchange = resolve_exchange(&state, query.exchange);
    let period = resolve_period(&state, query.period)?;
    debug!(user = %auth.claims.username, count = symbols.len(), exchange = %exchange, "watchlist requested");

    let report = state
        .aggregator
        .analyze_symbols(&symbols, &exchange, period)
        .await?;

    for entry in report.failures() {
        if let Some(err) = entry.error() {
            state.push_error(err.message.clone(), Some(err.code.as_str()), Some(entry.symbol()));
        }
    }
    for entry in &report.entries {
        if let Some(r) = entry.report() {
            debug!(
                symbol = entry.symbol(),
                exchange = entry.exchange(),
                recommendation = %r.signals.recommendation,
                "watchlist entry"
            );
        }
    }

    Ok(Json(report))
}

// =============================================================================
// Symbol search (authenticated)
// =============================================================================

#[derive(Deserialize)]
struct SearchQuery {
    q: Option<String>,
}

#[derive(Serialize)]
struct SearchResponse {
    query: String,
    count: usize,
    results: Vec<SymbolInfo>,
}

async fn search_stocks(
    auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let q = query.q.unwrap_or_default().trim().to_string();
    if q.is_empty() {
        return Err(ApiError::bad_request("INVALID_QUERY", "query parameter `q` must not be blank"));
    }

    let results: Vec<SymbolInfo> = state
        .config
        .analysis
        .search_symbols(&q)
        .into_iter()
        .take(MAX_SEARCH_RESULTS)
        .cloned()
        .collect();
    debug!(user = %auth.claims.username, query = %q, hits = results.len(), "symbol search");

    Ok(Json(SearchResponse {
        query: q,
        count: results.len(),
        results,
    }))
}

// =============================================================================
// Error log (authenticated)
// =============================================================================

async fn recent_errors(
    auth: AuthBearer,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    debug!(user = %auth.claims.username, "error log requested");
    Json(state.recent_errors())
}

// =============================================================================
// Tests
// =============================================================================
