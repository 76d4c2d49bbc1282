// =============================================================================
// Application Configuration
// =============================================================================
//
// Every broker URL, credential and tunable lives in `AppConfig` and is handed
// to collaborators at construction time.  Nothing reads process-wide mutable
// state after startup.
//
// All fields carry serde defaults so a partial (or empty) JSON file loads.
// Environment variables override the file for secrets and deployment knobs.
// =============================================================================

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_base_url() -> String {
    "https://apiconnect.angelbroking.com".to_string()
}

fn default_candle_path() -> String {
    "/rest/secure/angelbroking/historical/v1/getCandleData".to_string()
}

fn default_ltp_path() -> String {
    "/rest/secure/angelbroking/order/v1/getLTP".to_string()
}

fn default_candle_interval() -> String {
    "ONE_DAY".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_session_secret() -> String {
    "change-me-in-production".to_string()
}

fn default_expiration_hours() -> u64 {
    24
}

fn default_demo_username() -> String {
    "demo_user".to_string()
}

fn default_demo_pin() -> String {
    "1234".to_string()
}

fn default_exchange() -> String {
    "NSE".to_string()
}

fn default_period_days() -> u32 {
    90
}

fn default_fetch_timeout_ms() -> u64 {
    8_000
}

fn default_max_concurrency() -> usize {
    8
}

fn default_rsi_oversold() -> f64 {
    30.0
}

fn default_rsi_overbought() -> f64 {
    70.0
}

fn default_watchlist() -> Vec<String> {
    vec![
        "RELIANCE".to_string(),
        "TCS".to_string(),
        "INFY".to_string(),
        "HDFCBANK".to_string(),
        "ICICIBANK".to_string(),
    ]
}

fn default_symbol_directory() -> Vec<SymbolInfo> {
    [
        ("RELIANCE", "Reliance Industries"),
        ("TCS", "Tata Consultancy Services"),
        ("INFY", "Infosys"),
        ("HDFCBANK", "HDFC Bank"),
        ("ICICIBANK", "ICICI Bank"),
        ("SBIN", "State Bank of India"),
        ("BHARTIARTL", "Bharti Airtel"),
        ("ITC", "ITC"),
        ("HINDUNILVR", "Hindustan Unilever"),
        ("KOTAKBANK", "Kotak Mahindra Bank"),
        ("LT", "Larsen & Toubro"),
        ("TATAMOTORS", "Tata Motors"),
    ]
    .into_iter()
    .map(|(symbol, name)| SymbolInfo {
        symbol: symbol.to_string(),
        name: name.to_string(),
        exchange: default_exchange(),
    })
    .collect()
}

fn default_bind_addr() -> String {
    "0.0.0.0:8001".to_string()
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://127.0.0.1:3000".to_string(),
    ]
}

// =============================================================================
// BrokerConfig
// =============================================================================

/// Connection settings for the broker's market data REST API.
#[derive(Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_candle_path")]
    pub candle_path: String,

    #[serde(default = "default_ltp_path")]
    pub ltp_path: String,

    /// Broker API key (`X-PrivateKey`).  Empty => demo market data.
    #[serde(default)]
    pub api_key: String,

    /// Broker client code, used for request attribution.
    #[serde(default)]
    pub client_code: String,

    /// Broker session JWT obtained by the (external) login flow.
    #[serde(default)]
    pub access_token: String,

    /// Broker candle interval name.
    #[serde(default = "default_candle_interval")]
    pub candle_interval: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Trading symbol -> broker instrument token.  Unmapped symbols are sent
    /// as-is.
    #[serde(default)]
    pub symbol_tokens: HashMap<String, String>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            candle_path: default_candle_path(),
            ltp_path: default_ltp_path(),
            api_key: String::new(),
            client_code: String::new(),
            access_token: String::new(),
            candle_interval: default_candle_interval(),
            request_timeout_secs: default_request_timeout_secs(),
            symbol_tokens: HashMap::new(),
        }
    }
}

impl BrokerConfig {
    /// Whether live broker credentials are present.
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.access_token.is_empty()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl std::fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("client_code", &self.client_code)
            .field("access_token", &"<redacted>")
            .field("candle_interval", &self.candle_interval)
            .finish()
    }
}

// =============================================================================
// SessionConfig
// =============================================================================

/// Bearer-session settings for the HTTP surface.
#[derive(Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// HMAC key for session tokens.
    #[serde(default = "default_session_secret")]
    pub secret: String,

    /// Fixed token lifetime.
    #[serde(default = "default_expiration_hours")]
    pub expiration_hours: u64,

    #[serde(default = "default_demo_username")]
    pub demo_username: String,

    #[serde(default = "default_demo_pin")]
    pub demo_pin: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: default_session_secret(),
            expiration_hours: default_expiration_hours(),
            demo_username: default_demo_username(),
            demo_pin: default_demo_pin(),
        }
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("secret", &"<redacted>")
            .field("expiration_hours", &self.expiration_hours)
            .field("demo_username", &self.demo_username)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// AnalysisConfig
// =============================================================================

/// Tunables for the analysis core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_exchange")]
    pub default_exchange: String,

    #[serde(default = "default_period_days")]
    pub default_period_days: u32,

    /// Upper bound on each individual upstream fetch.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Maximum concurrent symbol analyses within one watchlist call.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    #[serde(default = "default_rsi_oversold")]
    pub rsi_oversold: f64,

    #[serde(default = "default_rsi_overbought")]
    pub rsi_overbought: f64,

    /// Watchlist used when a request names no symbols.
    #[serde(default = "default_watchlist")]
    pub default_watchlist: Vec<String>,

    /// Instruments the search endpoint can find.
    #[serde(default = "default_symbol_directory")]
    pub symbol_directory: Vec<SymbolInfo>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            default_exchange: default_exchange(),
            default_period_days: default_period_days(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            max_concurrency: default_max_concurrency(),
            rsi_oversold: default_rsi_oversold(),
            rsi_overbought: default_rsi_overbought(),
            default_watchlist: default_watchlist(),
            symbol_directory: default_symbol_directory(),
        }
    }
}

impl AnalysisConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Directory entries whose symbol or name contains `query`, ignoring
    /// case.  Symbol-prefix matches come first; directory order is kept
    /// within each group.  A blank query matches nothing.
    pub fn search_symbols(&self, query: &str) -> Vec<&SymbolInfo> {
        let needle = query.trim().to_uppercase();
        if needle.is_empty() {
            return Vec::new();
        }

        let (mut prefixed, contained): (Vec<_>, Vec<_>) = self
            .symbol_directory
            .iter()
            .filter(|info| {
                info.symbol.to_uppercase().contains(&needle)
                    || info.name.to_uppercase().contains(&needle)
            })
            .partition(|info| info.symbol.to_uppercase().starts_with(&needle));
        prefixed.extend(contained);
        prefixed
    }
}

/// One searchable instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub symbol: String,
    pub name: String,
    #[serde(default = "default_exchange")]
    pub exchange: String,
}

// =============================================================================
// ServerConfig
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// CORS origins.  `"*"` allows any origin.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

// =============================================================================
// AppConfig
// =============================================================================

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub broker: BrokerConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

impl AppConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// A missing file is an error so the caller can fall back to defaults
    /// with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config from {}", path.display()))?;

        info!(
            path = %path.display(),
            exchange = %config.analysis.default_exchange,
            watchlist = ?config.analysis.default_watchlist,
            "config loaded"
        );

        Ok(config)
    }

    /// Apply overrides from `lookup` (normally `std::env::var`).
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("STOCK_SIGNAL_BIND_ADDR") {
            self.server.bind_addr = v;
        }
        if let Some(v) = non_empty("STOCK_SIGNAL_WATCHLIST") {
            self.analysis.default_watchlist = parse_symbols(&v);
        }
        if let Some(v) = non_empty("BROKER_API_KEY") {
            self.broker.api_key = v;
        }
        if let Some(v) = non_empty("BROKER_CLIENT_CODE") {
            self.broker.client_code = v;
        }
        if let Some(v) = non_empty("BROKER_ACCESS_TOKEN") {
            self.broker.access_token = v;
        }
        if let Some(v) = non_empty("SESSION_SECRET") {
            self.session.secret = v;
        }
    }
}

/// Split a comma-separated symbol list, trimming and upper-casing entries.
/// Order and duplicates are preserved.
pub fn parse_symbols(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}
