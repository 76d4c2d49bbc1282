// =============================================================================
// Broker REST Client: SmartAPI-style historical candles and LTP
// =============================================================================
//
// SECURITY: The API key and session JWT are never logged or serialized.  Both
// are sent as headers on every request.
//
// All HTTP and parsing failures are `anyhow` internally and collapse to
// `SourceError::Unavailable` at the `MarketDataSource` boundary.
// =============================================================================

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::config::BrokerConfig;
use crate::error::SourceError;
use crate::market_data::{MarketDataSource, RawCandle};

/// Timestamp format expected in `fromdate` / `todate`.
const BROKER_DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Broker timestamps are exchange-local (IST).
const IST_OFFSET_SECS: i64 = 5 * 3600 + 30 * 60;

#[derive(Debug, Serialize)]
struct CandleRequest<'a> {
    exchange: &'a str,
    symboltoken: &'a str,
    interval: &'a str,
    fromdate: String,
    todate: String,
}

#[derive(Debug, Serialize)]
struct LtpRequest<'a> {
    exchange: &'a str,
    tradingsymbol: &'a str,
    symboltoken: &'a str,
}

/// REST client for the broker's market data endpoints.
#[derive(Clone)]
pub struct BrokerClient {
    base_url: String,
    candle_path: String,
    ltp_path: String,
    interval: String,
    symbol_tokens: HashMap<String, String>,
    client: reqwest::Client,
}

impl BrokerClient {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Build a client from configuration.  Fails only if a credential is not
    /// a valid header value or the TLS backend cannot initialise.
    pub fn new(config: &BrokerConfig) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        default_headers.insert("X-UserType", HeaderValue::from_static("USER"));
        default_headers.insert("X-SourceID", HeaderValue::from_static("WEB"));
        default_headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", config.access_token))
                .context("broker access token is not a valid header value")?,
        );
        default_headers.insert(
            "X-PrivateKey",
            HeaderValue::from_str(&config.api_key)
                .context("broker api key is not a valid header value")?,
        );
        if !config.client_code.is_empty() {
            default_headers.insert(
                "X-ClientCode",
                HeaderValue::from_str(&config.client_code)
                    .context("broker client code is not a valid header value")?,
            );
        }

        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(config.request_timeout())
            .build()
            .context("failed to build broker HTTP client")?;

        debug!(base_url = %config.base_url, "BrokerClient initialised");

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            candle_path: config.candle_path.clone(),
            ltp_path: config.ltp_path.clone(),
            interval: config.candle_interval.clone(),
            symbol_tokens: config.symbol_tokens.clone(),
            client,
        })
    }

    fn symbol_token<'a>(&'a self, symbol: &'a str) -> &'a str {
        self.symbol_tokens
            .get(&symbol.to_uppercase())
            .map(String::as_str)
            .unwrap_or(symbol)
    }

    // -------------------------------------------------------------------------
    // Endpoints
    // -------------------------------------------------------------------------

    /// POST getCandleData for the last `period_days` calendar days.
    #[instrument(skip(self), name = "broker::fetch_candles")]
    pub async fn fetch_candles(
        &self,
        symbol: &str,
        exchange: &str,
        period_days: u32,
    ) -> Result<Vec<RawCandle>> {
        let (fromdate, todate) = date_window(Utc::now(), period_days);
        let request = CandleRequest {
            exchange,
            symboltoken: self.symbol_token(symbol),
            interval: &self.interval,
            fromdate,
            todate,
        };

        let body = self.post(&self.candle_path, &request).await?;
        let candles = parse_candle_rows(&body)?;

        debug!(symbol, exchange, count = candles.len(), "candles fetched");
        Ok(candles)
    }

    /// POST getLTP.
    #[instrument(skip(self), name = "broker::fetch_ltp")]
    pub async fn fetch_ltp(&self, symbol: &str, exchange: &str) -> Result<f64> {
        let request = LtpRequest {
            exchange,
            tradingsymbol: symbol,
            symboltoken: self.symbol_token(symbol),
        };

        let body = self.post(&self.ltp_path, &request).await?;
        parse_ltp(&body)
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, payload: &T) -> Result<serde_json::Value> {
        let url = format!("{}{}", self.base_url, path);

        let resp = self
            .client
            .post(&url)
            .json(payload)
            .send()
            .await
            .with_context(|| format!("POST {path} request failed"))?;

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .with_context(|| format!("failed to parse {path} response"))?;

        if !status.is_success() {
            anyhow::bail!("broker POST {} returned {}: {}", path, status, body);
        }

        // The broker reports application errors with HTTP 200.
        if body.get("status").and_then(|v| v.as_bool()) == Some(false) {
            anyhow::bail!(
                "broker POST {} rejected: {} ({})",
                path,
                body.get("message").and_then(|v| v.as_str()).unwrap_or("unknown"),
                body.get("errorcode").and_then(|v| v.as_str()).unwrap_or("")
            );
        }

        Ok(body)
    }
}

#[async_trait]
impl MarketDataSource for BrokerClient {
    async fn get_candles(
        &self,
        symbol: &str,
        exchange: &str,
        period_days: u32,
    ) -> Result<Vec<RawCandle>, SourceError> {
        self.fetch_candles(symbol, exchange, period_days)
            .await
            .map_err(|e| {
                warn!(symbol, exchange, error = %e, "candle fetch failed");
                SourceError::Unavailable(format!("{e:#}"))
            })
    }

    async fn get_ltp(&self, symbol: &str, exchange: &str) -> Result<f64, SourceError> {
        self.fetch_ltp(symbol, exchange)
            .await
            .map_err(|e| SourceError::Unavailable(format!("{e:#}")))
    }
}

impl std::fmt::Debug for BrokerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerClient")
            .field("api_key", &"<redacted>")
            .field("access_token", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("interval", &self.interval)
            .finish()
    }
}

// =============================================================================
// Pure helpers
// =============================================================================

/// `fromdate` / `todate` strings in exchange-local time.
fn date_window(now: DateTime<Utc>, period_days: u32) -> (String, String) {
    let to = now.naive_utc() + ChronoDuration::seconds(IST_OFFSET_SECS);
    let from = to - ChronoDuration::days(i64::from(period_days));
    (
        from.format(BROKER_DATE_FORMAT).to_string(),
        to.format(BROKER_DATE_FORMAT).to_string(),
    )
}

/// Parse `data: [[timestamp, open, high, low, close, volume], ...]`.
///
/// Rows with fewer than six fields are skipped.  Numeric fields are not
/// validated here; that is `CandleSeries`' job.
fn parse_candle_rows(body: &serde_json::Value) -> Result<Vec<RawCandle>> {
    let rows = match body.get("data") {
        Some(serde_json::Value::Null) | None => return Ok(Vec::new()),
        Some(data) => data.as_array().context("candle data is not an array")?,
    };

    let mut candles = Vec::with_capacity(rows.len());
    for row in rows {
        let arr = row.as_array().context("candle row is not an array")?;
        if arr.len() < 6 {
            warn!("skipping malformed candle row with {} elements", arr.len());
            continue;
        }

        let ts = arr[0].as_str().context("candle timestamp is not a string")?;
        let timestamp = DateTime::parse_from_rfc3339(ts)
            .with_context(|| format!("failed to parse candle timestamp '{ts}'"))?
            .timestamp_millis();

        candles.push(RawCandle::new(
            timestamp,
            parse_number(&arr[1])?,
            parse_number(&arr[2])?,
            parse_number(&arr[3])?,
            parse_number(&arr[4])?,
            parse_number(&arr[5])?,
        ));
    }
    Ok(candles)
}

fn parse_ltp(body: &serde_json::Value) -> Result<f64> {
    let ltp = body
        .get("data")
        .and_then(|d| d.get("ltp"))
        .context("LTP missing from response")?;
    parse_number(ltp)
}

/// Parse a JSON value that may be either a string or a number into `f64`.
fn parse_number(val: &serde_json::Value) -> Result<f64> {
    if let Some(s) = val.as_str() {
        s.parse::<f64>()
            .with_context(|| format!("failed to parse '{s}' as f64"))
    } else if let Some(n) = val.as_f64() {
        Ok(n)
    } else {
        anyhow::bail!("expected string or number, got: {val}")
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn date_window_is_ist_and_spans_period() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 4, 0, 0).unwrap();
        let (from, to) = date_window(now, 30);
        assert_eq!(to, "2024-03-15 09:30");
        assert_eq!(from, "2024-02-14 09:30");
    }

    #[test]
    fn parses_candle_rows() {
        let body = json!({
            "status": true,
            "message": "SUCCESS",
            "data": [
                ["2024-03-14T00:00:00+05:30", 2900.0, 2950.5, 2880.0, 2940.0, 120000],
                ["2024-03-15T00:00:00+05:30", "2940", "2960", "2910", "2925.5", "98000"],
                ["2024-03-16T00:00:00+05:30", 1.0]
            ]
        });
        let candles = parse_candle_rows(&body).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].timestamp, 1_710_354_600_000);
        assert!((candles[1].close - 2925.5).abs() < 1e-10);
        assert!((candles[1].volume - 98_000.0).abs() < 1e-10);
        assert_eq!(candles[1].timestamp - candles[0].timestamp, 86_400_000);
    }

    #[test]
    fn null_data_is_empty() {
        assert!(parse_candle_rows(&json!({ "status": true, "data": null })).unwrap().is_empty());
        assert!(parse_candle_rows(&json!({ "status": true })).unwrap().is_empty());
    }

    #[test]
    fn bad_timestamp_is_an_error() {
        let body = json!({ "data": [["yesterday", 1, 1, 1, 1, 1]] });
        assert!(parse_candle_rows(&body).is_err());
    }

    #[test]
    fn parses_ltp() {
        let body = json!({ "status": true, "data": { "tradingsymbol": "TCS", "ltp": 3890.25 } });
        assert!((parse_ltp(&body).unwrap() - 3890.25).abs() < 1e-10);
        assert!(parse_ltp(&json!({ "data": {} })).is_err());
    }

    #[test]
    fn parse_number_variants() {
        assert!((parse_number(&json!("1.5")).unwrap() - 1.5).abs() < 1e-10);
        assert!((parse_number(&json!(2)).unwrap() - 2.0).abs() < 1e-10);
        assert!(parse_number(&json!(null)).is_err());
        assert!(parse_number(&json!("abc")).is_err());
    }

    #[test]
    fn symbol_tokens_map_with_fallback() {
        let mut config = BrokerConfig {
            api_key: "key".into(),
            access_token: "jwt".into(),
            ..BrokerConfig::default()
        };
        config.symbol_tokens.insert("RELIANCE".into(), "2885".into());
        let client = BrokerClient::new(&config).unwrap();
        assert_eq!(client.symbol_token("reliance"), "2885");
        assert_eq!(client.symbol_token("TCS"), "TCS");
    }

    #[test]
    fn debug_redacts_credentials() {
        let config = BrokerConfig {
            api_key: "super-secret".into(),
            access_token: "jwt-secret".into(),
            ..BrokerConfig::default()
        };
        let client = BrokerClient::new(&config).unwrap();
        let dbg = format!("{client:?}");
        assert!(!dbg.contains("super-secret"));
        assert!(!dbg.contains("jwt-secret"));
    }

    #[tokio::test]
    async fn unreachable_broker_is_unavailable() {
        let config = BrokerConfig {
            base_url: "http://127.0.0.1:9".into(),
            api_key: "key".into(),
            access_token: "jwt".into(),
            request_timeout_secs: 2,
            ..BrokerConfig::default()
        };
        let client = BrokerClient::new(&config).unwrap();
        let err = client.get_candles("TCS", "NSE", 30).await.unwrap_err();
        assert!(matches!(err, SourceError::Unavailable(_)));
    }
}
