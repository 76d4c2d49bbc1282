// =============================================================================
// Stock Signal Service: Main Entry Point
// =============================================================================
//
// Without broker credentials the service runs on deterministic demo market
// data.  Set BROKER_API_KEY and BROKER_ACCESS_TOKEN to analyse live data.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod analyzer;
mod api;
mod app_state;
mod broker;
mod config;
mod error;
mod indicators;
mod market_data;
mod session;
mod signals;
mod types;
mod watchlist;

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::broker::BrokerClient;
use crate::config::AppConfig;
use crate::market_data::{DemoMarketData, MarketDataSource};

const CONFIG_PATH: &str = "stock_signal.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Stock Signal Service starting up");

    let mut config = AppConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });
    config.apply_env(|key| std::env::var(key).ok());

    if config.session.secret == AppConfig::default().session.secret {
        warn!("SESSION_SECRET not set; using the built-in development secret");
    }

    // ── 2. Market data source ────────────────────────────────────────────
    let (source, demo_mode): (Arc<dyn MarketDataSource>, bool) = if config.broker.is_configured() {
        let client = BrokerClient::new(&config.broker).context("failed to build broker client")?;
        info!(base_url = %config.broker.base_url, "Using live broker market data");
        (Arc::new(client), false)
    } else {
        warn!("Broker credentials not configured; serving demo market data");
        (Arc::new(DemoMarketData::new()), true)
    };

    // ── 3. Shared state & HTTP server ────────────────────────────────────
    let bind_addr = config.server.bind_addr.clone();
    let state = Arc::new(AppState::new(config, source, demo_mode));

    let analysis = &state.config.analysis;
    info!(
        exchange = %analysis.default_exchange,
        period_days = analysis.default_period_days,
        watchlist = ?analysis.default_watchlist,
        directory = analysis.symbol_directory.len(),
        max_concurrency = state.aggregator.max_concurrency(),
        "Analysis configured"
    );

    let app = api::router(state.clone());

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    info!(addr = %bind_addr, "REST API listening");

    // ── 4. Serve until Ctrl+C ────────────────────────────────────────────
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for shutdown signal");
            }
            warn!("Shutdown signal received; stopping gracefully");
        })
        .await
        .context("HTTP server error")?;

    info!("Stock Signal Service shut down complete.");
    Ok(())
}
