// =============================================================================
// Broker Module
// =============================================================================
//
// Live market data over the broker's REST API.  Used when credentials are
// configured; otherwise the service falls back to `DemoMarketData`.

pub mod client;

pub use client::BrokerClient;
