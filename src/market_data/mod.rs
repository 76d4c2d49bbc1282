pub mod candle;
#[cfg(test)]
pub mod fixture;
pub mod source;

// Re-export for convenient access (e.g. `use crate::market_data::CandleSeries`).
pub use candle::{CandleSeries, RawCandle};
#[cfg(test)]
pub use fixture::StaticMarketData;
pub use source::{DemoMarketData, MarketDataSource};
