// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free indicator functions over close-price slices.  Every
// function returns `Option` (or an empty series) on insufficient history so
// callers cannot mistake missing data for a real value.

pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod set;
pub mod sma;

pub use set::IndicatorSet;
