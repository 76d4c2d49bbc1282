// =============================================================================
// Bollinger Bands
// =============================================================================
//
// Middle band = SMA(period); upper/lower = middle ± k·σ, where σ is the
// population standard deviation of the same window.
// =============================================================================

use serde::{Deserialize, Serialize};

use super::sma::calculate_sma;

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_NUM_STD: f64 = 2.0;

/// Latest Bollinger Band levels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerBands {
    pub upper_band: f64,
    pub middle_band: f64,
    pub lower_band: f64,
}

/// Bollinger Bands over the last `period` closes.
///
/// Returns `None` on insufficient data or a non-finite result.
pub fn calculate_bollinger(closes: &[f64], period: usize, num_std: f64) -> Option<BollingerBands> {
    let middle = calculate_sma(closes, period)?;

    let window = &closes[closes.len() - period..];
    let variance = window.iter().map(|x| (x - middle).powi(2)).sum::<f64>() / period as f64;
    let spread = num_std * variance.sqrt();

    let bands = BollingerBands {
        upper_band: middle + spread,
        middle_band: middle,
        lower_band: middle - spread,
    };
    (bands.upper_band.is_finite() && bands.lower_band.is_finite()).then_some(bands)
}
