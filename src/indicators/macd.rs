// =============================================================================
// MACD: Moving Average Convergence Divergence
// =============================================================================
//
//   macd_line   = EMA(fast) - EMA(slow)
//   signal_line = EMA(signal) of macd_line
//   histogram   = macd_line - signal_line
//
// All-or-nothing: the three values are only reported together, once the
// signal EMA has a full seed window (slow + signal - 1 closes).
// =============================================================================

use serde::{Deserialize, Serialize};

use super::ema::calculate_ema;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

/// Latest MACD triple.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdResult {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// Minimum number of closes for which [`calculate_macd`] returns a value.
pub fn required_len(slow: usize, signal: usize) -> usize {
    slow + signal - 1
}

/// MACD line series aligned to close index `slow - 1 + i`.
fn macd_line(closes: &[f64], fast: usize, slow: usize) -> Vec<f64> {
    let fast_ema = calculate_ema(closes, fast);
    let slow_ema = calculate_ema(closes, slow);
    if fast_ema.is_empty() || slow_ema.is_empty() {
        return Vec::new();
    }

    // fast_ema[0] aligns with close index fast-1, slow_ema[0] with slow-1.
    let offset = slow - fast;
    fast_ema
        .get(offset..)
        .unwrap_or_default()
        .iter()
        .zip(slow_ema.iter())
        .map(|(f, s)| f - s)
        .collect()
}

/// Latest MACD values for `closes`.
///
/// Returns `None` when any period is zero, `fast >= slow`, or fewer than
/// `slow + signal - 1` closes exist.
pub fn calculate_macd(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
) -> Option<MacdResult> {
    if fast == 0 || signal == 0 || fast >= slow || closes.len() < required_len(slow, signal) {
        return None;
    }

    let line = macd_line(closes, fast, slow);
    let signal_series = calculate_ema(&line, signal);

    let macd = *line.last()?;
    let signal_value = *signal_series.last()?;
    // A truncated (non-finite) line leaves the two series misaligned.
    if signal_series.len() != line.len() - signal + 1 {
        return None;
    }

    Some(MacdResult {
        macd,
        signal: signal_value,
        histogram: macd - signal_value,
    })
}
