// =============================================================================
// Relative Strength Index (RSI): Wilder's Smoothing
// =============================================================================
//
// 1. Deltas between consecutive closes, split into gains and losses.
// 2. Seed avg_gain / avg_loss with the mean of the first `period` of each.
// 3. Wilder's smoothing (alpha = 1 / period):
//      avg = (prev_avg * (period - 1) + current) / period
// 4. RS = avg_gain / avg_loss, RSI = 100 - 100 / (1 + RS).
//
// avg_loss == 0 pins RSI at 100, including a perfectly flat series.
// =============================================================================

/// Full RSI series for `closes`.
///
/// Element `i` corresponds to close index `period + i`.  Empty when
/// `period == 0` or fewer than `period + 1` closes are supplied.
pub fn calculate_rsi(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period + 1 {
        return Vec::new();
    }

    let split = |d: f64| if d > 0.0 { (d, 0.0) } else { (0.0, -d) };
    let deltas: Vec<(f64, f64)> = closes.windows(2).map(|w| split(w[1] - w[0])).collect();

    let period_f = period as f64;
    let (seed_gain, seed_loss) = deltas[..period]
        .iter()
        .fold((0.0, 0.0), |(g, l), &(dg, dl)| (g + dg, l + dl));
    let mut avg_gain = seed_gain / period_f;
    let mut avg_loss = seed_loss / period_f;

    let mut series = Vec::with_capacity(deltas.len() - period + 1);
    match rsi_from_averages(avg_gain, avg_loss) {
        Some(v) => series.push(v),
        None => return series,
    }

    for &(gain, loss) in &deltas[period..] {
        avg_gain = (avg_gain * (period_f - 1.0) + gain) / period_f;
        avg_loss = (avg_loss * (period_f - 1.0) + loss) / period_f;
        match rsi_from_averages(avg_gain, avg_loss) {
            Some(v) => series.push(v),
            None => break,
        }
    }

    series
}

/// Latest RSI value, or `None` on insufficient history.
pub fn current_rsi(closes: &[f64], period: usize) -> Option<f64> {
    calculate_rsi(closes, period).last().copied()
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    let rsi = if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    };
    rsi.is_finite().then_some(rsi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsi_requires_period_plus_one_closes() {
        let fourteen: Vec<f64> = (1..=14).map(|x| x as f64).collect();
        assert!(calculate_rsi(&fourteen, 14).is_empty());
        assert!(current_rsi(&fourteen, 14).is_none());

        let fifteen: Vec<f64> = (1..=15).map(|x| x as f64).collect();
        assert_eq!(calculate_rsi(&fifteen, 14).len(), 1);
    }

    #[test]
    fn rsi_period_zero() {
        assert!(calculate_rsi(&[1.0, 2.0, 3.0], 0).is_empty());
    }

    #[test]
    fn rsi_monotonic_increase_is_100() {
        let closes: Vec<f64> = (1..=40).map(|x| 100.0 + x as f64 * 0.5).collect();
        let series = calculate_rsi(&closes, 14);
        assert_eq!(series.len(), 26);
        assert!(series.iter().all(|v| (v - 100.0).abs() < 1e-10));
    }

    #[test]
    fn rsi_monotonic_decrease_is_0() {
        let closes: Vec<f64> = (1..=30).rev().map(|x| x as f64).collect();
        let rsi = current_rsi(&closes, 14).unwrap();
        assert!(rsi.abs() < 1e-10, "expected 0.0, got {rsi}");
    }

    #[test]
    fn rsi_flat_series_has_no_losses() {
        let rsi = current_rsi(&[100.0; 30], 14).unwrap();
        assert!((rsi - 100.0).abs() < 1e-10);
    }

    #[test]
    fn rsi_wilder_reference_value() {
        // Wilder's worked example: first RSI(14) over these 15 closes.
        let closes = [
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08, 45.89, 46.03,
            45.61, 46.28, 46.28,
        ];
        let rsi = current_rsi(&closes, 14).unwrap();
        assert!((rsi - 70.46).abs() < 0.05, "got {rsi}");
    }

    #[test]
    fn rsi_stays_in_range() {
        let closes = [
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08, 45.89, 46.03,
            44.18, 44.22, 44.57, 43.42, 42.66, 43.13,
        ];
        for v in calculate_rsi(&closes, 14) {
            assert!((0.0..=100.0).contains(&v), "RSI {v} out of range");
        }
    }
}
