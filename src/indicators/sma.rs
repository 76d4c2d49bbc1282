// =============================================================================
// Simple Moving Average (SMA)
// =============================================================================
//
// Arithmetic mean of the last `period` closes.  Also used to seed the EMA.
// =============================================================================

/// Mean of the most recent `period` values of `closes`.
///
/// Returns `None` when `period == 0`, when fewer than `period` values exist,
/// or when the mean is non-finite.
pub fn calculate_sma(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period {
        return None;
    }

    let window = &closes[closes.len() - period..];
    let mean = window.iter().sum::<f64>() / period as f64;

    mean.is_finite().then_some(mean)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_insufficient_data() {
        assert!(calculate_sma(&[1.0, 2.0], 3).is_none());
        assert!(calculate_sma(&[], 1).is_none());
    }

    #[test]
    fn sma_period_zero() {
        assert!(calculate_sma(&[1.0, 2.0, 3.0], 0).is_none());
    }

    #[test]
    fn sma_golden_fourteen() {
        // 14-point series with a hand-computed mean.
        let closes = [
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08, 45.89, 46.03,
            44.18, 44.22,
        ];
        let expected = 628.11 / 14.0;
        let sma = calculate_sma(&closes, 14).unwrap();
        assert!((sma - expected).abs() < 1e-10, "got {sma}, expected {expected}");
    }

    #[test]
    fn sma_uses_only_the_tail() {
        let closes: Vec<f64> = (1..=20).map(|x| x as f64).collect();
        // last 5 = 16..=20, mean 18
        assert!((calculate_sma(&closes, 5).unwrap() - 18.0).abs() < 1e-10);
    }
}
