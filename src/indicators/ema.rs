// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
//   alpha = 2 / (period + 1)
//   EMA_t = close_t * alpha + EMA_{t-1} * (1 - alpha)
//
// Seeded with the SMA of the first `period` values, then rolled forward over
// the rest of the input.  MACD feeds this both closes and its own MACD line.
// =============================================================================

use super::sma::calculate_sma;

/// EMA series of `values` for the given `period`.
///
/// Element `i` of the output corresponds to input index `period - 1 + i`.
/// Returns an empty `Vec` when `period == 0` or `values.len() < period`.
/// A non-finite intermediate value truncates the series at that point.
pub fn calculate_ema(values: &[f64], period: usize) -> Vec<f64> {
    let Some(seed) = calculate_sma(values.get(..period).unwrap_or_default(), period) else {
        return Vec::new();
    };

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut series = Vec::with_capacity(values.len() - period + 1);
    series.push(seed);

    let mut prev = seed;
    for &value in &values[period..] {
        let ema = value * alpha + prev * (1.0 - alpha);
        if !ema.is_finite() {
            break;
        }
        series.push(ema);
        prev = ema;
    }

    series
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_empty_and_short_input() {
        assert!(calculate_ema(&[], 5).is_empty());
        assert!(calculate_ema(&[1.0, 2.0], 5).is_empty());
    }

    #[test]
    fn ema_period_zero() {
        assert!(calculate_ema(&[1.0, 2.0, 3.0], 0).is_empty());
    }

    #[test]
    fn ema_seed_is_sma() {
        let ema = calculate_ema(&[2.0, 4.0, 6.0], 3);
        assert_eq!(ema.len(), 1);
        assert!((ema[0] - 4.0).abs() < 1e-10);
    }

    #[test]
    fn ema_recurrence() {
        let closes: Vec<f64> = (1..=10).map(|x| x as f64).collect();
        let ema = calculate_ema(&closes, 5);
        assert_eq!(ema.len(), 6);

        let alpha = 2.0 / 6.0;
        let mut expected = 3.0;
        assert!((ema[0] - expected).abs() < 1e-10);
        for (i, &c) in closes[5..].iter().enumerate() {
            expected = c * alpha + expected * (1.0 - alpha);
            assert!((ema[i + 1] - expected).abs() < 1e-10);
        }
        assert_eq!(ema.len(), closes.len() - 4);
    }

    #[test]
    fn ema_stops_on_nan() {
        let ema = calculate_ema(&[1.0, 2.0, 3.0, f64::NAN, 5.0], 3);
        assert_eq!(ema.len(), 1);
    }

    #[test]
    fn ema_flat_series_stays_flat() {
        let ema = calculate_ema(&[50.0; 40], 12);
        assert!(ema.iter().all(|v| (v - 50.0).abs() < 1e-10));
    }
}
