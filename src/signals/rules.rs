// =============================================================================
// Signal Rule Engine: indicator state to BUY / SELL / HOLD
// =============================================================================
//
// Rules (each evaluated independently, several may fire):
//   RSI  < oversold              => buy  RSI_OVERSOLD
//   RSI  > overbought            => sell RSI_OVERBOUGHT
//   close > SMA20 && SMA14 > SMA20 => buy  SMA_BULLISH_CROSS
//   close < SMA20 && SMA14 < SMA20 => sell SMA_BEARISH_CROSS
//   MACD histogram - to +        => buy  MACD_BULLISH_CROSS
//   MACD histogram + to -        => sell MACD_BEARISH_CROSS
//
// Net = buys - sells:  >=2 STRONG_BUY, 1 BUY, 0 HOLD, -1 SELL, <=-2 STRONG_SELL
//
// Total function: absent indicators simply do not fire.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::indicators::IndicatorSet;
use crate::types::{Recommendation, SignalCode};

pub const DEFAULT_RSI_OVERSOLD: f64 = 30.0;
pub const DEFAULT_RSI_OVERBOUGHT: f64 = 70.0;

/// Recommendation plus the reason codes that produced it, in rule order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SignalResult {
    pub recommendation: Recommendation,
    pub buy_signals: Vec<SignalCode>,
    pub sell_signals: Vec<SignalCode>,
}

impl SignalResult {
    /// Aggregate fired signals into a recommendation.
    pub fn from_signals(buy_signals: Vec<SignalCode>, sell_signals: Vec<SignalCode>) -> Self {
        let net = buy_signals.len() as i64 - sell_signals.len() as i64;
        Self {
            recommendation: Recommendation::from_net(net),
            buy_signals,
            sell_signals,
        }
    }
}

/// Stateless rule engine.  Only the RSI thresholds are tunable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalRuleEngine {
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
}

impl Default for SignalRuleEngine {
    fn default() -> Self {
        Self::new(DEFAULT_RSI_OVERSOLD, DEFAULT_RSI_OVERBOUGHT)
    }
}

impl SignalRuleEngine {
    pub fn new(rsi_oversold: f64, rsi_overbought: f64) -> Self {
        Self {
            rsi_oversold,
            rsi_overbought,
        }
    }

    /// Evaluate every rule against `current`, using `previous` (the set for
    /// the prior candle) for crossover detection.
    pub fn evaluate(&self, current: &IndicatorSet, previous: Option<&IndicatorSet>) -> SignalResult {
        let mut buys = Vec::new();
        let mut sells = Vec::new();

        // ── RSI ────────────────────────────────────────────────────────
        if let Some(rsi) = current.rsi_14 {
            if rsi < self.rsi_oversold {
                buys.push(SignalCode::RsiOversold);
            } else if rsi > self.rsi_overbought {
                sells.push(SignalCode::RsiOverbought);
            }
        }

        // ── SMA trend ──────────────────────────────────────────────────
        if let (Some(close), Some(short), Some(long)) = (current.close, current.sma_14, current.sma_20)
        {
            if close > long && short > long {
                buys.push(SignalCode::SmaBullishCross);
            } else if close < long && short < long {
                sells.push(SignalCode::SmaBearishCross);
            }
        }

        // ── MACD histogram crossover ───────────────────────────────────
        let histograms = current
            .macd
            .zip(previous.and_then(|p| p.macd))
            .map(|(now, before)| (before.histogram, now.histogram));
        if let Some((before, now)) = histograms {
            if before < 0.0 && now > 0.0 {
                buys.push(SignalCode::MacdBullishCross);
            } else if before > 0.0 && now < 0.0 {
                sells.push(SignalCode::MacdBearishCross);
            }
        }

        SignalResult::from_signals(buys, sells)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::macd::MacdResult;

    fn macd(histogram: f64) -> Option<MacdResult> {
        Some(MacdResult {
            macd: histogram,
            signal: 0.0,
            histogram,
        })
    }

    #[test]
    fn no_indicators_is_hold_with_empty_lists() {
        let result = SignalRuleEngine::default().evaluate(&IndicatorSet::default(), None);
        assert_eq!(result.recommendation, Recommendation::Hold);
        assert!(result.buy_signals.is_empty());
        assert!(result.sell_signals.is_empty());
    }

    #[test]
    fn two_buys_is_strong_buy() {
        let set = IndicatorSet {
            close: Some(110.0),
            rsi_14: Some(25.0),
            sma_14: Some(105.0),
            sma_20: Some(100.0),
            ..Default::default()
        };
        let result = SignalRuleEngine::default().evaluate(&set, None);
        assert_eq!(
            result.buy_signals,
            vec![SignalCode::RsiOversold, SignalCode::SmaBullishCross]
        );
        assert!(result.sell_signals.is_empty());
        assert_eq!(result.recommendation, Recommendation::StrongBuy);
    }

    #[test]
    fn one_buy_one_sell_is_hold() {
        // Overbought RSI but a fresh bullish MACD cross.
        let previous = IndicatorSet {
            macd: macd(-0.2),
            ..Default::default()
        };
        let current = IndicatorSet {
            rsi_14: Some(75.0),
            macd: macd(0.3),
            ..Default::default()
        };
        let result = SignalRuleEngine::default().evaluate(&current, Some(&previous));
        assert_eq!(result.buy_signals, vec![SignalCode::MacdBullishCross]);
        assert_eq!(result.sell_signals, vec![SignalCode::RsiOverbought]);
        assert_eq!(result.recommendation, Recommendation::Hold);
    }

    #[test]
    fn single_sell_and_strong_sell() {
        let engine = SignalRuleEngine::default();
        let one = IndicatorSet {
            rsi_14: Some(80.0),
            ..Default::default()
        };
        assert_eq!(engine.evaluate(&one, None).recommendation, Recommendation::Sell);

        let previous = IndicatorSet {
            macd: macd(0.5),
            ..Default::default()
        };
        let three = IndicatorSet {
            close: Some(90.0),
            rsi_14: Some(80.0),
            sma_14: Some(95.0),
            sma_20: Some(100.0),
            macd: macd(-0.1),
            ..Default::default()
        };
        let result = engine.evaluate(&three, Some(&previous));
        assert_eq!(
            result.sell_signals,
            vec![
                SignalCode::RsiOverbought,
                SignalCode::SmaBearishCross,
                SignalCode::MacdBearishCross
            ]
        );
        assert_eq!(result.recommendation, Recommendation::StrongSell);
    }

    #[test]
    fn thresholds_are_strict() {
        let engine = SignalRuleEngine::default();
        for rsi in [30.0, 50.0, 70.0] {
            let set = IndicatorSet {
                rsi_14: Some(rsi),
                ..Default::default()
            };
            let result = engine.evaluate(&set, None);
            assert_eq!(result.recommendation, Recommendation::Hold, "rsi {rsi}");
        }
    }

    #[test]
    fn mixed_sma_state_does_not_fire() {
        // Price above the long SMA but short SMA below it.
        let set = IndicatorSet {
            close: Some(101.0),
            sma_14: Some(99.0),
            sma_20: Some(100.0),
            ..Default::default()
        };
        let result = SignalRuleEngine::default().evaluate(&set, None);
        assert!(result.buy_signals.is_empty() && result.sell_signals.is_empty());
    }

    #[test]
    fn macd_needs_previous_period() {
        let current = IndicatorSet {
            macd: macd(1.0),
            ..Default::default()
        };
        let engine = SignalRuleEngine::default();
        assert!(engine.evaluate(&current, None).buy_signals.is_empty());

        // Staying positive is not a cross.
        let previous = IndicatorSet {
            macd: macd(0.4),
            ..Default::default()
        };
        assert!(engine.evaluate(&current, Some(&previous)).buy_signals.is_empty());
    }

    #[test]
    fn evaluation_is_deterministic() {
        let previous = IndicatorSet::from_closes(
            &(0..60).map(|i| 100.0 + (i as f64 * 0.4).sin() * 3.0).collect::<Vec<_>>(),
        );
        let current = IndicatorSet::from_closes(
            &(0..61).map(|i| 100.0 + (i as f64 * 0.4).sin() * 3.0).collect::<Vec<_>>(),
        );
        let engine = SignalRuleEngine::default();
        let first = engine.evaluate(&current, Some(&previous));
        for _ in 0..10 {
            assert_eq!(engine.evaluate(&current, Some(&previous)), first);
        }
    }

    #[test]
    fn custom_thresholds() {
        let engine = SignalRuleEngine::new(40.0, 60.0);
        let set = IndicatorSet {
            rsi_14: Some(35.0),
            ..Default::default()
        };
        assert_eq!(engine.evaluate(&set, None).buy_signals, vec![SignalCode::RsiOversold]);
    }
}
