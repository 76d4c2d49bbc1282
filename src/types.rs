// =============================================================================
// Shared types used across the signal engine
// =============================================================================

use serde::{Deserialize, Serialize};

/// Final recommendation derived from the net count of buy and sell signals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    StrongBuy,
    Buy,
    #[default]
    Hold,
    Sell,
    StrongSell,
}

impl Recommendation {
    /// Map `buy_count - sell_count` onto the five-level scale.
    pub fn from_net(net: i64) -> Self {
        match net {
            n if n >= 2 => Self::StrongBuy,
            1 => Self::Buy,
            0 => Self::Hold,
            -1 => Self::Sell,
            _ => Self::StrongSell,
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StrongBuy => write!(f, "STRONG_BUY"),
            Self::Buy => write!(f, "BUY"),
            Self::Hold => write!(f, "HOLD"),
            Self::Sell => write!(f, "SELL"),
            Self::StrongSell => write!(f, "STRONG_SELL"),
        }
    }
}

/// Reason code attached to a fired rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalCode {
    RsiOversold,
    RsiOverbought,
    SmaBullishCross,
    SmaBearishCross,
    MacdBullishCross,
    MacdBearishCross,
}

impl std::fmt::Display for SignalCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RsiOversold => write!(f, "RSI_OVERSOLD"),
            Self::RsiOverbought => write!(f, "RSI_OVERBOUGHT"),
            Self::SmaBullishCross => write!(f, "SMA_BULLISH_CROSS"),
            Self::SmaBearishCross => write!(f, "SMA_BEARISH_CROSS"),
            Self::MacdBullishCross => write!(f, "MACD_BULLISH_CROSS"),
            Self::MacdBearishCross => write!(f, "MACD_BEARISH_CROSS"),
        }
    }
}

/// Outcome of one symbol inside a watchlist run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchlistStatus {
    Success,
    Error,
}

impl std::fmt::Display for WatchlistStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
        }
    }
}
