// =============================================================================
// Signals Module
// =============================================================================
//
// Maps an `IndicatorSet` (and the previous period's set) to a deterministic
// recommendation with the reason codes that produced it.

pub mod rules;

pub use rules::{SignalResult, SignalRuleEngine};
