//! Risk tiers and expiry heuristics.

use rust_decimal::Decimal;

use super::types::{OpportunityKind, Risk};

/// Tier boundaries on arbitrage margin, in percent.
#[derive(Debug, Clone, Copy)]
pub struct RiskThresholds {
    /// At or above this margin, with two or more venues, risk is LOW.
    pub low_min_profit_pct: Decimal,
    /// Below this margin risk is HIGH.
    pub medium_min_profit_pct: Decimal,
}

/// Classify an opportunity. Monotone in margin and venue count.
///
/// Single-leg signals (EV, best price) are always HIGH.
pub fn classify(
    kind: OpportunityKind,
    profit_pct: Decimal,
    venue_count: usize,
    thresholds: RiskThresholds,
) -> Risk {
    if kind != OpportunityKind::Arbitrage {
        return Risk::High;
    }
    if profit_pct < thresholds.medium_min_profit_pct {
        Risk::High
    } else if profit_pct >= thresholds.low_min_profit_pct && venue_count >= 2 {
        Risk::Low
    } else {
        Risk::Medium
    }
}

/// Base lifetime per kind, in seconds.
pub fn base_lifetime_secs(kind: OpportunityKind) -> u64 {
    match kind {
        OpportunityKind::Arbitrage => 30,
        OpportunityKind::Ev => 60,
        OpportunityKind::BestPrice => 120,
    }
}

/// Base lifetime minus the age of the oldest quote, floored at zero.
pub fn expires_in_seconds(kind: OpportunityKind, oldest_quote_age_secs: i64) -> u64 {
    let age = u64::try_from(oldest_quote_age_secs).unwrap_or(0);
    base_lifetime_secs(kind).saturating_sub(age)
}
