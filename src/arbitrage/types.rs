//! Opportunity and instruction types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use time::OffsetDateTime;

use crate::market::Category;

/// Kind of detected opportunity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum OpportunityKind {
    /// Guaranteed profit across complementary outcomes.
    Arbitrage,
    /// Positive expected value against a probability anchor.
    Ev,
    /// One venue pays clearly more than the rest for an outcome.
    BestPrice,
}

impl OpportunityKind {
    /// Header label, e.g. `BEST PRICE`.
    pub fn label(&self) -> String {
        self.to_string().replace('_', " ")
    }
}

/// Risk tier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Risk {
    Low,
    Medium,
    High,
}

/// One bet to place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetInstruction {
    /// 1-based position in the instruction list.
    pub step: u32,
    pub venue_id: String,
    /// Venue display name.
    pub venue_name: String,
    pub outcome_label: String,
    pub stake_usd: Decimal,
    pub odds_decimal: Decimal,
    /// Signed American odds, e.g. `+110`.
    pub odds_american: String,
    /// Total return if the outcome wins, stake included.
    pub potential_payout: Decimal,
}

/// A detected opportunity, derived from one event group snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    #[serde(rename = "type")]
    pub kind: OpportunityKind,
    pub event_group_id: String,
    pub event_name: String,
    pub category: Category,
    /// Outcome slots involved.
    pub outcome_pair: Vec<String>,
    /// Margin (arbitrage) or edge (EV, best price), in percent.
    pub profit_pct: Decimal,
    pub profit_usd: Decimal,
    pub total_stake: Decimal,
    pub fees_usd: Decimal,
    pub risk: Risk,
    /// Best-effort estimate; odds may move first.
    pub expires_in_seconds: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub detected_at: OffsetDateTime,
    pub instructions: Vec<BetInstruction>,
    pub formatted_text: String,
}

impl Opportunity {
    /// Identity of the opportunity across snapshots: kind, group and legs.
    pub fn fingerprint(&self) -> String {
        let legs: Vec<String> = self
            .instructions
            .iter()
            .map(|i| format!("{}:{}", i.venue_id, i.outcome_label))
            .collect();
        format!("{}|{}|{}", self.kind, self.event_group_id, legs.join(","))
    }

    /// Distinct venues in the instructions, in instruction order.
    pub fn venues(&self) -> Vec<&str> {
        let mut venues: Vec<&str> = Vec::new();
        for instruction in &self.instructions {
            if !venues.contains(&instruction.venue_id.as_str()) {
                venues.push(&instruction.venue_id);
            }
        }
        venues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn kind_serializes_screaming() {
        assert_eq!(serde_json::to_string(&OpportunityKind::BestPrice).unwrap(), "\"BEST_PRICE\"");
        assert_eq!(OpportunityKind::Ev.to_string(), "EV");
        assert_eq!(OpportunityKind::from_str("arbitrage").unwrap(), OpportunityKind::Arbitrage);
        assert_eq!(OpportunityKind::BestPrice.label(), "BEST PRICE");
    }

    #[test]
    fn risk_parses_any_case() {
        assert_eq!(Risk::from_str("low").unwrap(), Risk::Low);
        assert_eq!(Risk::High.to_string(), "HIGH");
        assert_eq!(serde_json::to_string(&Risk::Medium).unwrap(), "\"MEDIUM\"");
    }
}
