//! Event groups produced by the matcher.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::market::{Category, MarketRef};

/// Canonical outcome slot → venue id → that venue's quote.
pub type OutcomeAlignment = BTreeMap<String, BTreeMap<String, MarketRef>>;

/// Markets from different venues that refer to the same real-world event.
///
/// Every member shares the group category and every slot holds at most one
/// market per venue. Groups are rebuilt from scratch each scan cycle.
#[derive(Debug, Clone, Serialize)]
pub struct EventGroup {
    pub group_id: String,
    pub canonical_name: String,
    pub category: Category,
    pub member_markets: Vec<MarketRef>,
    pub outcome_alignment: OutcomeAlignment,
    /// Every member listing quotes exactly the group's slots.
    pub exhaustive: bool,
}

impl EventGroup {
    /// Distinct venues among members.
    pub fn venues(&self) -> BTreeSet<&str> {
        self.member_markets
            .iter()
            .map(|m| m.venue_id.as_str())
            .collect()
    }

    /// Number of distinct venues.
    pub fn venue_count(&self) -> usize {
        self.venues().len()
    }

    /// Populated outcome slots.
    pub fn slot_count(&self) -> usize {
        self.outcome_alignment.len()
    }

    /// A group with one venue cannot yield a cross-venue opportunity.
    pub fn is_singleton(&self) -> bool {
        self.venue_count() < 2
    }
}
