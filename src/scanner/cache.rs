//! Atomically swapped scan snapshot.
//!
//! The orchestrator is the only writer. Readers take an `Arc<Snapshot>` and keep
//! a complete, consistent view for as long as they hold it.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use strum::Display;
use time::OffsetDateTime;

use crate::arbitrage::Opportunity;
use crate::error::VenueFetchError;
use crate::market::MarketRef;
use crate::matching::EventGroup;

/// Health of a venue in the last cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VenueState {
    Active,
    Degraded,
    RateLimited,
}

/// Per-venue result of the last cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueStatus {
    pub state: VenueState,
    /// Markets normalized from this venue.
    pub markets: usize,
    pub last_error: Option<String>,
    pub latency_ms: Option<u64>,
}

impl VenueStatus {
    pub fn active(markets: usize, latency_ms: u64) -> Self {
        Self {
            state: VenueState::Active,
            markets,
            last_error: None,
            latency_ms: Some(latency_ms),
        }
    }

    /// Status for a failed fetch. Rate limiting is reported separately from other failures.
    pub fn failed(error: &VenueFetchError, latency_ms: Option<u64>) -> Self {
        let state = match error {
            VenueFetchError::RateLimited { .. } => VenueState::RateLimited,
            _ => VenueState::Degraded,
        };
        Self {
            state,
            markets: 0,
            last_error: Some(error.to_string()),
            latency_ms,
        }
    }

    /// Venue skipped because it is still inside its retry-after window.
    pub fn backing_off(until: OffsetDateTime) -> Self {
        Self {
            state: VenueState::RateLimited,
            markets: 0,
            last_error: Some(format!("rate limited until {}", until)),
            latency_ms: None,
        }
    }

    /// Venue whose fetch never completed (watchdog or task failure).
    pub fn abandoned(reason: &str) -> Self {
        Self {
            state: VenueState::Degraded,
            markets: 0,
            last_error: Some(reason.to_string()),
            latency_ms: None,
        }
    }
}

/// Outcome of the cycle that produced a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleSummary {
    pub duration_ms: u64,
    /// Watchdog fired; results are partial.
    pub incomplete: bool,
}

/// Everything one scan cycle produced.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub markets: Vec<MarketRef>,
    pub event_groups: Vec<EventGroup>,
    /// Most profitable first.
    pub opportunities: Vec<Opportunity>,
    /// `None` until the first cycle publishes.
    pub scan_timestamp: Option<OffsetDateTime>,
    pub per_venue_status: BTreeMap<String, VenueStatus>,
    pub cycle: CycleSummary,
    groups_by_id: HashMap<String, usize>,
    opportunities_by_group: HashMap<String, Vec<usize>>,
}

impl Snapshot {
    /// Build a published snapshot and its lookup indexes.
    pub fn new(
        markets: Vec<MarketRef>,
        event_groups: Vec<EventGroup>,
        opportunities: Vec<Opportunity>,
        scan_timestamp: OffsetDateTime,
        per_venue_status: BTreeMap<String, VenueStatus>,
        cycle: CycleSummary,
    ) -> Self {
        let groups_by_id = event_groups
            .iter()
            .enumerate()
            .map(|(i, g)| (g.group_id.clone(), i))
            .collect();

        let mut opportunities_by_group: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, opp) in opportunities.iter().enumerate() {
            opportunities_by_group
                .entry(opp.event_group_id.clone())
                .or_default()
                .push(i);
        }

        Self {
            markets,
            event_groups,
            opportunities,
            scan_timestamp: Some(scan_timestamp),
            per_venue_status,
            cycle,
            groups_by_id,
            opportunities_by_group,
        }
    }

    /// Whether any cycle has published yet.
    pub fn is_published(&self) -> bool {
        self.scan_timestamp.is_some()
    }

    pub fn group(&self, group_id: &str) -> Option<&EventGroup> {
        self.groups_by_id
            .get(group_id)
            .and_then(|&i| self.event_groups.get(i))
    }

    /// Opportunities of one group, in snapshot order.
    pub fn opportunities_for(&self, group_id: &str) -> Vec<&Opportunity> {
        self.opportunities_by_group
            .get(group_id)
            .map(|indexes| {
                indexes
                    .iter()
                    .filter_map(|&i| self.opportunities.get(i))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn fingerprints(&self) -> HashSet<String> {
        self.opportunities.iter().map(Opportunity::fingerprint).collect()
    }

    /// Venues that answered in the last cycle.
    pub fn venues_reachable(&self) -> usize {
        self.per_venue_status
            .values()
            .filter(|s| s.state == VenueState::Active)
            .count()
    }
}

/// Holder of the current snapshot.
#[derive(Debug)]
pub struct ScanCache {
    current: ArcSwap<Snapshot>,
}

impl Default for ScanCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanCache {
    /// Start with an empty, unpublished snapshot.
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(Snapshot::default()),
        }
    }

    /// Current snapshot. Never blocks.
    pub fn load(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Replace the snapshot, returning the previous one.
    pub(crate) fn publish(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        self.current.swap(Arc::new(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbitrage::{OpportunityKind, Risk};
    use crate::market::Category;
    use rust_decimal::Decimal;

    fn opportunity(group: &str) -> Opportunity {
        Opportunity {
            kind: OpportunityKind::Arbitrage,
            event_group_id: group.to_string(),
            event_name: group.to_string(),
            category: Category::Sports,
            outcome_pair: vec!["yes".to_string(), "no".to_string()],
            profit_pct: Decimal::ONE,
            profit_usd: Decimal::TEN,
            total_stake: Decimal::ONE_THOUSAND,
            fees_usd: Decimal::ZERO,
            risk: Risk::Medium,
            expires_in_seconds: 30,
            detected_at: OffsetDateTime::UNIX_EPOCH,
            instructions: Vec::new(),
            formatted_text: String::new(),
        }
    }

    #[test]
    fn starts_unpublished() {
        let cache = ScanCache::new();
        let snapshot = cache.load();
        assert!(!snapshot.is_published());
        assert!(snapshot.opportunities.is_empty());
        assert_eq!(snapshot.venues_reachable(), 0);
    }

    #[test]
    fn publish_swaps_whole_snapshot() {
        let cache = ScanCache::new();
        let before = cache.load();

        let mut status = BTreeMap::new();
        status.insert("a".to_string(), VenueStatus::active(4, 12));
        status.insert(
            "b".to_string(),
            VenueStatus::failed(
                &VenueFetchError::RateLimited {
                    venue: "b".to_string(),
                    retry_after_secs: Some(30),
                },
                Some(3),
            ),
        );

        let previous = cache.publish(Snapshot::new(
            Vec::new(),
            Vec::new(),
            vec![opportunity("g1"), opportunity("g2"), opportunity("g1")],
            OffsetDateTime::UNIX_EPOCH,
            status,
            CycleSummary::default(),
        ));

        // readers holding the old snapshot still see it unchanged
        assert!(!before.is_published());
        assert!(!previous.is_published());

        let after = cache.load();
        assert!(after.is_published());
        assert_eq!(after.opportunities_for("g1").len(), 2);
        assert!(after.opportunities_for("missing").is_empty());
        assert_eq!(after.venues_reachable(), 1);
        assert_eq!(after.per_venue_status["b"].state, VenueState::RateLimited);
        assert_eq!(after.fingerprints().len(), 2);
    }

    #[test]
    fn venue_state_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&VenueState::RateLimited).unwrap(),
            "\"rate_limited\""
        );
        assert_eq!(VenueState::Degraded.to_string(), "degraded");
    }
}
