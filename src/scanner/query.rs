//! Read-side views over a snapshot: filtered opportunities, group lookup,
//! markets report and aggregate statistics.

use std::collections::BTreeMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;
use time::OffsetDateTime;

use super::cache::{Snapshot, VenueStatus};
use crate::arbitrage::{Opportunity, OpportunityKind, Risk};
use crate::market::MarketRef;
use crate::matching::EventGroup;

/// Default result size for opportunity queries.
pub const DEFAULT_LIMIT: usize = 50;

/// Filters for [`query_opportunities`]. `None` means "all".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpportunityQuery {
    pub kind: Option<OpportunityKind>,
    /// Minimum `profit_pct`.
    pub min_profit: Decimal,
    pub risk: Option<Risk>,
    /// Free text; matches the category or the event name.
    pub category: Option<String>,
    pub limit: usize,
}

impl Default for OpportunityQuery {
    fn default() -> Self {
        Self {
            kind: None,
            min_profit: Decimal::ZERO,
            risk: None,
            category: None,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Parse a filter value where `all` (or empty) means no filter.
pub fn parse_filter<T: FromStr>(raw: Option<&str>) -> Result<Option<T>, String> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) if value.eq_ignore_ascii_case("all") => Ok(None),
        Some(value) => T::from_str(value)
            .map(Some)
            .map_err(|_| format!("unknown filter value: {}", value)),
    }
}

/// Query answer. `reason` explains an empty result when nothing could be scanned.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub opportunities: Vec<Opportunity>,
    /// Matches before `limit` was applied.
    pub total_matching: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Filter the snapshot's opportunities, most profitable first.
pub fn query_opportunities(snapshot: &Snapshot, query: &OpportunityQuery) -> QueryResult {
    let needle = query
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_lowercase);

    let matching: Vec<&Opportunity> = snapshot
        .opportunities
        .iter()
        .filter(|o| query.kind.map_or(true, |k| o.kind == k))
        .filter(|o| query.risk.map_or(true, |r| o.risk == r))
        .filter(|o| o.profit_pct >= query.min_profit)
        .filter(|o| match &needle {
            Some(text) => {
                o.category.to_string() == *text || o.event_name.to_lowercase().contains(text)
            }
            None => true,
        })
        .collect();

    let reason = if !snapshot.is_published() {
        Some("no scan has completed yet".to_string())
    } else if snapshot.venues_reachable() == 0 {
        Some("no venues were reachable in the last scan".to_string())
    } else {
        None
    };

    QueryResult {
        total_matching: matching.len(),
        opportunities: matching.into_iter().take(query.limit).cloned().collect(),
        reason,
    }
}

/// One event group and its opportunities.
#[derive(Debug, Clone, Serialize)]
pub struct GroupDetail {
    pub group: EventGroup,
    pub opportunities: Vec<Opportunity>,
}

pub fn group_detail(snapshot: &Snapshot, group_id: &str) -> Option<GroupDetail> {
    let group = snapshot.group(group_id)?.clone();
    let opportunities = snapshot
        .opportunities_for(group_id)
        .into_iter()
        .cloned()
        .collect();
    Some(GroupDetail {
        group,
        opportunities,
    })
}

/// Cached markets and venue health.
#[derive(Debug, Clone, Serialize)]
pub struct MarketsReport {
    #[serde(with = "time::serde::rfc3339::option")]
    pub scan_timestamp: Option<OffsetDateTime>,
    pub total_markets: usize,
    pub markets: Vec<MarketRef>,
    pub venues: BTreeMap<String, VenueStatus>,
}

pub fn markets_report(snapshot: &Snapshot, category: Option<&str>, limit: usize) -> MarketsReport {
    let needle = category
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_lowercase);

    let markets = snapshot
        .markets
        .iter()
        .filter(|m| match &needle {
            Some(text) => {
                m.category.to_string() == *text || m.event_name.to_lowercase().contains(text)
            }
            None => true,
        })
        .take(limit)
        .cloned()
        .collect();

    MarketsReport {
        scan_timestamp: snapshot.scan_timestamp,
        total_markets: snapshot.markets.len(),
        markets,
        venues: snapshot.per_venue_status.clone(),
    }
}

/// Lifetime cycle counters kept by the orchestrator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanCounters {
    pub completed: u64,
    pub rejected: u64,
    pub incomplete: u64,
}

/// Aggregate statistics.
#[derive(Debug, Clone, Serialize)]
pub struct ScannerStats {
    pub running: bool,
    pub phase: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_scan: Option<OffsetDateTime>,
    pub total_opportunities: usize,
    pub total_markets: usize,
    pub event_groups: usize,
    pub by_type: BTreeMap<String, usize>,
    pub by_risk: BTreeMap<String, usize>,
    pub avg_profit_pct: Decimal,
    pub last_scan_duration_ms: u64,
    pub last_scan_incomplete: bool,
    pub scans_completed: u64,
    pub scans_rejected: u64,
    pub scans_incomplete: u64,
}

impl ScannerStats {
    pub fn from_snapshot(
        snapshot: &Snapshot,
        counters: ScanCounters,
        running: bool,
        phase: &str,
    ) -> Self {
        let mut by_type = BTreeMap::new();
        let mut by_risk = BTreeMap::new();
        let mut total_profit = Decimal::ZERO;
        for opp in &snapshot.opportunities {
            *by_type.entry(opp.kind.to_string()).or_insert(0) += 1;
            *by_risk.entry(opp.risk.to_string()).or_insert(0) += 1;
            total_profit += opp.profit_pct;
        }

        let count = snapshot.opportunities.len();
        let avg_profit_pct = if count == 0 {
            Decimal::ZERO
        } else {
            (total_profit / Decimal::from(count)).round_dp(2)
        };

        Self {
            running,
            phase: phase.to_string(),
            last_scan: snapshot.scan_timestamp,
            total_opportunities: count,
            total_markets: snapshot.markets.len(),
            event_groups: snapshot.event_groups.len(),
            by_type,
            by_risk,
            avg_profit_pct,
            last_scan_duration_ms: snapshot.cycle.duration_ms,
            last_scan_incomplete: snapshot.cycle.incomplete,
            scans_completed: counters.completed,
            scans_rejected: counters.rejected,
            scans_incomplete: counters.incomplete,
        }
    }
}
