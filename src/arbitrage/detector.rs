//! Opportunity detection over matched event groups.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use smallvec::SmallVec;
use time::OffsetDateTime;
use tracing::{debug, info, instrument};

use super::calculator::{
    arbitrage_margin, ev_pct, fractional_stake, price_edge_pct, size_arbitrage, Leg,
};
use super::formatter::format_opportunity;
use super::risk::{classify, expires_in_seconds, RiskThresholds};
use super::types::{BetInstruction, Opportunity, OpportunityKind};
use crate::config::DetectionSettings;
use crate::market::{MarketRef, VenueProfile};
use crate::metrics::{inc_opportunities_detected, timer_detection};
use crate::matching::EventGroup;
use crate::odds::{decimal_to_american, format_american};

/// Legs of one opportunity: (slot, quote).
type Legs<'a> = SmallVec<[(&'a str, &'a MarketRef); 4]>;

/// Evaluates arbitrage, +EV and best-price conditions on event groups.
#[derive(Debug, Clone)]
pub struct OpportunityDetector {
    settings: DetectionSettings,
}

impl Default for OpportunityDetector {
    fn default() -> Self {
        Self::new(DetectionSettings::default())
    }
}

impl OpportunityDetector {
    /// Create a detector from settings.
    pub fn new(settings: DetectionSettings) -> Self {
        Self { settings }
    }

    /// Settings in use.
    pub fn settings(&self) -> &DetectionSettings {
        &self.settings
    }

    /// Detect over all groups. Most profitable first.
    #[instrument(skip_all, fields(groups = groups.len()))]
    pub fn detect_all(&self, groups: &[EventGroup], now: OffsetDateTime) -> Vec<Opportunity> {
        let _timer = timer_detection();

        let mut opportunities: Vec<Opportunity> = groups
            .iter()
            .flat_map(|group| self.detect(group, now))
            .collect();

        opportunities.sort_by(|a, b| {
            b.profit_pct
                .cmp(&a.profit_pct)
                .then(a.kind.cmp(&b.kind))
                .then_with(|| a.event_group_id.cmp(&b.event_group_id))
        });

        for opp in &opportunities {
            inc_opportunities_detected(&opp.kind.to_string());
        }
        if !opportunities.is_empty() {
            info!(
                total = opportunities.len(),
                by_kind = ?count_by_kind(&opportunities),
                "Opportunities detected"
            );
        }

        opportunities
    }

    /// Detect opportunities in one group.
    pub fn detect(&self, group: &EventGroup, now: OffsetDateTime) -> Vec<Opportunity> {
        if group.slot_count() < 2 || group.venue_count() < 2 {
            return Vec::new();
        }

        let mut found = Vec::new();

        if group.exhaustive {
            let arbitrage = if group.slot_count() == 2 {
                self.best_two_way(group)
            } else {
                self.best_n_way(group)
            };
            if let Some((legs, margin)) = arbitrage {
                found.extend(self.build_arbitrage(group, &legs, margin, now));
            }
        } else {
            debug!(group = %group.group_id, "Skipped arbitrage: outcome set not exhaustive");
        }

        found.extend(self.detect_ev(group, now));

        if self.settings.best_price_enabled {
            found.extend(self.detect_best_price(group, now));
        }

        found
    }

    /// Most profitable cross-venue pairing of the two slots.
    fn best_two_way<'a>(&self, group: &'a EventGroup) -> Option<(Legs<'a>, Decimal)> {
        let mut slots = group.outcome_alignment.iter();
        let (slot_a, venues_a) = slots.next()?;
        let (slot_b, venues_b) = slots.next()?;

        let mut best: Option<(Legs<'a>, Decimal, Decimal)> = None;
        for (venue_a, market_a) in venues_a {
            for (venue_b, market_b) in venues_b {
                if venue_a == venue_b {
                    continue;
                }
                let legs = [leg(market_a), leg(market_b)];
                let Some(margin) = arbitrage_margin(&legs) else {
                    continue;
                };
                let fees = market_a.fee_pct + market_b.fee_pct;
                let better = match &best {
                    None => true,
                    // strict comparisons keep the first pairing in venue order on ties
                    Some((_, best_margin, best_fees)) => {
                        margin > *best_margin || (margin == *best_margin && fees < *best_fees)
                    }
                };
                if better {
                    let pair: Legs<'a> =
                        SmallVec::from_iter([(slot_a.as_str(), market_a), (slot_b.as_str(), market_b)]);
                    best = Some((pair, margin, fees));
                }
            }
        }

        best.map(|(legs, margin, _)| (legs, margin))
    }

    /// Best odds on every slot, when the legs span two or more venues.
    fn best_n_way<'a>(&self, group: &'a EventGroup) -> Option<(Legs<'a>, Decimal)> {
        let mut legs: Legs<'a> = SmallVec::new();
        for (slot, venues) in &group.outcome_alignment {
            let best = venues.values().reduce(|best, candidate| {
                if candidate.odds_decimal > best.odds_decimal
                    || (candidate.odds_decimal == best.odds_decimal && candidate.fee_pct < best.fee_pct)
                {
                    candidate
                } else {
                    best
                }
            })?;
            legs.push((slot.as_str(), best));
        }

        let venue_count = distinct_venues(&legs);
        if venue_count < 2 {
            return None;
        }

        let quotes: Vec<Leg> = legs.iter().map(|(_, m)| leg(m)).collect();
        arbitrage_margin(&quotes).map(|margin| (legs, margin))
    }

    fn build_arbitrage(
        &self,
        group: &EventGroup,
        legs: &Legs<'_>,
        margin: Decimal,
        now: OffsetDateTime,
    ) -> Option<Opportunity> {
        if margin < self.settings.min_arbitrage_profit_pct {
            return None;
        }

        let quotes: Vec<Leg> = legs.iter().map(|(_, m)| leg(m)).collect();
        let sizing = size_arbitrage(self.settings.total_capital_usd, &quotes)?;

        let instructions = legs
            .iter()
            .zip(&sizing.stakes)
            .enumerate()
            .map(|(i, ((_, market), stake))| instruction(i + 1, market, *stake))
            .collect::<Option<Vec<_>>>()?;

        let risk = classify(
            OpportunityKind::Arbitrage,
            margin,
            distinct_venues(legs),
            self.thresholds(),
        );

        Some(finish(Opportunity {
            kind: OpportunityKind::Arbitrage,
            event_group_id: group.group_id.clone(),
            event_name: group.canonical_name.clone(),
            category: group.category,
            outcome_pair: legs.iter().map(|(slot, _)| slot.to_string()).collect(),
            profit_pct: margin.round_dp(4),
            profit_usd: sizing.profit_usd.round_dp(2),
            total_stake: self.settings.total_capital_usd.round_dp(2),
            fees_usd: sizing.fees_usd.round_dp(2),
            risk,
            expires_in_seconds: expires_in_seconds(
                OpportunityKind::Arbitrage,
                oldest_age(legs.iter().map(|(_, m)| *m), now),
            ),
            detected_at: now,
            instructions,
            formatted_text: String::new(),
        }))
    }

    /// +EV of non-anchor venues against the first anchor quoting each slot.
    fn detect_ev(&self, group: &EventGroup, now: OffsetDateTime) -> Vec<Opportunity> {
        let mut found = Vec::new();

        for (slot, venues) in &group.outcome_alignment {
            let Some(anchor) = self
                .settings
                .anchor_venues
                .iter()
                .find_map(|anchor| venues.get(anchor))
            else {
                continue;
            };
            let Some(true_probability) = leg(anchor).probability() else {
                continue;
            };

            for (venue, candidate) in venues {
                if self.is_anchor(venue) {
                    continue;
                }
                let Some(edge) = ev_pct(true_probability, leg(candidate)) else {
                    debug!(venue = %venue, slot = %slot, "EV out of range");
                    continue;
                };
                if edge <= Decimal::ZERO || edge < self.settings.min_ev_pct {
                    continue;
                }
                if let Some(opp) = self.single_leg(
                    OpportunityKind::Ev,
                    group,
                    slot,
                    candidate,
                    edge,
                    |stake| Some(stake.checked_mul(edge)? / Decimal::ONE_HUNDRED),
                    [anchor, candidate],
                    now,
                ) {
                    found.push(opp);
                }
            }
        }

        found
    }

    /// Best odds clearly above the second best on a slot.
    fn detect_best_price(&self, group: &EventGroup, now: OffsetDateTime) -> Vec<Opportunity> {
        let mut found = Vec::new();

        for (slot, venues) in &group.outcome_alignment {
            if venues.len() < 2 {
                continue;
            }
            let mut ranked: Vec<&MarketRef> = venues.values().collect();
            ranked.sort_by(|a, b| b.odds_decimal.cmp(&a.odds_decimal));
            let (best, second) = (ranked[0], ranked[1]);

            let Some(edge) = price_edge_pct(best.odds_decimal, second.odds_decimal) else {
                continue;
            };
            if edge <= Decimal::ZERO || edge < self.settings.best_price_min_edge_pct {
                continue;
            }

            let extra = best.odds_decimal - second.odds_decimal;
            if let Some(opp) = self.single_leg(
                OpportunityKind::BestPrice,
                group,
                slot,
                best,
                edge,
                |stake| stake.checked_mul(extra),
                [best, second],
                now,
            ) {
                found.push(opp);
            }
        }

        found
    }

    #[allow(clippy::too_many_arguments)]
    fn single_leg(
        &self,
        kind: OpportunityKind,
        group: &EventGroup,
        slot: &str,
        market: &MarketRef,
        edge: Decimal,
        profit: impl Fn(Decimal) -> Option<Decimal>,
        quotes: [&MarketRef; 2],
        now: OffsetDateTime,
    ) -> Option<Opportunity> {
        let stake = fractional_stake(self.settings.total_capital_usd, self.settings.ev_stake_fraction)
            .round_dp(2);
        if stake <= Decimal::ZERO {
            return None;
        }

        Some(finish(Opportunity {
            kind,
            event_group_id: group.group_id.clone(),
            event_name: group.canonical_name.clone(),
            category: group.category,
            outcome_pair: vec![slot.to_string()],
            profit_pct: edge.round_dp(4),
            profit_usd: profit(stake)?.round_dp(2),
            total_stake: stake,
            fees_usd: (stake.checked_mul(market.fee_pct)? / Decimal::ONE_HUNDRED).round_dp(2),
            risk: classify(kind, edge, 1, self.thresholds()),
            expires_in_seconds: expires_in_seconds(kind, oldest_age(quotes.into_iter(), now)),
            detected_at: now,
            instructions: vec![instruction(1, market, stake)?],
            formatted_text: String::new(),
        }))
    }

    fn is_anchor(&self, venue: &str) -> bool {
        self.settings.anchor_venues.iter().any(|a| a == venue)
    }

    fn thresholds(&self) -> RiskThresholds {
        RiskThresholds {
            low_min_profit_pct: self.settings.risk_low_min_profit_pct,
            medium_min_profit_pct: self.settings.risk_medium_min_profit_pct,
        }
    }
}

fn leg(market: &MarketRef) -> Leg {
    Leg::new(market.odds_decimal, market.fee_pct)
}

fn distinct_venues(legs: &Legs<'_>) -> usize {
    let mut venues: SmallVec<[&str; 4]> = SmallVec::new();
    for (_, market) in legs {
        if !venues.contains(&market.venue_id.as_str()) {
            venues.push(&market.venue_id);
        }
    }
    venues.len()
}

fn oldest_age<'a>(markets: impl Iterator<Item = &'a MarketRef>, now: OffsetDateTime) -> i64 {
    markets.map(|m| m.age_secs(now)).max().unwrap_or(0)
}

fn instruction(step: usize, market: &MarketRef, stake: Decimal) -> Option<BetInstruction> {
    let stake_usd = stake.round_dp(2);
    let american = decimal_to_american(market.odds_decimal).ok()?;
    Some(BetInstruction {
        step: u32::try_from(step).ok()?,
        venue_id: market.venue_id.clone(),
        venue_name: venue_display_name(&market.venue_id),
        outcome_label: market.outcome_label.clone(),
        stake_usd,
        odds_decimal: market.odds_decimal,
        odds_american: format_american(american),
        potential_payout: stake_usd.checked_mul(market.odds_decimal)?.round_dp(2),
    })
}

fn venue_display_name(venue_id: &str) -> String {
    VenueProfile::for_venue(venue_id).display_name
}

fn finish(mut opportunity: Opportunity) -> Opportunity {
    opportunity.formatted_text = format_opportunity(&opportunity);
    opportunity
}

/// Counts by kind, for logging.
pub fn count_by_kind(opportunities: &[Opportunity]) -> BTreeMap<OpportunityKind, usize> {
    let mut counts = BTreeMap::new();
    for opp in opportunities {
        *counts.entry(opp.kind).or_insert(0) += 1;
    }
    counts
}
