//! Cross-venue event matching.
//!
//! Markets are first folded into listings (one per venue market), bucketed by
//! category, scored pairwise across venues, filtered by outcome compatibility
//! and merged with union-find. Merges are applied best-score first and never put
//! two listings of the same venue into one group.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use tracing::{debug, instrument};

use super::outcomes::{is_binary, labels_align, outcomes_compatible, OutcomeAliases, NO, YES};
use super::similarity::{score_prepared, PreparedName};
use super::types::{EventGroup, OutcomeAlignment};
use crate::config::MatchSettings;
use crate::market::{Category, MarketRef};
use crate::utils::slugify;

/// All outcomes one venue quotes for one of its markets.
#[derive(Debug)]
struct Listing {
    venue_id: String,
    category: Category,
    event_name: String,
    prepared: PreparedName,
    markets: Vec<MarketRef>,
    /// Canonical label per entry of `markets`.
    labels: Vec<String>,
}

/// A scored cross-venue pair that passed the threshold and compatibility check.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    left: usize,
    right: usize,
    score: f64,
    length_delta: usize,
}

/// Union-find over listing indices, tracking the venues in each set.
struct VenueDisjointSets {
    parent: Vec<usize>,
    venues: Vec<BTreeSet<String>>,
}

impl VenueDisjointSets {
    fn new(listings: &[Listing]) -> Self {
        Self {
            parent: (0..listings.len()).collect(),
            venues: listings
                .iter()
                .map(|l| BTreeSet::from([l.venue_id.clone()]))
                .collect(),
        }
    }

    fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    /// Merge the sets of `a` and `b` unless they share a venue. Returns whether merged.
    fn union(&mut self, a: usize, b: usize) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb || !self.venues[ra].is_disjoint(&self.venues[rb]) {
            return false;
        }
        let (keep, absorb) = if ra < rb { (ra, rb) } else { (rb, ra) };
        self.parent[absorb] = keep;
        let moved = std::mem::take(&mut self.venues[absorb]);
        self.venues[keep].extend(moved);
        true
    }
}

/// Pure event matcher.
#[derive(Debug, Clone)]
pub struct EventMatcher {
    threshold: f64,
    aliases: OutcomeAliases,
}

impl Default for EventMatcher {
    fn default() -> Self {
        Self::new(&MatchSettings::default())
    }
}

impl EventMatcher {
    /// Create a matcher from settings.
    pub fn new(settings: &MatchSettings) -> Self {
        Self {
            threshold: settings.threshold,
            aliases: OutcomeAliases::new(&settings.outcome_aliases),
        }
    }

    /// Similarity threshold in use.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Cluster markets into event groups. Output order follows first appearance.
    #[instrument(skip_all, fields(markets = markets.len()))]
    pub fn match_markets(&self, markets: &[MarketRef]) -> Vec<EventGroup> {
        let listings = self.build_listings(markets);

        let mut buckets: BTreeMap<Category, Vec<usize>> = BTreeMap::new();
        for (index, listing) in listings.iter().enumerate() {
            buckets.entry(listing.category).or_default().push(index);
        }

        let mut candidates: Vec<Candidate> = Vec::new();
        for members in buckets.values() {
            for (pos, &left) in members.iter().enumerate() {
                for &right in &members[pos + 1..] {
                    if let Some(candidate) = self.evaluate_pair(&listings, left, right) {
                        candidates.push(candidate);
                    }
                }
            }
        }

        candidates.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.length_delta.cmp(&b.length_delta))
                .then(a.left.cmp(&b.left))
                .then(a.right.cmp(&b.right))
        });

        let mut sets = VenueDisjointSets::new(&listings);
        for candidate in &candidates {
            if !sets.union(candidate.left, candidate.right) {
                debug!(
                    left = %listings[candidate.left].event_name,
                    right = %listings[candidate.right].event_name,
                    score = candidate.score,
                    "Skipped merge: venue already in group"
                );
            }
        }

        let mut components: Vec<Vec<usize>> = Vec::new();
        let mut component_of_root: HashMap<usize, usize> = HashMap::new();
        for index in 0..listings.len() {
            let root = sets.find(index);
            let slot = *component_of_root.entry(root).or_insert_with(|| {
                components.push(Vec::new());
                components.len() - 1
            });
            components[slot].push(index);
        }

        let mut used_ids: HashSet<String> = HashSet::new();
        let groups: Vec<EventGroup> = components
            .iter()
            .map(|members| self.build_group(&listings, members, &mut used_ids))
            .collect();

        debug!(
            listings = listings.len(),
            candidates = candidates.len(),
            groups = groups.len(),
            "Matched markets"
        );

        groups
    }

    fn build_listings(&self, markets: &[MarketRef]) -> Vec<Listing> {
        let mut listings: Vec<Listing> = Vec::new();
        let mut index_of: HashMap<(&str, &str), usize> = HashMap::new();

        for market in markets {
            let key = (market.venue_id.as_str(), market.market_id.as_str());
            let label = self.aliases.canonical(&market.outcome_label);
            match index_of.get(&key) {
                Some(&index) => {
                    listings[index].markets.push(market.clone());
                    listings[index].labels.push(label);
                }
                None => {
                    index_of.insert(key, listings.len());
                    listings.push(Listing {
                        venue_id: market.venue_id.clone(),
                        category: market.category,
                        event_name: market.event_name.clone(),
                        prepared: PreparedName::new(&market.event_name),
                        markets: vec![market.clone()],
                        labels: vec![label],
                    });
                }
            }
        }

        listings
    }

    fn evaluate_pair(&self, listings: &[Listing], left: usize, right: usize) -> Option<Candidate> {
        let (a, b) = (&listings[left], &listings[right]);
        if a.venue_id == b.venue_id || a.category != b.category {
            return None;
        }

        let score = score_prepared(&a.prepared, &b.prepared);
        if score < self.threshold {
            return None;
        }

        if !outcomes_compatible(&a.labels, &b.labels) {
            debug!(
                left = %a.event_name,
                right = %b.event_name,
                score,
                "Rejected match: incompatible outcome sets"
            );
            return None;
        }

        Some(Candidate {
            left,
            right,
            score,
            length_delta: a.event_name.len().abs_diff(b.event_name.len()),
        })
    }

    fn build_group(
        &self,
        listings: &[Listing],
        members: &[usize],
        used_ids: &mut HashSet<String>,
    ) -> EventGroup {
        let first = &listings[members[0]];

        let canonical_name = members
            .iter()
            .map(|&i| listings[i].event_name.as_str())
            .fold(first.event_name.as_str(), |best, name| {
                if name.len() > best.len() {
                    name
                } else {
                    best
                }
            })
            .to_string();

        let binary = members.iter().all(|&i| is_binary(&listings[i].labels));
        let (outcome_alignment, exhaustive) = if binary {
            align_binary(listings, members)
        } else {
            align_multi(listings, members)
        };

        let group_id = unique_group_id(first.category, &canonical_name, used_ids);

        EventGroup {
            group_id,
            canonical_name,
            category: first.category,
            member_markets: members
                .iter()
                .flat_map(|&i| listings[i].markets.iter().cloned())
                .collect(),
            outcome_alignment,
            exhaustive,
        }
    }
}

fn align_binary(listings: &[Listing], members: &[usize]) -> (OutcomeAlignment, bool) {
    let mut alignment = OutcomeAlignment::new();
    let mut exhaustive = true;

    for &index in members {
        let listing = &listings[index];
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        for (market, label) in listing.markets.iter().zip(&listing.labels) {
            seen.insert(label.as_str());
            alignment
                .entry(label.clone())
                .or_default()
                .entry(listing.venue_id.clone())
                .or_insert_with(|| market.clone());
        }
        if !(seen.contains(YES) && seen.contains(NO)) {
            exhaustive = false;
        }
    }

    (alignment, exhaustive)
}

fn align_multi(listings: &[Listing], members: &[usize]) -> (OutcomeAlignment, bool) {
    let mut slots: Vec<String> = Vec::new();
    let mut placed: Vec<Vec<usize>> = Vec::with_capacity(members.len());

    for &index in members {
        let listing = &listings[index];
        let mut positions = Vec::with_capacity(listing.labels.len());
        for label in &listing.labels {
            let slot = match slots.iter().position(|s| labels_align(s, label)) {
                Some(slot) => slot,
                None => {
                    slots.push(label.clone());
                    slots.len() - 1
                }
            };
            positions.push(slot);
        }
        placed.push(positions);
    }

    let mut alignment = OutcomeAlignment::new();
    for (&index, positions) in members.iter().zip(&placed) {
        let listing = &listings[index];
        for (market, &slot) in listing.markets.iter().zip(positions) {
            alignment
                .entry(slots[slot].clone())
                .or_default()
                .entry(listing.venue_id.clone())
                .or_insert_with(|| market.clone());
        }
    }

    if members.len() > 1 {
        let before = alignment.len();
        alignment.retain(|_, venues| venues.len() >= 2);
        if alignment.len() < before {
            debug!(
                dropped = before - alignment.len(),
                "Dropped unaligned outcome slots"
            );
        }
    }

    let exhaustive = members.iter().all(|&index| {
        let listing = &listings[index];
        let covered: BTreeSet<&str> = alignment
            .iter()
            .filter(|(_, venues)| venues.contains_key(&listing.venue_id))
            .map(|(slot, _)| slot.as_str())
            .collect();
        covered.len() == alignment.len() && listing.labels.len() == alignment.len()
    });

    (alignment, exhaustive)
}

fn unique_group_id(category: Category, name: &str, used: &mut HashSet<String>) -> String {
    let slug = slugify(name);
    let base = if slug.is_empty() {
        category.to_string()
    } else {
        format!("{}-{}", category, slug)
    };

    let mut candidate = base.clone();
    let mut suffix = 2;
    while used.contains(&candidate) {
        candidate = format!("{}-{}", base, suffix);
        suffix += 1;
    }
    used.insert(candidate.clone());
    candidate
}
