//! Canonical market records and raw venue payloads.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use time::OffsetDateTime;

/// Canonical event category. Matching never crosses categories.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Category {
    Politics,
    Sports,
    Crypto,
    Economics,
    Tech,
    Entertainment,
    World,
    #[default]
    Other,
}

/// Global synonym groups, checked in declaration order.
const CATEGORY_SYNONYMS: &[(Category, &[&str])] = &[
    (
        Category::Politics,
        &[
            "politics", "political", "election", "elections", "government", "congress",
            "senate", "presidential", "vote", "voting", "president", "governor", "mayor",
        ],
    ),
    (
        Category::Sports,
        &[
            "sports", "sport", "nfl", "nba", "mlb", "nhl", "soccer", "football", "basketball",
            "baseball", "hockey", "tennis", "golf", "mma", "ufc", "boxing", "champions-league",
            "premier-league", "world-cup", "super-bowl",
        ],
    ),
    (
        Category::Crypto,
        &["crypto", "cryptocurrency", "bitcoin", "ethereum", "btc", "eth", "defi"],
    ),
    (
        Category::Tech,
        &["tech", "technology", "ai", "artificial-intelligence", "science", "space"],
    ),
    (
        Category::Economics,
        &[
            "economics", "economy", "finance", "financial", "stocks", "markets", "fed",
            "federal-reserve", "inflation", "gdp",
        ],
    ),
    (
        Category::Entertainment,
        &["entertainment", "movies", "tv", "music", "oscars", "awards"],
    ),
    (
        Category::World,
        &["world", "international", "geopolitics", "war", "conflict"],
    ),
];

impl Category {
    /// Map a free-form venue category string onto the canonical enumeration.
    ///
    /// Matches a canonical name, then any synonym that equals the whole string or
    /// one of its `-`-separated parts. Unmatched strings are [`Category::Other`].
    pub fn from_venue_str(raw: &str) -> Self {
        let key = canonical_key(raw);
        if key.is_empty() {
            return Category::Other;
        }

        if let Some(category) = Category::iter().find(|c| c.to_string() == key) {
            return category;
        }

        let parts: Vec<&str> = key.split('-').filter(|p| !p.is_empty()).collect();
        for (category, synonyms) in CATEGORY_SYNONYMS {
            for synonym in synonyms.iter() {
                if key == *synonym || parts.contains(synonym) || (synonym.contains('-') && key.contains(synonym)) {
                    return *category;
                }
            }
        }

        Category::Other
    }
}

/// Lowercase, with `_` and whitespace folded to `-`.
pub(crate) fn canonical_key(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '_' || c.is_whitespace() { '-' } else { c })
        .collect()
}

/// One venue's quote for one outcome of one event. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    /// Venue id (lowercase).
    pub venue_id: String,
    /// Venue-native market id.
    pub market_id: String,
    /// Canonical category.
    pub category: Category,
    /// Event name as quoted by the venue.
    pub event_name: String,
    /// Venue-native outcome id.
    pub outcome_id: String,
    /// Outcome label as quoted by the venue.
    pub outcome_label: String,
    /// Decimal odds, always > 1.
    pub odds_decimal: Decimal,
    /// Fee in percent (2.0 = 2%).
    pub fee_pct: Decimal,
    /// When the quote was observed.
    #[serde(with = "time::serde::rfc3339")]
    pub observed_at: OffsetDateTime,
}

/// Shared handle to an immutable market.
pub type MarketRef = Arc<Market>;

impl Market {
    /// Seconds since the quote was observed, relative to `now`.
    pub fn age_secs(&self, now: OffsetDateTime) -> i64 {
        (now - self.observed_at).whole_seconds().max(0)
    }
}

/// Native price representations accepted from venues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format", content = "value", rename_all = "lowercase")]
pub enum RawPrice {
    /// Already decimal odds.
    Decimal(Decimal),
    /// American odds, e.g. `+110` / `-150`.
    American(Decimal),
    /// Probability in `(0, 1)`.
    Probability(Decimal),
    /// Prediction-market price in cents, `(0, 100)`.
    Cents(Decimal),
}

/// One outcome of a raw venue record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawOutcome {
    #[serde(default)]
    pub outcome_id: Option<String>,
    pub label: String,
    #[serde(default)]
    pub price: Option<RawPrice>,
}

/// Venue-native market record, as returned by a venue client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMarket {
    pub market_id: String,
    pub event_name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub observed_at: Option<OffsetDateTime>,
    pub outcomes: Vec<RawOutcome>,
}

impl RawMarket {
    /// Build a record with decimal prices for every outcome.
    pub fn with_decimal_odds(
        market_id: impl Into<String>,
        event_name: impl Into<String>,
        category: Option<&str>,
        outcomes: &[(&str, Decimal)],
    ) -> Self {
        Self {
            market_id: market_id.into(),
            event_name: event_name.into(),
            category: category.map(str::to_string),
            observed_at: None,
            outcomes: outcomes
                .iter()
                .map(|(label, odds)| RawOutcome {
                    outcome_id: None,
                    label: label.to_string(),
                    price: Some(RawPrice::Decimal(*odds)),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::str::FromStr;

    #[test]
    fn category_from_str_is_case_insensitive() {
        assert_eq!(Category::from_str("Politics").unwrap(), Category::Politics);
        assert_eq!(Category::from_str("SPORTS").unwrap(), Category::Sports);
        assert_eq!(Category::Economics.to_string(), "economics");
    }

    #[test]
    fn venue_categories_map_to_canonical() {
        assert_eq!(Category::from_venue_str("US Elections"), Category::Politics);
        assert_eq!(Category::from_venue_str("nba"), Category::Sports);
        assert_eq!(Category::from_venue_str("Super Bowl LIX"), Category::Sports);
        assert_eq!(Category::from_venue_str("federal_reserve"), Category::Economics);
        assert_eq!(Category::from_venue_str("Bitcoin"), Category::Crypto);
        assert_eq!(Category::from_venue_str("prediction"), Category::Other);
        assert_eq!(Category::from_venue_str(""), Category::Other);
    }

    #[test]
    fn synonyms_do_not_match_inside_words() {
        // "ai" must not hit "mountain"
        assert_eq!(Category::from_venue_str("mountain"), Category::Other);
    }

    #[test]
    fn raw_price_is_tagged() {
        let json = r#"{"format":"american","value":"-150"}"#;
        let price: RawPrice = serde_json::from_str(json).unwrap();
        assert_eq!(price, RawPrice::American(dec!(-150)));
    }

    #[test]
    fn raw_market_defaults() {
        let json = r#"{
            "market_id": "m1",
            "event_name": "Will it rain?",
            "outcomes": [{"label": "Yes", "price": {"format": "cents", "value": "40"}}, {"label": "No"}]
        }"#;
        let raw: RawMarket = serde_json::from_str(json).unwrap();
        assert!(raw.category.is_none());
        assert!(raw.observed_at.is_none());
        assert!(raw.outcomes[1].price.is_none());
    }
}
