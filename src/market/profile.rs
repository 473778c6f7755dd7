//! Venue profiles: fee schedules and category mappings.

use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::types::{canonical_key, Category};

/// How a venue charges for a bet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeeModel {
    /// No fee.
    None,
    /// Percentage of stake.
    Percentage { pct: Decimal },
    /// Fixed charge per bet, expressed against a reference stake.
    Flat {
        usd: Decimal,
        reference_stake_usd: Decimal,
    },
    /// Exchange-style maker/taker schedule. Advisory bets cross the spread, so they pay taker.
    MakerTaker { maker_pct: Decimal, taker_pct: Decimal },
}

impl FeeModel {
    /// Scalar fee in percent applied to every quote of the venue.
    pub fn fee_pct(&self) -> Decimal {
        match *self {
            FeeModel::None => Decimal::ZERO,
            FeeModel::Percentage { pct } => pct,
            FeeModel::Flat {
                usd,
                reference_stake_usd,
            } => usd
                .checked_div(reference_stake_usd)
                .map(|ratio| ratio * Decimal::ONE_HUNDRED)
                .unwrap_or(Decimal::ZERO),
            FeeModel::MakerTaker { taker_pct, .. } => taker_pct,
        }
    }
}

/// Venue-specific mapping table consumed by the normalizer.
#[derive(Debug, Clone)]
pub struct VenueProfile {
    /// Venue id (lowercase).
    pub venue_id: String,
    /// Human-readable venue name used in instructions.
    pub display_name: String,
    pub fee_model: FeeModel,
    /// Venue-native category strings that override the global synonym groups.
    pub category_synonyms: HashMap<String, Category>,
    /// Reject any record that is not a two-outcome market.
    pub binary_only: bool,
}

impl VenueProfile {
    /// Profile with no fee and no overrides.
    pub fn new(venue_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            venue_id: venue_id.into().to_lowercase(),
            display_name: display_name.into(),
            fee_model: FeeModel::None,
            category_synonyms: HashMap::new(),
            binary_only: false,
        }
    }

    /// Set the fee model.
    pub fn with_fee(mut self, fee_model: FeeModel) -> Self {
        self.fee_model = fee_model;
        self
    }

    /// Add a venue-native category synonym.
    pub fn with_category(mut self, native: &str, category: Category) -> Self {
        self.category_synonyms.insert(canonical_key(native), category);
        self
    }

    /// Mark the venue as Yes/No only.
    pub fn binary_only(mut self) -> Self {
        self.binary_only = true;
        self
    }

    /// Scalar fee in percent.
    pub fn fee_pct(&self) -> Decimal {
        self.fee_model.fee_pct()
    }

    /// Map a venue category string. Venue overrides win over global synonyms.
    pub fn map_category(&self, raw: Option<&str>) -> Category {
        let Some(raw) = raw else {
            return Category::Other;
        };
        self.category_synonyms
            .get(&canonical_key(raw))
            .copied()
            .unwrap_or_else(|| Category::from_venue_str(raw))
    }

    /// Built-in profile for a known venue, or the default profile (1% fee).
    pub fn for_venue(venue_id: &str) -> Self {
        let id = venue_id.trim().to_lowercase();
        match id.as_str() {
            "polymarket" => VenueProfile::new(id, "Polymarket")
                .with_category("us-current-affairs", Category::Politics)
                .with_category("pop-culture", Category::Entertainment),
            "kalshi" => VenueProfile::new(id, "Kalshi")
                .with_category("climate", Category::World)
                .with_category("financials", Category::Economics)
                .binary_only(),
            "manifold" => VenueProfile::new(id, "Manifold"),
            "predictit" => VenueProfile::new(id, "PredictIt")
                .with_fee(FeeModel::Percentage { pct: dec!(5) })
                .binary_only(),
            "betfair" => VenueProfile::new(id, "Betfair").with_fee(FeeModel::MakerTaker {
                maker_pct: Decimal::ZERO,
                taker_pct: dec!(2),
            }),
            "draftkings" => VenueProfile::new(id, "DraftKings"),
            "fanduel" => VenueProfile::new(id, "FanDuel"),
            "betmgm" => VenueProfile::new(id, "BetMGM"),
            _ => {
                let name = title_case(&id);
                VenueProfile::new(id, name).with_fee(FeeModel::Percentage { pct: Decimal::ONE })
            }
        }
    }
}

fn title_case(id: &str) -> String {
    let mut chars = id.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fee_models_reduce_to_scalar() {
        assert_eq!(FeeModel::None.fee_pct(), Decimal::ZERO);
        assert_eq!(FeeModel::Percentage { pct: dec!(2.5) }.fee_pct(), dec!(2.5));
        assert_eq!(
            FeeModel::Flat {
                usd: dec!(1),
                reference_stake_usd: dec!(200)
            }
            .fee_pct(),
            dec!(0.5)
        );
        assert_eq!(
            FeeModel::Flat {
                usd: dec!(1),
                reference_stake_usd: Decimal::ZERO
            }
            .fee_pct(),
            Decimal::ZERO
        );
        assert_eq!(
            FeeModel::MakerTaker {
                maker_pct: dec!(0),
                taker_pct: dec!(2)
            }
            .fee_pct(),
            dec!(2)
        );
    }

    #[test]
    fn built_in_profiles() {
        assert_eq!(VenueProfile::for_venue("Betfair").fee_pct(), dec!(2));
        assert_eq!(VenueProfile::for_venue("polymarket").fee_pct(), Decimal::ZERO);
        assert!(VenueProfile::for_venue("kalshi").binary_only);

        let unknown = VenueProfile::for_venue("smarkets");
        assert_eq!(unknown.fee_pct(), dec!(1));
        assert_eq!(unknown.display_name, "Smarkets");
    }

    #[test]
    fn venue_overrides_win() {
        let profile = VenueProfile::for_venue("kalshi");
        assert_eq!(profile.map_category(Some("Financials")), Category::Economics);
        assert_eq!(profile.map_category(Some("Elections")), Category::Politics);
        assert_eq!(profile.map_category(None), Category::Other);
    }
}
