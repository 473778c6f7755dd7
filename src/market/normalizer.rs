//! Raw venue records to canonical [`Market`]s.
//!
//! Each raw record expands into one `Market` per outcome. A record that cannot be
//! normalized is dropped whole with a logged reason; the rest of the batch survives.

use std::sync::Arc;

use rust_decimal::Decimal;
use time::OffsetDateTime;
use tracing::{debug, warn};

use super::profile::VenueProfile;
use super::types::{Market, MarketRef, RawMarket, RawPrice};
use crate::error::{NormalizeError, OddsError};
use crate::odds;

/// Decimal places kept on converted odds.
pub const ODDS_DECIMAL_PLACES: u32 = 4;

/// Result of normalizing one venue batch.
#[derive(Debug, Default)]
pub struct NormalizeReport {
    /// Markets produced, in input order.
    pub markets: Vec<MarketRef>,
    /// Records dropped, with reasons.
    pub dropped: Vec<NormalizeError>,
}

/// Normalize one venue's raw payload.
pub fn normalize_batch(
    profile: &VenueProfile,
    raw: &[RawMarket],
    fetched_at: OffsetDateTime,
) -> NormalizeReport {
    let mut report = NormalizeReport::default();

    for record in raw {
        match normalize_record(profile, record, fetched_at) {
            Ok(markets) => report.markets.extend(markets.into_iter().map(Arc::new)),
            Err(reason) => {
                debug!(venue = %profile.venue_id, %reason, "Dropped raw market");
                report.dropped.push(reason);
            }
        }
    }

    if !report.dropped.is_empty() {
        warn!(
            venue = %profile.venue_id,
            dropped = report.dropped.len(),
            kept = report.markets.len(),
            "Some venue records were malformed"
        );
    }

    report
}

/// Normalize one raw record into one `Market` per outcome.
pub fn normalize_record(
    profile: &VenueProfile,
    raw: &RawMarket,
    fetched_at: OffsetDateTime,
) -> Result<Vec<Market>, NormalizeError> {
    let market_id = raw.market_id.trim();
    let event_name = raw.event_name.trim();

    if event_name.is_empty() {
        return Err(NormalizeError::EmptyEventName {
            market_id: market_id.to_string(),
        });
    }

    if raw.outcomes.len() < 2 {
        return Err(NormalizeError::TooFewOutcomes {
            market_id: market_id.to_string(),
            count: raw.outcomes.len(),
        });
    }

    if profile.binary_only && !is_yes_no(raw) {
        return Err(NormalizeError::NonBinary {
            market_id: market_id.to_string(),
        });
    }

    let category = profile.map_category(raw.category.as_deref());
    let fee_pct = profile.fee_pct();
    let observed_at = raw.observed_at.unwrap_or(fetched_at);

    raw.outcomes
        .iter()
        .enumerate()
        .map(|(index, outcome)| {
            let label = outcome.label.trim();
            let price = outcome.price.ok_or_else(|| NormalizeError::MissingPrice {
                market_id: market_id.to_string(),
                label: label.to_string(),
            })?;

            let odds_decimal =
                to_decimal_odds(price).map_err(|source| NormalizeError::InvalidOdds {
                    market_id: market_id.to_string(),
                    source,
                })?;

            Ok(Market {
                venue_id: profile.venue_id.clone(),
                market_id: market_id.to_string(),
                category,
                event_name: event_name.to_string(),
                outcome_id: outcome
                    .outcome_id
                    .clone()
                    .unwrap_or_else(|| format!("{}:{}", market_id, index)),
                outcome_label: label.to_string(),
                odds_decimal,
                fee_pct,
                observed_at,
            })
        })
        .collect()
}

/// Convert a native price into decimal odds rounded to [`ODDS_DECIMAL_PLACES`].
pub fn to_decimal_odds(price: RawPrice) -> Result<Decimal, OddsError> {
    let decimal = match price {
        RawPrice::Decimal(d) => {
            odds::decimal_to_probability(d)?;
            d
        }
        RawPrice::American(a) => odds::american_to_decimal(a)?,
        RawPrice::Probability(p) => odds::probability_to_decimal(p)?,
        RawPrice::Cents(c) => odds::probability_to_decimal(c / Decimal::ONE_HUNDRED)?,
    };

    let rounded = decimal.round_dp(ODDS_DECIMAL_PLACES);
    if rounded <= Decimal::ONE {
        // 0.99999 probability rounds to 1.0000
        return Err(OddsError::DecimalOutOfRange(rounded));
    }
    Ok(rounded)
}

fn is_yes_no(raw: &RawMarket) -> bool {
    if raw.outcomes.len() != 2 {
        return false;
    }
    let mut labels: Vec<String> = raw
        .outcomes
        .iter()
        .map(|o| o.label.trim().to_lowercase())
        .collect();
    labels.sort();
    labels == ["no", "yes"]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::profile::FeeModel;
    use crate::market::types::{Category, RawOutcome};
    use rust_decimal_macros::dec;

    fn outcome(label: &str, price: Option<RawPrice>) -> RawOutcome {
        RawOutcome {
            outcome_id: None,
            label: label.to_string(),
            price,
        }
    }

    fn raw(id: &str, outcomes: Vec<RawOutcome>) -> RawMarket {
        RawMarket {
            market_id: id.to_string(),
            event_name: "Will the Fed cut rates in March?".to_string(),
            category: Some("Economy".to_string()),
            observed_at: None,
            outcomes,
        }
    }

    #[test]
    fn converts_every_native_format() {
        assert_eq!(to_decimal_odds(RawPrice::Decimal(dec!(2.10))).unwrap(), dec!(2.10));
        assert_eq!(to_decimal_odds(RawPrice::American(dec!(110))).unwrap(), dec!(2.10));
        assert_eq!(to_decimal_odds(RawPrice::American(dec!(-110))).unwrap(), dec!(1.9091));
        assert_eq!(to_decimal_odds(RawPrice::Probability(dec!(0.4))).unwrap(), dec!(2.5));
        assert_eq!(to_decimal_odds(RawPrice::Cents(dec!(25))).unwrap(), dec!(4));
    }

    #[test]
    fn rejects_degenerate_prices() {
        assert!(to_decimal_odds(RawPrice::Probability(Decimal::ZERO)).is_err());
        assert!(to_decimal_odds(RawPrice::Probability(dec!(-0.1))).is_err());
        assert!(to_decimal_odds(RawPrice::Cents(dec!(100))).is_err());
        assert!(to_decimal_odds(RawPrice::American(Decimal::ZERO)).is_err());
        assert!(to_decimal_odds(RawPrice::Decimal(dec!(1))).is_err());
        assert!(to_decimal_odds(RawPrice::Probability(dec!(0.99999))).is_err());
    }

    #[test]
    fn hostile_numbers_are_dropped_with_the_rest_kept() {
        let tiny = Decimal::new(1, 28);
        let huge = Decimal::from_i128_with_scale(10_i128.pow(28), 0);
        let fair = |id: &str| {
            raw(
                id,
                vec![
                    outcome("Yes", Some(RawPrice::Decimal(dec!(2)))),
                    outcome("No", Some(RawPrice::Decimal(dec!(2)))),
                ],
            )
        };
        let hostile = |id: &str, price: RawPrice| {
            raw(
                id,
                vec![outcome("Yes", Some(price)), outcome("No", Some(RawPrice::Decimal(dec!(1.5))))],
            )
        };
        let batch = vec![
            fair("ok-1"),
            hostile("huge-decimal", RawPrice::Decimal(huge)),
            hostile("tiny-american", RawPrice::American(-tiny)),
            hostile("max-american", RawPrice::American(Decimal::MAX)),
            hostile("tiny-probability", RawPrice::Probability(tiny)),
            hostile("tiny-cents", RawPrice::Cents(tiny)),
            fair("ok-2"),
        ];

        let report = normalize_batch(&VenueProfile::new("alpha", "Alpha"), &batch, OffsetDateTime::now_utc());
        assert_eq!(report.markets.len(), 4);
        assert_eq!(report.dropped.len(), 5);
        assert!(report.markets.iter().all(|m| m.odds_decimal <= odds::MAX_DECIMAL_ODDS));
    }

    #[test]
    fn expands_outcomes_with_profile_fee() {
        let profile = VenueProfile::new("betfair", "Betfair").with_fee(FeeModel::Percentage { pct: dec!(2) });
        let now = OffsetDateTime::now_utc();
        let record = raw(
            "fed-mar",
            vec![
                outcome("Yes", Some(RawPrice::Decimal(dec!(2.5)))),
                outcome("No", Some(RawPrice::Decimal(dec!(1.6)))),
            ],
        );

        let markets = normalize_record(&profile, &record, now).unwrap();
        assert_eq!(markets.len(), 2);
        assert_eq!(markets[0].category, Category::Economics);
        assert_eq!(markets[0].fee_pct, dec!(2));
        assert_eq!(markets[0].outcome_id, "fed-mar:0");
        assert_eq!(markets[1].outcome_label, "No");
        assert_eq!(markets[1].observed_at, now);
    }

    #[test]
    fn malformed_records_are_dropped_not_fatal() {
        let profile = VenueProfile::new("manifold", "Manifold");
        let batch = vec![
            raw(
                "ok",
                vec![
                    outcome("Yes", Some(RawPrice::Probability(dec!(0.5)))),
                    outcome("No", Some(RawPrice::Probability(dec!(0.5)))),
                ],
            ),
            raw(
                "missing",
                vec![outcome("Yes", Some(RawPrice::Probability(dec!(0.5)))), outcome("No", None)],
            ),
            raw(
                "zero",
                vec![
                    outcome("Yes", Some(RawPrice::Probability(Decimal::ZERO))),
                    outcome("No", Some(RawPrice::Probability(dec!(0.9)))),
                ],
            ),
            raw("single", vec![outcome("Yes", Some(RawPrice::Decimal(dec!(2))))]),
        ];

        let report = normalize_batch(&profile, &batch, OffsetDateTime::now_utc());
        assert_eq!(report.markets.len(), 2);
        assert_eq!(report.dropped.len(), 3);
        assert!(matches!(report.dropped[0], NormalizeError::MissingPrice { .. }));
        assert!(matches!(report.dropped[1], NormalizeError::InvalidOdds { .. }));
        assert!(matches!(report.dropped[2], NormalizeError::TooFewOutcomes { count: 1, .. }));
    }

    #[test]
    fn binary_only_venue_rejects_multi_outcome() {
        let profile = VenueProfile::for_venue("kalshi");
        let record = raw(
            "multi",
            vec![
                outcome("Trump", Some(RawPrice::Decimal(dec!(2)))),
                outcome("Harris", Some(RawPrice::Decimal(dec!(2.2)))),
            ],
        );

        let err = normalize_record(&profile, &record, OffsetDateTime::now_utc()).unwrap_err();
        assert_eq!(
            err,
            NormalizeError::NonBinary {
                market_id: "multi".to_string()
            }
        );
    }

    #[test]
    fn empty_event_name_is_dropped() {
        let profile = VenueProfile::new("manifold", "Manifold");
        let mut record = raw(
            "blank",
            vec![
                outcome("Yes", Some(RawPrice::Decimal(dec!(2)))),
                outcome("No", Some(RawPrice::Decimal(dec!(2)))),
            ],
        );
        record.event_name = "   ".to_string();

        assert!(matches!(
            normalize_record(&profile, &record, OffsetDateTime::now_utc()),
            Err(NormalizeError::EmptyEventName { .. })
        ));
    }
}
