//! Odds conversion between American, decimal and implied-probability formats.
//!
//! All functions are pure. Values are carried as [`Decimal`] so conversions are
//! exact to well beyond the six significant digits downstream comparisons need.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::OddsError;

/// Largest decimal odds accepted (a 0.01% implied probability).
pub const MAX_DECIMAL_ODDS: Decimal = dec!(10000);

/// Convert American odds to decimal odds.
///
/// `+110` → `2.10`, `-110` → `1.9090…`, `0` is rejected.
pub fn american_to_decimal(american: Decimal) -> Result<Decimal, OddsError> {
    if american.is_zero() {
        return Err(OddsError::ZeroAmerican);
    }

    let hundred = Decimal::ONE_HUNDRED;
    let ratio = if american > Decimal::ZERO {
        american.checked_div(hundred)
    } else {
        hundred.checked_div(american.abs())
    };
    let decimal = ratio
        .and_then(|r| r.checked_add(Decimal::ONE))
        .ok_or(OddsError::AmericanOutOfRange(american))?;
    ensure_decimal(decimal)?;
    Ok(decimal)
}

/// Convert decimal odds to whole American odds.
///
/// Decimal odds of 2.0 and above map to positive American odds.
pub fn decimal_to_american(decimal: Decimal) -> Result<i64, OddsError> {
    ensure_decimal(decimal)?;

    let hundred = Decimal::ONE_HUNDRED;
    let profit = decimal - Decimal::ONE;
    let american = if decimal >= Decimal::TWO {
        profit.checked_mul(hundred)
    } else {
        hundred.checked_div(profit).map(|a| -a)
    };

    american
        .ok_or(OddsError::DecimalOutOfRange(decimal))?
        .round()
        .to_i64()
        .ok_or(OddsError::DecimalOutOfRange(decimal))
}

/// Render American odds with an explicit sign, e.g. `+110` / `-110`.
pub fn format_american(american: i64) -> String {
    if american > 0 {
        format!("+{}", american)
    } else {
        american.to_string()
    }
}

/// Implied probability of decimal odds (`1 / decimal`). Requires `decimal > 1`.
pub fn decimal_to_probability(decimal: Decimal) -> Result<Decimal, OddsError> {
    ensure_decimal(decimal)?;
    Ok(Decimal::ONE / decimal)
}

/// Decimal odds for a probability (`1 / p`). Requires `0 < p < 1`.
pub fn probability_to_decimal(probability: Decimal) -> Result<Decimal, OddsError> {
    if probability <= Decimal::ZERO || probability >= Decimal::ONE {
        return Err(OddsError::ProbabilityOutOfRange(probability));
    }
    let decimal = Decimal::ONE
        .checked_div(probability)
        .ok_or(OddsError::ProbabilityOutOfRange(probability))?;
    ensure_decimal(decimal)?;
    Ok(decimal)
}

/// Implied probability of American odds.
pub fn american_to_probability(american: Decimal) -> Result<Decimal, OddsError> {
    decimal_to_probability(american_to_decimal(american)?)
}

fn ensure_decimal(decimal: Decimal) -> Result<(), OddsError> {
    if decimal <= Decimal::ONE || decimal > MAX_DECIMAL_ODDS {
        return Err(OddsError::DecimalOutOfRange(decimal));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn close(a: Decimal, b: Decimal) -> bool {
        (a - b).abs() < dec!(0.000001)
    }

    #[test]
    fn american_positive_and_negative() {
        assert_eq!(american_to_decimal(dec!(110)).unwrap(), dec!(2.10));
        assert_eq!(american_to_decimal(dec!(200)).unwrap(), dec!(3.00));
        assert_eq!(american_to_decimal(dec!(-200)).unwrap(), dec!(1.50));
        assert!(close(american_to_decimal(dec!(-110)).unwrap(), dec!(1.909091)));
    }

    #[test]
    fn american_zero_is_invalid() {
        assert_eq!(american_to_decimal(Decimal::ZERO), Err(OddsError::ZeroAmerican));
    }

    #[test]
    fn decimal_to_american_rounds() {
        assert_eq!(decimal_to_american(dec!(2.10)).unwrap(), 110);
        assert_eq!(decimal_to_american(dec!(1.50)).unwrap(), -200);
        assert_eq!(decimal_to_american(dec!(1.909091)).unwrap(), -110);
        assert_eq!(format_american(110), "+110");
        assert_eq!(format_american(-110), "-110");
    }

    #[test]
    fn probability_requires_decimal_above_one() {
        assert_eq!(decimal_to_probability(dec!(2)).unwrap(), dec!(0.5));
        assert!(decimal_to_probability(dec!(1)).is_err());
        assert!(decimal_to_probability(dec!(0.5)).is_err());
    }

    #[test]
    fn probability_bounds_are_exclusive() {
        assert!(probability_to_decimal(Decimal::ZERO).is_err());
        assert!(probability_to_decimal(Decimal::ONE).is_err());
        assert!(probability_to_decimal(dec!(-0.2)).is_err());
        assert_eq!(probability_to_decimal(dec!(0.25)).unwrap(), dec!(4));
        assert_eq!(american_to_probability(dec!(100)).unwrap(), dec!(0.5));
        assert!(probability_to_decimal(dec!(0.00001)).is_err());
        assert!(american_to_probability(Decimal::ZERO).is_err());
    }

    #[test]
    fn round_trip_is_stable() {
        for d in [dec!(1.01), dec!(1.5), dec!(1.909091), dec!(2.05), dec!(2.10), dec!(7.5), dec!(101)] {
            let back = probability_to_decimal(decimal_to_probability(d).unwrap()).unwrap();
            assert!(close(back, d), "{} round-tripped to {}", d, back);
        }
    }

    #[test]
    fn extreme_inputs_are_errors_not_panics() {
        let tiny = Decimal::new(1, 28);
        assert_eq!(american_to_decimal(-tiny), Err(OddsError::AmericanOutOfRange(-tiny)));
        assert!(american_to_decimal(Decimal::MAX).is_err());
        assert!(american_to_decimal(dec!(1000000)).is_err());
        assert!(decimal_to_american(Decimal::MAX).is_err());
        assert!(decimal_to_probability(dec!(10000.01)).is_err());
        assert_eq!(decimal_to_american(MAX_DECIMAL_ODDS).unwrap(), 999_900);
    }
}
