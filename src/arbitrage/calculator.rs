//! Arbitrage, EV and stake-sizing math.

use rust_decimal::Decimal;

/// One side of a bet: decimal odds and the venue fee in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Leg {
    pub odds_decimal: Decimal,
    pub fee_pct: Decimal,
}

impl Leg {
    pub fn new(odds_decimal: Decimal, fee_pct: Decimal) -> Self {
        Self {
            odds_decimal,
            fee_pct,
        }
    }

    /// Implied probability, `None` for odds at or below 1.
    pub fn probability(&self) -> Option<Decimal> {
        if self.odds_decimal <= Decimal::ONE {
            return None;
        }
        Decimal::ONE.checked_div(self.odds_decimal)
    }
}

/// Stakes and returns of a sized arbitrage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArbitrageSizing {
    /// Stake per leg, same order as the legs.
    pub stakes: Vec<Decimal>,
    /// Payout of whichever leg wins. Equal across legs.
    pub cashout: Decimal,
    pub fees_usd: Decimal,
    /// `cashout - capital - fees_usd`.
    pub profit_usd: Decimal,
}

/// Arbitrage margin in percent, `(1 - (ΣP + Σfee)) × 100`, when positive.
///
/// Fees are in percent per leg. Returns `None` when the legs do not guarantee a profit.
pub fn arbitrage_margin(legs: &[Leg]) -> Option<Decimal> {
    if legs.len() < 2 {
        return None;
    }

    let mut total = Decimal::ZERO;
    for leg in legs {
        let cost = leg.probability()?.checked_add(leg.fee_pct / Decimal::ONE_HUNDRED)?;
        total = total.checked_add(cost)?;
    }

    if total < Decimal::ONE {
        Some((Decimal::ONE - total) * Decimal::ONE_HUNDRED)
    } else {
        None
    }
}

/// Split `capital` across legs in proportion to implied probability.
///
/// `stake_i = C × P_i / ΣP`, which makes `stake_i × odds_i = C / ΣP` for every leg.
pub fn size_arbitrage(capital: Decimal, legs: &[Leg]) -> Option<ArbitrageSizing> {
    if capital <= Decimal::ZERO || legs.is_empty() {
        return None;
    }

    let probabilities: Vec<Decimal> = legs.iter().map(Leg::probability).collect::<Option<_>>()?;
    let sum: Decimal = probabilities.iter().copied().sum();

    let stakes: Vec<Decimal> = probabilities
        .iter()
        .map(|p| capital.checked_mul(*p)?.checked_div(sum))
        .collect::<Option<_>>()?;

    let cashout = capital.checked_div(sum)?;
    let mut fees_usd = Decimal::ZERO;
    for (stake, leg) in stakes.iter().zip(legs) {
        let fee = stake.checked_mul(leg.fee_pct)? / Decimal::ONE_HUNDRED;
        fees_usd = fees_usd.checked_add(fee)?;
    }
    let profit_usd = cashout.checked_sub(capital)?.checked_sub(fees_usd)?;

    Some(ArbitrageSizing {
        stakes,
        cashout,
        fees_usd,
        profit_usd,
    })
}

/// Expected value in percent: `(P_true × odds - 1 - fee) × 100`.
///
/// `None` when the product is out of range.
pub fn ev_pct(true_probability: Decimal, leg: Leg) -> Option<Decimal> {
    true_probability
        .checked_mul(leg.odds_decimal)?
        .checked_sub(Decimal::ONE + leg.fee_pct / Decimal::ONE_HUNDRED)?
        .checked_mul(Decimal::ONE_HUNDRED)
}

/// Fixed-fraction stake for single-leg signals.
pub fn fractional_stake(capital: Decimal, fraction: Decimal) -> Decimal {
    (capital * fraction).max(Decimal::ZERO)
}

/// Edge of `best` over `second` odds in percent.
pub fn price_edge_pct(best: Decimal, second: Decimal) -> Option<Decimal> {
    let ratio = best.checked_div(second)?;
    (ratio - Decimal::ONE).checked_mul(Decimal::ONE_HUNDRED)
}
