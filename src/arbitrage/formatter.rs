//! Human-readable instruction text.
//!
//! Rendering depends only on the opportunity's own fields (no clock reads), so
//! the same opportunity always renders the same text.

use rust_decimal::Decimal;

use super::types::{BetInstruction, Opportunity, OpportunityKind};
use crate::utils::truncate;

/// Standing advisory disclaimer attached to every output.
pub const DISCLAIMER: &str = "DISCLAIMER: This is advisory information only. No bets are placed automatically. \
All betting decisions and executions must be made by you. Past opportunities do not guarantee future results. \
Odds can change rapidly. Always verify current odds before placing any bets. Gamble responsibly.";

/// Rows shown by [`format_opportunities_table`].
pub const TABLE_ROWS: usize = 20;

/// Full multi-line rendering of an opportunity.
///
/// ```text
/// ARBITRAGE OPPORTUNITY - Will the Fed cut rates in March?
/// Category: Economics
///
/// Guaranteed Profit: $37.35 (3.60%)
/// Risk: LOW | Expires in ~30 seconds
///
/// INSTRUCTIONS:
/// 1. Bet $493.98 on Yes at Polymarket (+110)
/// 2. Bet $506.02 on No at DraftKings (+105)
///
/// Total Stake: $1000.00
/// Guaranteed Payout: $1037.35
/// ```
pub fn format_opportunity(opp: &Opportunity) -> String {
    let mut lines: Vec<String> = Vec::new();

    lines.push(format!("{} OPPORTUNITY - {}", opp.kind.label(), opp.event_name));
    lines.push(format!("Category: {}", title_case(&opp.category.to_string())));
    lines.push(String::new());

    let headline = match opp.kind {
        OpportunityKind::Arbitrage => "Guaranteed Profit",
        OpportunityKind::Ev => "Expected Value",
        OpportunityKind::BestPrice => "Extra Payout vs Next Best",
    };
    lines.push(format!(
        "{}: ${} ({}%)",
        headline,
        money(opp.profit_usd),
        money(opp.profit_pct)
    ));
    lines.push(format!(
        "Risk: {} | Expires in ~{} seconds",
        opp.risk, opp.expires_in_seconds
    ));
    lines.push(String::new());

    lines.push("INSTRUCTIONS:".to_string());
    lines.extend(opp.instructions.iter().map(format_instruction));
    lines.push(String::new());

    lines.push(format!("Total Stake: ${}", money(opp.total_stake)));
    if opp.kind == OpportunityKind::Arbitrage {
        let payout = opp.total_stake + opp.profit_usd + opp.fees_usd;
        lines.push(format!("Guaranteed Payout: ${}", money(payout)));
    }
    if opp.fees_usd > Decimal::ZERO {
        lines.push(format!("Fees: ${}", money(opp.fees_usd)));
    }

    lines.join("\n")
}

/// One numbered instruction, e.g. `1. Bet $238.17 on Lakers at DraftKings (+110)`.
pub fn format_instruction(instruction: &BetInstruction) -> String {
    format!(
        "{}. Bet ${} on {} at {} ({})",
        instruction.step,
        money(instruction.stake_usd),
        instruction.outcome_label,
        instruction.venue_name,
        instruction.odds_american
    )
}

/// Single-line summary, e.g. `ARB +3.60% | Fed cuts rates | polymarket/draftkings`.
pub fn format_opportunity_short(opp: &Opportunity) -> String {
    format!(
        "{} +{}% | {} | {}",
        short_kind(opp.kind),
        money(opp.profit_pct),
        opp.event_name,
        opp.venues().join("/")
    )
}

/// Fixed-width table of up to [`TABLE_ROWS`] opportunities, for CLI output.
pub fn format_opportunities_table(opportunities: &[Opportunity]) -> String {
    if opportunities.is_empty() {
        return "No opportunities found.".to_string();
    }

    let header = format!(
        "{:<5} {:>8} {:<40} {:<6} {}",
        "Type", "Profit", "Event", "Risk", "Venues"
    );
    let mut lines = vec![header.clone(), "-".repeat(header.len())];

    for opp in opportunities.iter().take(TABLE_ROWS) {
        lines.push(format!(
            "{:<5} {:>7}% {:<40} {:<6} {}",
            short_kind(opp.kind),
            money(opp.profit_pct),
            truncate(&opp.event_name, 40),
            opp.risk.to_string(),
            opp.venues().join("/")
        ));
    }

    if opportunities.len() > TABLE_ROWS {
        lines.push(format!("... and {} more", opportunities.len() - TABLE_ROWS));
    }

    lines.join("\n")
}

fn short_kind(kind: OpportunityKind) -> &'static str {
    match kind {
        OpportunityKind::Arbitrage => "ARB",
        OpportunityKind::Ev => "EV",
        OpportunityKind::BestPrice => "BEST",
    }
}

/// Two decimal places, always shown.
fn money(value: Decimal) -> String {
    format!("{:.2}", value.round_dp(2))
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
