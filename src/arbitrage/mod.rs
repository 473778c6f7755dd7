//! Opportunity detection and sizing.
//!
//! This module handles:
//! - Arbitrage, +EV and best-price detection over event groups
//! - Stake sizing and fee accounting
//! - Risk tiers, expiry and instruction text

pub mod calculator;
pub mod detector;
pub mod formatter;
pub mod risk;
pub mod types;

pub use calculator::{arbitrage_margin, ev_pct, size_arbitrage, ArbitrageSizing, Leg};
pub use detector::{count_by_kind, OpportunityDetector};
pub use formatter::{
    format_opportunities_table, format_opportunity, format_opportunity_short, DISCLAIMER,
};
pub use risk::{classify, expires_in_seconds, RiskThresholds};
pub use types::{BetInstruction, Opportunity, OpportunityKind, Risk};
