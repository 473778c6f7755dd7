//! Cross-venue arbitrage and +EV scanner.
//!
//! This library aggregates quotes for the same real-world event from several
//! independent venues (prediction markets and sportsbooks), matches them into
//! event groups, and reports guaranteed-profit (arbitrage) and positive expected
//! value bets with step-by-step staking instructions. It is advisory only: it
//! never holds credentials or places bets.
//!
//! # Arbitrage
//!
//! When the implied probabilities of complementary outcomes, bought at the best
//! venue for each, sum to less than one (after fees), staking in proportion to
//! those probabilities pays the same amount whichever outcome wins:
//!
//! ```text
//! Venue A  Yes @ 2.10   P = 0.4762
//! Venue B  No  @ 2.05   P = 0.4878
//! ─────────────────────────────────
//! Total:                0.9640 < 1.00
//! Margin:               3.60% guaranteed
//! ```
//!
//! # Modules
//!
//! - [`odds`]: American / decimal / probability conversions
//! - [`market`]: Canonical markets, venue profiles, normalization and venue clients
//! - [`matching`]: Fuzzy cross-venue event matching
//! - [`arbitrage`]: Opportunity detection, sizing and instruction text
//! - [`scanner`]: Scan orchestrator, snapshot cache, broadcaster and queries
//! - [`api`]: HTTP and WebSocket API
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`metrics`]: Prometheus metrics
//! - [`utils`]: Utility functions

pub mod api;
pub mod arbitrage;
pub mod config;
pub mod error;
pub mod market;
pub mod matching;
pub mod metrics;
pub mod odds;
pub mod scanner;
pub mod utils;

pub use config::Config;
pub use error::{AppError, Result};
