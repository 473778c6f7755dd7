//! Mock venue client for tests and demo scans.
//!
//! This module provides a venue that serves a fixed payload without making
//! network requests, with configurable latency and failure.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::profile::{FeeModel, VenueProfile};
use super::types::RawMarket;
use super::venue::VenueClient;
use crate::error::VenueFetchError;

/// Configuration for mock client behavior.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Simulated latency in milliseconds.
    pub latency_ms: u64,
    /// Error to return instead of the payload.
    pub fail_with: Option<VenueFetchError>,
}

/// Mock venue client for testing.
#[derive(Debug, Clone)]
pub struct MockVenueClient {
    profile: VenueProfile,
    config: MockConfig,
    markets: Arc<Mutex<Vec<RawMarket>>>,
    fetches: Arc<AtomicU64>,
}

impl MockVenueClient {
    /// Create a fee-free mock venue.
    pub fn new(venue_id: &str) -> Self {
        Self::with_profile(VenueProfile::new(venue_id, venue_id))
    }

    /// Create a mock venue with an explicit profile.
    pub fn with_profile(profile: VenueProfile) -> Self {
        Self {
            profile,
            config: MockConfig::default(),
            markets: Arc::new(Mutex::new(Vec::new())),
            fetches: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Replace the mock configuration.
    pub fn with_config(mut self, config: MockConfig) -> Self {
        self.config = config;
        self
    }

    /// Set a flat percentage fee.
    pub fn with_fee_pct(mut self, pct: Decimal) -> Self {
        self.profile.fee_model = FeeModel::Percentage { pct };
        self
    }

    /// Add a raw market to the payload.
    pub fn with_market(self, market: RawMarket) -> Self {
        self.push_market(market);
        self
    }

    /// Add a raw market to the payload of a shared client.
    pub fn push_market(&self, market: RawMarket) {
        if let Ok(mut markets) = self.markets.lock() {
            markets.push(market);
        }
    }

    /// Replace the whole payload.
    pub fn set_markets(&self, markets: Vec<RawMarket>) {
        if let Ok(mut current) = self.markets.lock() {
            *current = markets;
        }
    }

    /// Number of fetches served (including failures).
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl VenueClient for MockVenueClient {
    fn venue_id(&self) -> &str {
        &self.profile.venue_id
    }

    fn profile(&self) -> VenueProfile {
        self.profile.clone()
    }

    async fn fetch(&self) -> Result<Vec<RawMarket>, VenueFetchError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);

        if self.config.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.config.latency_ms)).await;
        }

        if let Some(error) = &self.config.fail_with {
            return Err(error.clone());
        }

        self.markets
            .lock()
            .map(|markets| markets.clone())
            .map_err(|_| VenueFetchError::Transport {
                venue: self.profile.venue_id.clone(),
                reason: "mock payload lock poisoned".to_string(),
            })
    }
}

/// Three demo venues quoting overlapping politics, sports and economics events.
///
/// Prices are chosen so the demo scan finds both arbitrage and +EV signals.
pub fn demo_venues() -> Vec<MockVenueClient> {
    let polymarket = MockVenueClient::with_profile(VenueProfile::for_venue("polymarket"))
        .with_market(RawMarket::with_decimal_odds(
            "pm-fed-march",
            "Will the Fed cut interest rates in March 2025?",
            Some("economics"),
            &[("Yes", dec!(2.10)), ("No", dec!(1.85))],
        ))
        .with_market(RawMarket::with_decimal_odds(
            "pm-super-bowl",
            "Will the Chiefs win Super Bowl LIX?",
            Some("sports"),
            &[("Yes", dec!(1.6667)), ("No", dec!(2.20))],
        ));

    let draftkings = MockVenueClient::with_profile(VenueProfile::for_venue("draftkings"))
        .with_market(RawMarket::with_decimal_odds(
            "dk-8812",
            "Fed cuts interest rates in March 2025",
            Some("Finance"),
            &[("Yes", dec!(1.80)), ("No", dec!(2.05))],
        ))
        .with_market(RawMarket::with_decimal_odds(
            "dk-9001",
            "Chiefs win Super Bowl LIX",
            Some("NFL"),
            &[("Yes", dec!(1.80)), ("No", dec!(2.00))],
        ));

    let fanduel = MockVenueClient::with_profile(VenueProfile::for_venue("fanduel")).with_market(
        RawMarket::with_decimal_odds(
            "fd-pres-2028",
            "Who will win the 2028 presidential election?",
            Some("Politics"),
            &[("Yes", dec!(1.95)), ("No", dec!(1.95))],
        ),
    );

    vec![polymarket, draftkings, fanduel]
}
