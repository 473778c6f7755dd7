//! Integration tests for the scan pipeline.
//!
//! Every test drives full scan cycles against mock venues; no network access is needed.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use arb_intel::arbitrage::{OpportunityKind, Risk};
use arb_intel::config::{DetectionSettings, MatchSettings, ScanSettings};
use arb_intel::error::ScanError;
use arb_intel::market::{MockConfig, MockVenueClient, RawMarket, RawOutcome, RawPrice, VenueClient};
use arb_intel::scanner::{MessageKind, OpportunityQuery, ScanPhase, Scanner, VenueState};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const FED: &str = "Will the Fed cut interest rates in March?";

fn scan_settings(venue_timeout_ms: u64, cycle_timeout_ms: u64) -> ScanSettings {
    ScanSettings {
        interval: Duration::from_secs(3600),
        venue_timeout: Duration::from_millis(venue_timeout_ms),
        cycle_timeout: Duration::from_millis(cycle_timeout_ms),
        broadcast_capacity: 16,
    }
}

fn scanner(venues: Vec<MockVenueClient>, match_settings: &MatchSettings, scan: ScanSettings) -> Scanner {
    let venues: Vec<Arc<dyn VenueClient>> = venues
        .into_iter()
        .map(|v| Arc::new(v) as Arc<dyn VenueClient>)
        .collect();
    Scanner::new(venues, match_settings, DetectionSettings::default(), scan)
}

fn binary_market(id: &str, name: &str, category: &str, yes: Decimal, no: Decimal) -> RawMarket {
    RawMarket::with_decimal_odds(id, name, Some(category), &[("Yes", yes), ("No", no)])
}

fn probability_market(id: &str, name: &str, category: &str, yes: Decimal) -> RawMarket {
    let outcome = |label: &str, p: Decimal| RawOutcome {
        outcome_id: None,
        label: label.to_string(),
        price: Some(RawPrice::Probability(p)),
    };
    RawMarket {
        market_id: id.to_string(),
        event_name: name.to_string(),
        category: Some(category.to_string()),
        observed_at: None,
        outcomes: vec![outcome("Yes", yes), outcome("No", Decimal::ONE - yes)],
    }
}

/// Venue A: Yes @ 2.10, venue B: No @ 2.05.
fn arbitrage_venues() -> Vec<MockVenueClient> {
    vec![
        MockVenueClient::new("venue_a").with_market(binary_market("a-1", FED, "economics", dec!(2.10), dec!(1.70))),
        MockVenueClient::new("venue_b").with_market(binary_market("b-1", FED, "Economy", dec!(1.75), dec!(2.05))),
    ]
}

#[tokio::test]
async fn end_to_end_arbitrage() {
    let scanner = scanner(arbitrage_venues(), &MatchSettings::default(), scan_settings(1000, 3000));

    let report = scanner.trigger_scan().await.unwrap();
    assert_eq!(report.markets_scanned, 4);
    assert_eq!(report.opportunities_found, 1);

    let snapshot = scanner.snapshot();
    assert_eq!(snapshot.event_groups.len(), 1);

    let arb = &snapshot.opportunities[0];
    assert_eq!(arb.kind, OpportunityKind::Arbitrage);
    assert!((arb.profit_pct - dec!(3.60)).abs() < dec!(0.01), "profit {}", arb.profit_pct);
    assert_eq!(arb.risk, Risk::Low);
    assert_eq!(arb.total_stake, dec!(1000));

    // equal cashout on both legs, up to cent rounding of the stakes
    let payouts: Vec<Decimal> = arb.instructions.iter().map(|i| i.stake_usd * i.odds_decimal).collect();
    assert_eq!(payouts.len(), 2);
    assert!((payouts[0] - payouts[1]).abs() <= dec!(0.03));
    assert!((arb.profit_usd - dec!(37.35)).abs() <= dec!(0.01));

    let labels: Vec<(&str, &str)> = arb
        .instructions
        .iter()
        .map(|i| (i.venue_id.as_str(), i.outcome_label.as_str()))
        .collect();
    assert!(labels.contains(&("venue_a", "Yes")));
    assert!(labels.contains(&("venue_b", "No")));

    assert!(arb.formatted_text.starts_with("ARBITRAGE OPPORTUNITY"));
    assert!(arb.formatted_text.contains("Guaranteed Profit"));
}

#[tokio::test]
async fn end_to_end_ev() {
    let anchor = MockVenueClient::new("polymarket")
        .with_market(probability_market("pm-1", FED, "economics", dec!(0.60)));
    let book = MockVenueClient::new("book")
        .with_fee_pct(dec!(2))
        .with_market(binary_market("bk-1", FED, "economics", dec!(1.80), dec!(1.95)));

    let scanner = scanner(vec![anchor, book], &MatchSettings::default(), scan_settings(1000, 3000));
    scanner.trigger_scan().await.unwrap();

    let result = scanner.query(&OpportunityQuery {
        kind: Some(OpportunityKind::Ev),
        ..OpportunityQuery::default()
    });
    assert_eq!(result.opportunities.len(), 1);

    let ev = &result.opportunities[0];
    assert!((ev.profit_pct - dec!(6.0)).abs() < dec!(0.01), "ev {}", ev.profit_pct);
    assert_eq!(ev.risk, Risk::High);
    assert_eq!(ev.instructions.len(), 1);
    assert_eq!(ev.instructions[0].venue_id, "book");
    assert_eq!(ev.instructions[0].outcome_label, "Yes");
    assert_eq!(ev.instructions[0].odds_american, "-125");
}

#[tokio::test]
async fn single_flight_rejects_overlapping_scan() {
    let slow = MockVenueClient::new("venue_a")
        .with_config(MockConfig {
            latency_ms: 200,
            fail_with: None,
        })
        .with_market(binary_market("a-1", FED, "economics", dec!(2.10), dec!(1.70)));
    let probe = slow.clone();
    let scanner = Arc::new(scanner(vec![slow], &MatchSettings::default(), scan_settings(1000, 3000)));

    let first = tokio::spawn({
        let scanner = Arc::clone(&scanner);
        async move { scanner.trigger_scan().await }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(scanner.phase(), ScanPhase::Fetching);

    let second = scanner.trigger_scan().await;
    assert!(matches!(second, Err(ScanError::ScanInProgress)));

    assert!(first.await.unwrap().is_ok());
    assert_eq!(probe.fetch_count(), 1);
    assert_eq!(scanner.phase(), ScanPhase::Idle);

    let counters = scanner.counters();
    assert_eq!(counters.completed, 1);
    assert_eq!(counters.rejected, 1);

    // idle again: the next trigger runs
    assert!(scanner.trigger_scan().await.is_ok());
}

#[tokio::test]
async fn slow_venue_does_not_block_the_others() {
    let mut venues = arbitrage_venues();
    venues.push(
        MockVenueClient::new("venue_c")
            .with_config(MockConfig {
                latency_ms: 2_000,
                fail_with: None,
            })
            .with_market(binary_market("c-1", FED, "economics", dec!(1.5), dec!(2.5))),
    );
    let scanner = scanner(venues, &MatchSettings::default(), scan_settings(100, 1000));

    let (_, mut rx) = scanner.subscribe();
    let report = scanner.trigger_scan().await.unwrap();
    assert!(!report.incomplete);
    assert!(report.duration_ms < 1000);
    assert_eq!(report.venues_degraded, 1);
    assert_eq!(report.opportunities_found, 1);

    let snapshot = scanner.snapshot();
    assert_eq!(snapshot.per_venue_status["venue_a"].state, VenueState::Active);
    assert_eq!(snapshot.per_venue_status["venue_b"].state, VenueState::Active);
    let slow = &snapshot.per_venue_status["venue_c"];
    assert_eq!(slow.state, VenueState::Degraded);
    assert!(slow.last_error.as_deref().unwrap().contains("timed out"));

    let message = rx.recv().await.unwrap();
    assert_eq!(message.kind, MessageKind::ScanResult);
    assert_eq!(message.opportunities.len(), 1);
    assert_eq!(message.new_opportunities, 1);
}

#[tokio::test]
async fn categories_are_a_hard_filter() {
    let name = "Will the Lakers win the NBA Finals?";
    let venues = vec![
        MockVenueClient::new("venue_a").with_market(binary_market("a-1", name, "sports", dec!(2.10), dec!(1.70))),
        MockVenueClient::new("venue_b").with_market(binary_market("b-1", name, "politics", dec!(1.75), dec!(2.05))),
    ];
    let scanner = scanner(venues, &MatchSettings::default(), scan_settings(1000, 3000));

    let report = scanner.trigger_scan().await.unwrap();
    assert_eq!(report.markets_scanned, 4);
    assert_eq!(report.opportunities_found, 0);

    let snapshot = scanner.snapshot();
    assert!(snapshot.event_groups.iter().all(|g| g.venue_count() < 2));
    for group in &snapshot.event_groups {
        assert!(group.member_markets.iter().all(|m| m.category == group.category));
    }
}

fn election_venues() -> Vec<MockVenueClient> {
    vec![
        MockVenueClient::new("polymarket").with_market(binary_market(
            "pm-1",
            "Winner of the 2024 US presidential election",
            "politics",
            dec!(2.10),
            dec!(1.70),
        )),
        MockVenueClient::new("betfair").with_market(RawMarket::with_decimal_odds(
            "bf-1",
            "2024 US presidential election winner",
            Some("politics"),
            &[("Trump", dec!(1.75)), ("Harris", dec!(2.05))],
        )),
    ]
}

#[tokio::test]
async fn yes_no_never_pairs_with_candidates_without_alias() {
    let scanner = scanner(election_venues(), &MatchSettings::default(), scan_settings(1000, 3000));
    scanner.trigger_scan().await.unwrap();

    let snapshot = scanner.snapshot();
    assert!(snapshot.opportunities.is_empty());
    assert!(snapshot.event_groups.iter().all(|g| g.venue_count() < 2));
}

#[tokio::test]
async fn explicit_alias_allows_the_pairing() {
    let mut aliases = BTreeMap::new();
    aliases.insert("trump".to_string(), "yes".to_string());
    aliases.insert("harris".to_string(), "no".to_string());
    let settings = MatchSettings {
        outcome_aliases: aliases,
        ..MatchSettings::default()
    };

    let scanner = scanner(election_venues(), &settings, scan_settings(1000, 3000));
    scanner.trigger_scan().await.unwrap();

    let snapshot = scanner.snapshot();
    assert_eq!(snapshot.event_groups.len(), 1);
    assert_eq!(snapshot.opportunities.len(), 1);
    let arb = &snapshot.opportunities[0];
    assert_eq!(arb.kind, OpportunityKind::Arbitrage);
    assert!(arb
        .instructions
        .iter()
        .any(|i| i.venue_id == "betfair" && i.outcome_label == "Harris"));
}

#[tokio::test]
async fn queries_explain_unreachable_venues() {
    let down = MockVenueClient::new("venue_a").with_config(MockConfig {
        latency_ms: 0,
        fail_with: Some(arb_intel::error::VenueFetchError::Transport {
            venue: "venue_a".to_string(),
            reason: "connection refused".to_string(),
        }),
    });
    let scanner = scanner(vec![down], &MatchSettings::default(), scan_settings(1000, 3000));

    let before = scanner.query(&OpportunityQuery::default());
    assert_eq!(before.reason.as_deref(), Some("no scan has completed yet"));

    scanner.trigger_scan().await.unwrap();
    let after = scanner.query(&OpportunityQuery::default());
    assert!(after.opportunities.is_empty());
    assert_eq!(
        after.reason.as_deref(),
        Some("no venues were reachable in the last scan")
    );

    let stats = scanner.stats();
    assert_eq!(stats.scans_completed, 1);
    assert_eq!(stats.total_opportunities, 0);
}

#[tokio::test]
async fn scan_results_count_only_new_opportunities() {
    let venues = arbitrage_venues();
    let venue_b = venues[1].clone();
    let scanner = scanner(venues, &MatchSettings::default(), scan_settings(1000, 3000));
    let (initial, mut rx) = scanner.subscribe();
    assert_eq!(initial.kind, MessageKind::Snapshot);
    assert!(initial.opportunities.is_empty());

    scanner.trigger_scan().await.unwrap();
    assert_eq!(rx.recv().await.unwrap().new_opportunities, 1);

    // same quotes: nothing new
    let repeat = scanner.trigger_scan().await.unwrap();
    assert_eq!(repeat.opportunities_found, 1);
    assert_eq!(repeat.new_opportunities, 0);
    assert_eq!(rx.recv().await.unwrap().new_opportunities, 0);

    // groups are rebuilt each cycle, so a withdrawn listing clears the opportunity
    venue_b.set_markets(Vec::new());
    let withdrawn = scanner.trigger_scan().await.unwrap();
    assert_eq!(withdrawn.opportunities_found, 0);
    assert!(rx.recv().await.unwrap().opportunities.is_empty());

    venue_b.set_markets(vec![binary_market("b-1", FED, "economics", dec!(1.75), dec!(2.05))]);
    let restored = scanner.trigger_scan().await.unwrap();
    assert_eq!(restored.new_opportunities, 1);
    assert_eq!(scanner.counters().completed, 4);
}

#[tokio::test]
async fn hostile_venue_data_never_aborts_the_cycle() {
    let huge = Decimal::from_i128_with_scale(10_i128.pow(28), 0);
    let tiny = Decimal::new(1, 28);
    let alpha = MockVenueClient::new("alpha")
        .with_market(binary_market("a-1", FED, "economics", huge, dec!(1.5)))
        .with_market(RawMarket {
            market_id: "a-2".to_string(),
            event_name: FED.to_string(),
            category: Some("economics".to_string()),
            observed_at: None,
            outcomes: vec![
                RawOutcome {
                    outcome_id: None,
                    label: "Yes".to_string(),
                    price: Some(RawPrice::American(-tiny)),
                },
                RawOutcome {
                    outcome_id: None,
                    label: "No".to_string(),
                    price: Some(RawPrice::Decimal(dec!(1.5))),
                },
            ],
        });
    let beta = MockVenueClient::new("beta").with_market(binary_market("b-1", FED, "economics", dec!(1.5), dec!(1.5)));
    let gamma = MockVenueClient::new("gamma").with_config(MockConfig {
        latency_ms: 0,
        fail_with: Some(arb_intel::error::VenueFetchError::RateLimited {
            venue: "gamma".to_string(),
            retry_after_secs: Some(u64::MAX),
        }),
    });
    let scanner = scanner(vec![alpha, beta, gamma], &MatchSettings::default(), scan_settings(1000, 3000));

    let report = scanner.trigger_scan().await.unwrap();
    assert_eq!(report.markets_scanned, 2);
    assert_eq!(report.opportunities_found, 0);
    assert_eq!(report.venues_degraded, 1);

    let snapshot = scanner.snapshot();
    assert_eq!(snapshot.per_venue_status["gamma"].state, VenueState::RateLimited);
    assert_eq!(snapshot.per_venue_status["beta"].state, VenueState::Active);

    // the next cycle still runs
    assert!(scanner.trigger_scan().await.is_ok());
}
