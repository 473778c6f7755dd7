//! Scan cycle driver.
//!
//! One cycle runs `fetch -> normalize -> match -> detect -> publish`. Only one
//! cycle is in flight at a time; a trigger that arrives while a cycle runs is
//! rejected with [`ScanError::ScanInProgress`], never queued.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;
use strum::Display;
use time::OffsetDateTime;
use tokio::sync::{broadcast, Notify};
use tokio::task::{self, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use super::broadcaster::{Broadcaster, ScanMessage};
use super::cache::{CycleSummary, ScanCache, Snapshot, VenueState, VenueStatus};
use super::query::{
    group_detail, markets_report, query_opportunities, GroupDetail, MarketsReport,
    OpportunityQuery, QueryResult, ScanCounters, ScannerStats,
};
use crate::arbitrage::OpportunityDetector;
use crate::config::{Config, DetectionSettings, MatchSettings, ScanSettings};
use crate::error::{ScanError, VenueFetchError};
use crate::market::{normalize_batch, MarketRef, RawMarket, VenueClient, VenueProfile};
use crate::matching::EventMatcher;
use crate::metrics::{
    add_markets_normalized, inc_scans_completed, inc_scans_incomplete, inc_scans_rejected,
    inc_venue_failures, record_venue_fetch_latency, set_event_groups, timer_scan_cycle,
};

/// Cycle state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum ScanPhase {
    Idle = 0,
    Fetching = 1,
    Normalizing = 2,
    Matching = 3,
    Detecting = 4,
    Publishing = 5,
}

impl ScanPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Fetching,
            2 => Self::Normalizing,
            3 => Self::Matching,
            4 => Self::Detecting,
            5 => Self::Publishing,
            _ => Self::Idle,
        }
    }
}

/// Result of one completed cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub markets_scanned: usize,
    pub opportunities_found: usize,
    pub new_opportunities: usize,
    pub duration_ms: u64,
    /// Watchdog fired; some venues were abandoned.
    pub incomplete: bool,
    pub venues_degraded: usize,
}

/// Holds the single-flight slot; resets the phase to idle when dropped,
/// including when the cycle future is cancelled.
struct PhaseGuard<'a> {
    phase: &'a AtomicU8,
}

impl<'a> PhaseGuard<'a> {
    fn acquire(phase: &'a AtomicU8) -> Option<Self> {
        phase
            .compare_exchange(
                ScanPhase::Idle as u8,
                ScanPhase::Fetching as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .ok()
            .map(|_| Self { phase })
    }

    fn enter(&self, next: ScanPhase) {
        debug!(phase = %next, "Scan phase");
        self.phase.store(next as u8, Ordering::Release);
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.phase.store(ScanPhase::Idle as u8, Ordering::Release);
    }
}

/// What came back from the fetch fan-out.
#[derive(Default)]
struct FetchOutcome {
    batches: Vec<(VenueProfile, Vec<RawMarket>, u64)>,
    status: BTreeMap<String, VenueStatus>,
    incomplete: bool,
}

/// Longest backoff honoured from a venue's retry-after.
pub const MAX_BACKOFF_SECS: u64 = 3600;

type FetchResult = (String, VenueProfile, Result<Vec<RawMarket>, VenueFetchError>, u64);

/// Scan orchestrator and owner of the cache.
pub struct Scanner {
    venues: Vec<Arc<dyn VenueClient>>,
    matcher: EventMatcher,
    detector: OpportunityDetector,
    settings: ScanSettings,
    cache: ScanCache,
    broadcaster: Broadcaster,
    phase: AtomicU8,
    running: AtomicBool,
    stop: Notify,
    /// Venue id -> skip until.
    backoff: DashMap<String, OffsetDateTime>,
    completed: AtomicU64,
    rejected: AtomicU64,
    incomplete: AtomicU64,
}

impl Scanner {
    pub fn new(
        venues: Vec<Arc<dyn VenueClient>>,
        match_settings: &MatchSettings,
        detection: DetectionSettings,
        settings: ScanSettings,
    ) -> Self {
        let broadcaster = Broadcaster::new(settings.broadcast_capacity);
        Self {
            venues,
            matcher: EventMatcher::new(match_settings),
            detector: OpportunityDetector::new(detection),
            settings,
            cache: ScanCache::new(),
            broadcaster,
            phase: AtomicU8::new(ScanPhase::Idle as u8),
            running: AtomicBool::new(false),
            stop: Notify::new(),
            backoff: DashMap::new(),
            completed: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            incomplete: AtomicU64::new(0),
        }
    }

    /// Build from loaded configuration.
    pub fn from_config(config: &Config, venues: Vec<Arc<dyn VenueClient>>) -> Self {
        Self::new(
            venues,
            &config.match_settings(),
            config.detection_settings(),
            config.scan_settings(),
        )
    }

    pub fn phase(&self) -> ScanPhase {
        ScanPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Whether the periodic loop is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn venue_ids(&self) -> Vec<&str> {
        self.venues.iter().map(|v| v.venue_id()).collect()
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.cache.load()
    }

    pub fn query(&self, query: &OpportunityQuery) -> QueryResult {
        query_opportunities(&self.cache.load(), query)
    }

    pub fn group(&self, group_id: &str) -> Option<GroupDetail> {
        group_detail(&self.cache.load(), group_id)
    }

    pub fn markets(&self, category: Option<&str>, limit: usize) -> MarketsReport {
        markets_report(&self.cache.load(), category, limit)
    }

    pub fn counters(&self) -> ScanCounters {
        ScanCounters {
            completed: self.completed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            incomplete: self.incomplete.load(Ordering::Relaxed),
        }
    }

    pub fn stats(&self) -> ScannerStats {
        ScannerStats::from_snapshot(
            &self.cache.load(),
            self.counters(),
            self.is_running(),
            &self.phase().to_string(),
        )
    }

    /// Current state as an initial message, plus a receiver for later cycles.
    pub fn subscribe(&self) -> (ScanMessage, broadcast::Receiver<Arc<ScanMessage>>) {
        // subscribe first so no cycle published in between is missed
        let rx = self.broadcaster.subscribe();
        (ScanMessage::snapshot(&self.cache.load()), rx)
    }

    /// Ask the periodic loop to exit after the current cycle.
    pub fn stop(&self) {
        self.stop.notify_one();
    }

    /// Run cycles every `scan_interval` until `shutdown` resolves or [`Scanner::stop`] is called.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        self.running.store(true, Ordering::Release);
        info!(
            venues = self.venues.len(),
            interval_secs = self.settings.interval.as_secs(),
            "Scanner started"
        );

        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = self.stop.notified() => break,
                _ = ticker.tick() => {
                    match self.trigger_scan().await {
                        Ok(_) => {}
                        Err(ScanError::ScanInProgress) => {
                            debug!("Periodic scan skipped: cycle in progress");
                        }
                        Err(e) => warn!(error = %e, "Periodic scan failed"),
                    }
                }
            }
        }

        self.running.store(false, Ordering::Release);
        info!("Scanner stopped");
    }

    /// Run one cycle now, or fail fast if one is already running.
    #[instrument(skip(self), fields(venues = self.venues.len()))]
    pub async fn trigger_scan(&self) -> Result<ScanReport, ScanError> {
        if self.venues.is_empty() {
            return Err(ScanError::NoVenues);
        }

        let Some(guard) = PhaseGuard::acquire(&self.phase) else {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            inc_scans_rejected();
            return Err(ScanError::ScanInProgress);
        };

        let _timer = timer_scan_cycle();
        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + self.settings.cycle_timeout;

        let fetched = self.fetch_all(deadline).await;
        let mut status = fetched.status;
        let mut incomplete = fetched.incomplete;
        if incomplete {
            let error = self.cycle_timeout(ScanPhase::Fetching);
            warn!(%error, "Publishing partial results");
        }

        guard.enter(ScanPhase::Normalizing);
        let now = OffsetDateTime::now_utc();
        let mut markets: Vec<MarketRef> = Vec::new();
        for (profile, raw, latency_ms) in &fetched.batches {
            let report = normalize_batch(profile, raw, now);
            add_markets_normalized(report.markets.len(), report.dropped.len());
            status.insert(
                profile.venue_id.clone(),
                VenueStatus::active(report.markets.len(), *latency_ms),
            );
            markets.extend(report.markets);
        }

        guard.enter(ScanPhase::Matching);
        let groups = self.matcher.match_markets(&markets);
        set_event_groups(groups.len());

        guard.enter(ScanPhase::Detecting);
        let opportunities = self.detector.detect_all(&groups, now);

        let elapsed = started.elapsed();
        if elapsed > self.settings.cycle_timeout && !incomplete {
            // compute phases cannot be interrupted; flag the overrun
            incomplete = true;
            let error = self.cycle_timeout(ScanPhase::Detecting);
            warn!(%error, "Cycle overran its budget");
        }

        guard.enter(ScanPhase::Publishing);
        let venues_degraded = status
            .values()
            .filter(|s| s.state != VenueState::Active)
            .count();
        let cycle = CycleSummary {
            duration_ms: duration_ms(elapsed),
            incomplete,
        };
        let snapshot = Snapshot::new(markets, groups, opportunities, now, status, cycle);
        let markets_scanned = snapshot.markets.len();
        let opportunities_found = snapshot.opportunities.len();

        let previous = self.cache.publish(snapshot);
        let current = self.cache.load();
        let message = ScanMessage::scan_result(&current, &previous);
        let new_opportunities = message.new_opportunities;
        let reached = self.broadcaster.publish(message);

        self.completed.fetch_add(1, Ordering::Relaxed);
        inc_scans_completed();
        if incomplete {
            self.incomplete.fetch_add(1, Ordering::Relaxed);
            inc_scans_incomplete();
        }

        info!(
            markets = markets_scanned,
            groups = current.event_groups.len(),
            opportunities = opportunities_found,
            new = new_opportunities,
            degraded = venues_degraded,
            subscribers = reached,
            duration_ms = current.cycle.duration_ms,
            incomplete,
            "Scan cycle complete"
        );

        drop(guard);

        Ok(ScanReport {
            markets_scanned,
            opportunities_found,
            new_opportunities,
            duration_ms: current.cycle.duration_ms,
            incomplete,
            venues_degraded,
        })
    }

    /// Fetch every venue concurrently, each under its own timeout, until all
    /// finish or the cycle deadline passes.
    async fn fetch_all(&self, deadline: tokio::time::Instant) -> FetchOutcome {
        let mut outcome = FetchOutcome::default();
        let mut pending: BTreeSet<String> = BTreeSet::new();
        let mut tasks: JoinSet<FetchResult> = JoinSet::new();
        let mut task_venues: HashMap<task::Id, String> = HashMap::new();
        let now = OffsetDateTime::now_utc();

        for venue in &self.venues {
            let id = venue.venue_id().to_string();

            let backing_off = self.backoff.get(&id).map(|entry| *entry.value());
            if let Some(until) = backing_off {
                if until > now {
                    debug!(venue = %id, %until, "Venue still rate limited, skipping");
                    outcome.status.insert(id, VenueStatus::backing_off(until));
                    continue;
                }
                self.backoff.remove(&id);
            }

            pending.insert(id.clone());
            let client = Arc::clone(venue);
            let timeout = self.settings.venue_timeout;
            let handle = tasks.spawn(fetch_venue(client, id.clone(), timeout));
            task_venues.insert(handle.id(), id);
        }

        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((id, profile, result, latency_ms)))) => {
                    pending.remove(&id);
                    match result {
                        Ok(raw) => {
                            debug!(venue = %id, records = raw.len(), latency_ms, "Venue fetched");
                            outcome.batches.push((profile, raw, latency_ms));
                        }
                        Err(error) => {
                            self.record_failure(&id, &error);
                            outcome
                                .status
                                .insert(id, VenueStatus::failed(&error, Some(latency_ms)));
                        }
                    }
                }
                Ok(Some(Err(join_error))) => {
                    let Some(id) = task_venues.remove(&join_error.id()) else {
                        warn!(error = %join_error, "Unknown fetch task failed");
                        continue;
                    };
                    warn!(venue = %id, error = %join_error, "Venue fetch task failed");
                    pending.remove(&id);
                    inc_venue_failures(&id, "task_failed");
                    let reason = format!("fetch task failed: {}", join_error);
                    outcome.status.insert(id, VenueStatus::abandoned(&reason));
                }
                Ok(None) => break,
                Err(_) => {
                    tasks.abort_all();
                    outcome.incomplete = true;
                    warn!(pending = ?pending, "Cycle deadline reached during fetch");
                    break;
                }
            }
        }

        for id in pending {
            inc_venue_failures(&id, "abandoned");
            outcome
                .status
                .insert(id, VenueStatus::abandoned("fetch did not complete within the cycle budget"));
        }

        outcome
    }

    fn cycle_timeout(&self, phase: ScanPhase) -> ScanError {
        ScanError::CycleTimeout {
            budget_ms: duration_ms(self.settings.cycle_timeout),
            phase: phase.to_string(),
        }
    }

    fn record_failure(&self, venue: &str, error: &VenueFetchError) {
        warn!(venue, kind = error.kind(), error = %error, "Venue degraded for this cycle");
        inc_venue_failures(venue, error.kind());

        if let VenueFetchError::RateLimited {
            retry_after_secs: Some(secs),
            ..
        } = error
        {
            let secs = i64::try_from((*secs).min(MAX_BACKOFF_SECS)).unwrap_or(0);
            match OffsetDateTime::now_utc().checked_add(time::Duration::seconds(secs)) {
                Some(until) => {
                    self.backoff.insert(venue.to_string(), until);
                }
                None => warn!(venue, secs, "Retry-after out of range, not backing off"),
            }
        }
    }
}

async fn fetch_venue(client: Arc<dyn VenueClient>, id: String, timeout: Duration) -> FetchResult {
    let start = Instant::now();
    let result = match tokio::time::timeout(timeout, client.fetch()).await {
        Ok(result) => result,
        Err(_) => Err(VenueFetchError::Timeout {
            venue: id.clone(),
            after_ms: duration_ms(timeout),
        }),
    };
    record_venue_fetch_latency(start, &id);
    let latency_ms = duration_ms(start.elapsed());
    (id, client.profile(), result, latency_ms)
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
