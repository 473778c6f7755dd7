//! Prometheus metrics for scan cycles and venue health.
//!
//! This module provides metrics for:
//! - Scan cycle duration and outcome
//! - Per-venue fetch latency and failures
//! - Normalization throughput
//! - Opportunities by type
//! - Broadcast fan-out

use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use tracing::debug;

// === Metric Name Constants ===

/// Whole scan cycle duration metric name.
pub const METRIC_SCAN_CYCLE_LATENCY: &str = "scan_cycle_latency_ms";
/// Venue fetch latency metric name.
pub const METRIC_VENUE_FETCH_LATENCY: &str = "venue_fetch_latency_ms";
/// Match + detect latency metric name.
pub const METRIC_DETECTION_LATENCY: &str = "opportunity_detection_latency_ms";
/// Completed scan cycles counter metric name.
pub const METRIC_SCANS_COMPLETED: &str = "scans_completed_total";
/// Rejected (busy) scan triggers counter metric name.
pub const METRIC_SCANS_REJECTED: &str = "scans_rejected_total";
/// Watchdog trips counter metric name.
pub const METRIC_SCANS_INCOMPLETE: &str = "scans_incomplete_total";
/// Venue failures counter metric name.
pub const METRIC_VENUE_FAILURES: &str = "venue_failures_total";
/// Normalized markets counter metric name.
pub const METRIC_MARKETS_NORMALIZED: &str = "markets_normalized_total";
/// Dropped raw records counter metric name.
pub const METRIC_MARKETS_DROPPED: &str = "markets_dropped_total";
/// Opportunities detected counter metric name.
pub const METRIC_OPPORTUNITIES_DETECTED: &str = "opportunities_detected_total";
/// Broadcast messages counter metric name.
pub const METRIC_BROADCASTS_SENT: &str = "broadcasts_sent_total";
/// Event groups gauge metric name.
pub const METRIC_EVENT_GROUPS: &str = "event_groups";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    describe_histogram!(
        METRIC_SCAN_CYCLE_LATENCY,
        "Scan cycle duration in milliseconds"
    );
    describe_histogram!(
        METRIC_VENUE_FETCH_LATENCY,
        "Venue fetch latency in milliseconds"
    );
    describe_histogram!(
        METRIC_DETECTION_LATENCY,
        "Matching and detection latency in milliseconds"
    );

    describe_counter!(METRIC_SCANS_COMPLETED, "Total number of completed scan cycles");
    describe_counter!(
        METRIC_SCANS_REJECTED,
        "Total number of scan triggers rejected because a cycle was running"
    );
    describe_counter!(
        METRIC_SCANS_INCOMPLETE,
        "Total number of cycles cut short by the watchdog"
    );
    describe_counter!(METRIC_VENUE_FAILURES, "Total number of failed venue fetches");
    describe_counter!(METRIC_MARKETS_NORMALIZED, "Total number of normalized markets");
    describe_counter!(METRIC_MARKETS_DROPPED, "Total number of dropped raw market records");
    describe_counter!(
        METRIC_OPPORTUNITIES_DETECTED,
        "Total number of opportunities detected"
    );
    describe_counter!(METRIC_BROADCASTS_SENT, "Total number of subscriber broadcasts");
    describe_gauge!(METRIC_EVENT_GROUPS, "Event groups in the current snapshot");

    debug!("Metrics initialized");
}

/// Record a venue fetch latency.
pub fn record_venue_fetch_latency(start: Instant, venue: &str) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_VENUE_FETCH_LATENCY, "venue" => venue.to_string()).record(latency_ms);
}

/// Increment venue failures, labelled by venue and failure kind.
pub fn inc_venue_failures(venue: &str, kind: &'static str) {
    counter!(METRIC_VENUE_FAILURES, "venue" => venue.to_string(), "kind" => kind).increment(1);
}

/// Increment completed scans.
pub fn inc_scans_completed() {
    counter!(METRIC_SCANS_COMPLETED).increment(1);
}

/// Increment rejected scans.
pub fn inc_scans_rejected() {
    counter!(METRIC_SCANS_REJECTED).increment(1);
}

/// Increment incomplete scans.
pub fn inc_scans_incomplete() {
    counter!(METRIC_SCANS_INCOMPLETE).increment(1);
}

/// Add normalization results.
pub fn add_markets_normalized(kept: usize, dropped: usize) {
    counter!(METRIC_MARKETS_NORMALIZED).increment(kept as u64);
    counter!(METRIC_MARKETS_DROPPED).increment(dropped as u64);
}

/// Increment opportunities detected by type.
pub fn inc_opportunities_detected(kind: &str) {
    counter!(METRIC_OPPORTUNITIES_DETECTED, "type" => kind.to_string()).increment(1);
}

/// Increment broadcasts sent.
pub fn inc_broadcasts_sent() {
    counter!(METRIC_BROADCASTS_SENT).increment(1);
}

/// Set the current event group count.
pub fn set_event_groups(count: usize) {
    gauge!(METRIC_EVENT_GROUPS).set(count as f64);
}

/// RAII guard for timing operations.
/// Automatically records latency when dropped.
pub struct LatencyTimer {
    start: Instant,
    metric_name: &'static str,
}

impl LatencyTimer {
    /// Create a new latency timer for the given metric.
    pub fn new(metric_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            metric_name,
        }
    }

    /// Get elapsed time in milliseconds (without recording).
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        let latency_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        histogram!(self.metric_name).record(latency_ms);
    }
}

/// Create a latency timer for a scan cycle.
pub fn timer_scan_cycle() -> LatencyTimer {
    LatencyTimer::new(METRIC_SCAN_CYCLE_LATENCY)
}

/// Create a latency timer for matching and detection.
pub fn timer_detection() -> LatencyTimer {
    LatencyTimer::new(METRIC_DETECTION_LATENCY)
}
