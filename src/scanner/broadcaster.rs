//! Fan-out of published snapshots to live subscribers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::broadcast;
use tracing::debug;

use super::cache::Snapshot;
use crate::arbitrage::{Opportunity, DISCLAIMER};
use crate::metrics::inc_broadcasts_sent;

/// Push message kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Full current state, sent once on subscribe.
    Snapshot,
    /// Sent after every published cycle.
    ScanResult,
}

/// Message delivered to subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct ScanMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub markets_scanned: usize,
    pub scan_duration_ms: u64,
    /// Opportunities not present in the previous snapshot.
    pub new_opportunities: usize,
    pub opportunities: Vec<Opportunity>,
    pub disclaimer: &'static str,
}

impl ScanMessage {
    /// Current state, for a new subscriber.
    pub fn snapshot(current: &Snapshot) -> Self {
        Self::build(MessageKind::Snapshot, current, current.opportunities.len())
    }

    /// Result of a cycle, with the delta against the snapshot it replaced.
    pub fn scan_result(current: &Snapshot, previous: &Snapshot) -> Self {
        let seen = previous.fingerprints();
        let new_opportunities = current
            .opportunities
            .iter()
            .filter(|o| !seen.contains(&o.fingerprint()))
            .count();
        Self::build(MessageKind::ScanResult, current, new_opportunities)
    }

    fn build(kind: MessageKind, snapshot: &Snapshot, new_opportunities: usize) -> Self {
        Self {
            kind,
            timestamp: snapshot
                .scan_timestamp
                .unwrap_or_else(OffsetDateTime::now_utc),
            markets_scanned: snapshot.markets.len(),
            scan_duration_ms: snapshot.cycle.duration_ms,
            new_opportunities,
            opportunities: snapshot.opportunities.clone(),
            disclaimer: DISCLAIMER,
        }
    }
}

/// Bounded broadcast channel. Slow subscribers lag and skip messages; they never
/// hold up the sender.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<Arc<ScanMessage>>,
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ScanMessage>> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Send to all current subscribers. Returns how many were reached.
    pub fn publish(&self, message: ScanMessage) -> usize {
        // no receivers is fine
        match self.tx.send(Arc::new(message)) {
            Ok(reached) => {
                inc_broadcasts_sent();
                reached
            }
            Err(_) => {
                debug!("No subscribers for scan result");
                0
            }
        }
    }
}
