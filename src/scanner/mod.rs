//! Scan lifecycle: orchestrator, snapshot cache, broadcaster and query surface.

pub mod broadcaster;
pub mod cache;
pub mod orchestrator;
pub mod query;

pub use broadcaster::{Broadcaster, MessageKind, ScanMessage};
pub use cache::{CycleSummary, ScanCache, Snapshot, VenueState, VenueStatus};
pub use orchestrator::{ScanPhase, ScanReport, Scanner};
pub use query::{
    parse_filter, GroupDetail, MarketsReport, OpportunityQuery, QueryResult, ScanCounters,
    ScannerStats, DEFAULT_LIMIT,
};
