//! Market module: canonical quotes and the venues that produce them.
//!
//! This module handles:
//! - Canonical `Market` records and raw venue payloads
//! - Venue profiles (fee models, category synonyms)
//! - Normalization of raw payloads
//! - The venue client capability, HTTP feed client and mock client

pub mod mock;
pub mod normalizer;
pub mod profile;
pub mod types;
pub mod venue;

pub use mock::{demo_venues, MockConfig, MockVenueClient};
pub use normalizer::{normalize_batch, normalize_record, NormalizeReport};
pub use profile::{FeeModel, VenueProfile};
pub use types::{Category, Market, MarketRef, RawMarket, RawOutcome, RawPrice};
pub use venue::{HttpVenueClient, VenueClient};
