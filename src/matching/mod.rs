//! Event matching module.
//!
//! This module handles:
//! - Event-name similarity scoring
//! - Outcome label aliasing and compatibility
//! - Clustering markets into cross-venue event groups

pub mod matcher;
pub mod outcomes;
pub mod similarity;
pub mod types;

pub use matcher::EventMatcher;
pub use outcomes::{outcomes_compatible, OutcomeAliases};
pub use similarity::{similarity, PreparedName};
pub use types::{EventGroup, OutcomeAlignment};
