//! Unified error types for the scanner.

use rust_decimal::Decimal;
use thiserror::Error;

/// Unified error type for the scanner.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Odds conversion error.
    #[error("odds error: {0}")]
    Odds(#[from] OddsError),

    /// Venue fetch error.
    #[error("venue error: {0}")]
    Venue(#[from] VenueFetchError),

    /// Scan lifecycle error.
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),

    /// HTTP request error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Malformed price input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OddsError {
    /// American odds of exactly zero have no meaning.
    #[error("american odds cannot be zero")]
    ZeroAmerican,

    /// Decimal odds must be strictly greater than 1 and at most the odds ceiling.
    #[error("decimal odds must be in (1, 10000], got {0}")]
    DecimalOutOfRange(Decimal),

    /// American odds too large to convert.
    #[error("american odds out of range: {0}")]
    AmericanOutOfRange(Decimal),

    /// Probability must lie strictly between 0 and 1.
    #[error("probability must be in (0, 1), got {0}")]
    ProbabilityOutOfRange(Decimal),
}

/// Reasons a raw venue record is dropped during normalization.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    /// Record has no event name.
    #[error("market {market_id} has an empty event name")]
    EmptyEventName {
        /// Venue-native market id.
        market_id: String,
    },

    /// Fewer than two outcomes were quoted.
    #[error("market {market_id} has {count} outcome(s), need at least 2")]
    TooFewOutcomes {
        /// Venue-native market id.
        market_id: String,
        /// Number of outcomes present.
        count: usize,
    },

    /// An outcome carries no price.
    #[error("outcome {label:?} of market {market_id} has no price")]
    MissingPrice {
        /// Venue-native market id.
        market_id: String,
        /// Outcome label without a price.
        label: String,
    },

    /// Venue requires Yes/No markets but the record is multi-outcome.
    #[error("market {market_id} is not binary on a binary-only venue")]
    NonBinary {
        /// Venue-native market id.
        market_id: String,
    },

    /// Native price could not be converted into decimal odds.
    #[error("market {market_id}: {source}")]
    InvalidOdds {
        /// Venue-native market id.
        market_id: String,
        /// Underlying conversion error.
        #[source]
        source: OddsError,
    },
}

/// Venue fetch failures. A failing venue is degraded for the cycle, never fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VenueFetchError {
    /// Fetch exceeded its timeout.
    #[error("{venue}: timed out after {after_ms}ms")]
    Timeout {
        /// Venue id.
        venue: String,
        /// Timeout that elapsed.
        after_ms: u64,
    },

    /// Credentials rejected.
    #[error("{venue}: authentication failed: {reason}")]
    Auth {
        /// Venue id.
        venue: String,
        /// Reason reported by the venue.
        reason: String,
    },

    /// Rate limited by the venue.
    #[error("{venue}: rate limited (retry after {retry_after_secs:?}s)")]
    RateLimited {
        /// Venue id.
        venue: String,
        /// Seconds to wait before retrying, when the venue says.
        retry_after_secs: Option<u64>,
    },

    /// Response could not be understood.
    #[error("{venue}: malformed response: {reason}")]
    MalformedResponse {
        /// Venue id.
        venue: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Network level failure.
    #[error("{venue}: transport error: {reason}")]
    Transport {
        /// Venue id.
        venue: String,
        /// Underlying error text.
        reason: String,
    },
}

impl VenueFetchError {
    /// Short label used for metrics and status reporting.
    pub fn kind(&self) -> &'static str {
        match self {
            VenueFetchError::Timeout { .. } => "timeout",
            VenueFetchError::Auth { .. } => "auth",
            VenueFetchError::RateLimited { .. } => "rate_limited",
            VenueFetchError::MalformedResponse { .. } => "malformed",
            VenueFetchError::Transport { .. } => "transport",
        }
    }
}

/// Scan lifecycle errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// A cycle is already between FETCHING and PUBLISHING.
    #[error("scan already in progress")]
    ScanInProgress,

    /// The cycle watchdog fired; partial results were published.
    #[error("scan cycle exceeded {budget_ms}ms during {phase}")]
    CycleTimeout {
        /// Cycle budget in milliseconds.
        budget_ms: u64,
        /// Phase that was running when the budget ran out.
        phase: String,
    },

    /// No venues are configured.
    #[error("no venues configured")]
    NoVenues,
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, AppError>;
