//! Venue client capability and the JSON feed client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, instrument};
use url::Url;

use super::profile::VenueProfile;
use super::types::RawMarket;
use crate::error::VenueFetchError;

/// A source of raw market quotes for one venue.
///
/// The orchestrator depends only on this trait. Implementations must return within
/// their own timeout; the orchestrator also enforces one around every call.
#[async_trait]
pub trait VenueClient: Send + Sync {
    /// Venue id (lowercase).
    fn venue_id(&self) -> &str;

    /// Mapping table used to normalize this venue's records.
    fn profile(&self) -> VenueProfile {
        VenueProfile::for_venue(self.venue_id())
    }

    /// Fetch current raw quotes.
    async fn fetch(&self) -> Result<Vec<RawMarket>, VenueFetchError>;
}

/// Venue that serves a JSON array of [`RawMarket`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpVenueClient {
    /// HTTP client for feed requests.
    http: reqwest::Client,
    /// Feed URL.
    url: Url,
    profile: VenueProfile,
    timeout: Duration,
}

impl HttpVenueClient {
    /// Create a feed client with the given request timeout.
    pub fn new(profile: VenueProfile, url: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_millis(1_000)))
            .tcp_nodelay(true)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("arb-intel/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            url,
            profile,
            timeout,
        })
    }

    /// Feed URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    fn transport_error(&self, error: reqwest::Error) -> VenueFetchError {
        let venue = self.profile.venue_id.clone();
        if error.is_timeout() {
            VenueFetchError::Timeout {
                venue,
                after_ms: self.timeout.as_millis() as u64,
            }
        } else if error.is_decode() {
            VenueFetchError::MalformedResponse {
                venue,
                reason: error.to_string(),
            }
        } else {
            VenueFetchError::Transport {
                venue,
                reason: error.to_string(),
            }
        }
    }
}

/// Map a non-success HTTP status onto a fetch error.
pub fn status_error(venue: &str, status: StatusCode, retry_after: Option<&str>) -> VenueFetchError {
    let venue = venue.to_string();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => VenueFetchError::Auth {
            venue,
            reason: format!("HTTP {}", status),
        },
        StatusCode::TOO_MANY_REQUESTS => VenueFetchError::RateLimited {
            venue,
            retry_after_secs: retry_after.and_then(|v| v.trim().parse().ok()),
        },
        _ => VenueFetchError::MalformedResponse {
            venue,
            reason: format!("HTTP {}", status),
        },
    }
}

#[async_trait]
impl VenueClient for HttpVenueClient {
    fn venue_id(&self) -> &str {
        &self.profile.venue_id
    }

    fn profile(&self) -> VenueProfile {
        self.profile.clone()
    }

    #[instrument(skip(self), fields(venue = %self.profile.venue_id))]
    async fn fetch(&self) -> Result<Vec<RawMarket>, VenueFetchError> {
        let response = self
            .http
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            return Err(status_error(
                &self.profile.venue_id,
                status,
                retry_after.as_deref(),
            ));
        }

        let markets: Vec<RawMarket> = response.json().await.map_err(|e| self.transport_error(e))?;

        debug!(count = markets.len(), "Fetched venue feed");
        Ok(markets)
    }
}
