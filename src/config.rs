//! Application configuration loaded from environment variables.

use std::collections::BTreeMap;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;
use url::Url;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Scan Cycle ===
    /// Seconds between periodic scans.
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,

    /// Per-venue fetch timeout in milliseconds.
    #[serde(default = "default_venue_timeout")]
    pub venue_timeout_ms: u64,

    /// Whole-cycle watchdog in milliseconds. Must exceed the venue timeout.
    #[serde(default = "default_cycle_timeout")]
    pub cycle_timeout_ms: u64,

    // === Matching ===
    /// Minimum similarity score for two event names to be candidate matches.
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f64,

    /// Extra outcome aliases, `alias=canonical,...` (e.g. `trump=yes,harris=no`).
    #[serde(default)]
    pub outcome_aliases: Option<String>,

    // === Detection & Sizing ===
    /// Total capital used to size stakes (USD).
    #[serde(default = "default_total_capital")]
    pub total_capital_usd: Decimal,

    /// Fraction of capital staked on a single-leg signal (0.05 = 5%).
    #[serde(default = "default_ev_stake_fraction")]
    pub ev_stake_fraction: Decimal,

    /// Arbitrage below this margin (percent) is not reported.
    #[serde(default)]
    pub min_arbitrage_profit_pct: Decimal,

    /// Minimum +EV edge in percent.
    #[serde(default = "default_min_ev")]
    pub min_ev_pct: Decimal,

    /// Arbitrage margin at or above which risk is LOW (with two or more venues).
    #[serde(default = "default_risk_low")]
    pub risk_low_min_profit_pct: Decimal,

    /// Arbitrage margin below which risk is HIGH.
    #[serde(default = "default_risk_medium")]
    pub risk_medium_min_profit_pct: Decimal,

    /// Probability anchor venues in priority order.
    #[serde(default = "default_anchor_venues")]
    pub anchor_venues: Vec<String>,

    /// Emit BEST_PRICE signals.
    #[serde(default)]
    pub best_price_enabled: bool,

    /// Minimum edge of best over second-best odds, in percent.
    #[serde(default = "default_best_price_edge")]
    pub best_price_min_edge_pct: Decimal,

    // === Venues ===
    /// JSON feed venues, `id=url,id=url`.
    #[serde(default)]
    pub venue_feeds: Option<String>,

    // === Server Configuration ===
    /// Depth of the subscriber channel.
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,

    /// HTTP server port for the API, health and metrics endpoints.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,

    /// Enable verbose logging.
    #[serde(default)]
    pub verbose: bool,
}

fn default_scan_interval() -> u64 {
    30
}

fn default_venue_timeout() -> u64 {
    5_000
}

fn default_cycle_timeout() -> u64 {
    20_000
}

fn default_match_threshold() -> f64 {
    0.82
}

fn default_total_capital() -> Decimal {
    Decimal::new(1000, 0) // $1000
}

fn default_ev_stake_fraction() -> Decimal {
    Decimal::new(5, 2) // 5%
}

fn default_min_ev() -> Decimal {
    Decimal::ONE // 1%
}

fn default_risk_low() -> Decimal {
    Decimal::new(2, 0)
}

fn default_risk_medium() -> Decimal {
    Decimal::new(5, 1) // 0.5
}

fn default_anchor_venues() -> Vec<String> {
    ["polymarket", "kalshi", "manifold", "betfair"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_best_price_edge() -> Decimal {
    Decimal::new(3, 0)
}

fn default_broadcast_capacity() -> usize {
    64
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scan_interval_secs: default_scan_interval(),
            venue_timeout_ms: default_venue_timeout(),
            cycle_timeout_ms: default_cycle_timeout(),
            match_threshold: default_match_threshold(),
            outcome_aliases: None,
            total_capital_usd: default_total_capital(),
            ev_stake_fraction: default_ev_stake_fraction(),
            min_arbitrage_profit_pct: Decimal::ZERO,
            min_ev_pct: default_min_ev(),
            risk_low_min_profit_pct: default_risk_low(),
            risk_medium_min_profit_pct: default_risk_medium(),
            anchor_venues: default_anchor_venues(),
            best_price_enabled: false,
            best_price_min_edge_pct: default_best_price_edge(),
            venue_feeds: None,
            broadcast_capacity: default_broadcast_capacity(),
            port: default_port(),
            rust_log: default_log_level(),
            verbose: false,
        }
    }
}

/// A configured JSON feed venue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VenueFeed {
    /// Venue id (lowercase).
    pub id: String,
    /// Feed URL.
    pub url: Url,
}

/// Settings consumed by the event matcher.
#[derive(Debug, Clone)]
pub struct MatchSettings {
    /// Similarity threshold in `(0, 1]`.
    pub threshold: f64,
    /// Extra `alias -> canonical` outcome labels.
    pub outcome_aliases: BTreeMap<String, String>,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            threshold: default_match_threshold(),
            outcome_aliases: BTreeMap::new(),
        }
    }
}

/// Settings consumed by the opportunity detector and stake sizer.
#[derive(Debug, Clone)]
pub struct DetectionSettings {
    pub total_capital_usd: Decimal,
    pub ev_stake_fraction: Decimal,
    pub min_arbitrage_profit_pct: Decimal,
    pub min_ev_pct: Decimal,
    pub risk_low_min_profit_pct: Decimal,
    pub risk_medium_min_profit_pct: Decimal,
    pub anchor_venues: Vec<String>,
    pub best_price_enabled: bool,
    pub best_price_min_edge_pct: Decimal,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Config::default().detection_settings()
    }
}

/// Settings consumed by the scan orchestrator.
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub interval: Duration,
    pub venue_timeout: Duration,
    pub cycle_timeout: Duration,
    pub broadcast_capacity: usize,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Config::default().scan_settings()
    }
}

/// Filter used by `--verbose` and `VERBOSE=true`.
pub const VERBOSE_DIRECTIVE: &str = "arb_intel=debug,info";

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Tracing filter directive: the crate at debug when verbose, otherwise `rust_log`.
    pub fn log_directive(&self, verbose_flag: bool) -> String {
        if verbose_flag || self.verbose {
            VERBOSE_DIRECTIVE.to_string()
        } else {
            self.rust_log.clone()
        }
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        if self.scan_interval_secs == 0 {
            return Err("SCAN_INTERVAL_SECS must be at least 1".to_string());
        }

        if self.venue_timeout_ms == 0 {
            return Err("VENUE_TIMEOUT_MS must be positive".to_string());
        }

        if self.cycle_timeout_ms <= self.venue_timeout_ms {
            return Err("CYCLE_TIMEOUT_MS must exceed VENUE_TIMEOUT_MS".to_string());
        }

        if !(self.match_threshold > 0.0 && self.match_threshold <= 1.0) {
            return Err("MATCH_THRESHOLD must be in (0, 1]".to_string());
        }

        if self.total_capital_usd <= Decimal::ZERO {
            return Err("TOTAL_CAPITAL_USD must be positive".to_string());
        }

        if self.ev_stake_fraction <= Decimal::ZERO || self.ev_stake_fraction > Decimal::ONE {
            return Err("EV_STAKE_FRACTION must be in (0, 1]".to_string());
        }

        if self.min_ev_pct < Decimal::ZERO || self.min_arbitrage_profit_pct < Decimal::ZERO {
            return Err("MIN_EV_PCT and MIN_ARBITRAGE_PROFIT_PCT cannot be negative".to_string());
        }

        if self.risk_medium_min_profit_pct > self.risk_low_min_profit_pct {
            return Err(
                "RISK_MEDIUM_MIN_PROFIT_PCT cannot exceed RISK_LOW_MIN_PROFIT_PCT".to_string(),
            );
        }

        if self.broadcast_capacity == 0 {
            return Err("BROADCAST_CAPACITY must be at least 1".to_string());
        }

        self.venue_feeds()?;
        self.outcome_alias_map()?;

        Ok(())
    }

    /// Parse `VENUE_FEEDS` into venue id / URL pairs.
    pub fn venue_feeds(&self) -> Result<Vec<VenueFeed>, String> {
        let mut feeds: Vec<VenueFeed> = Vec::new();
        for (id, raw_url) in parse_pairs(self.venue_feeds.as_deref(), "VENUE_FEEDS")? {
            let url = Url::parse(&raw_url)
                .map_err(|e| format!("VENUE_FEEDS: invalid url for {}: {}", id, e))?;
            if feeds.iter().any(|f| f.id == id) {
                return Err(format!("VENUE_FEEDS: duplicate venue {}", id));
            }
            feeds.push(VenueFeed { id, url });
        }
        Ok(feeds)
    }

    /// Parse `OUTCOME_ALIASES` into a lowercase alias map.
    pub fn outcome_alias_map(&self) -> Result<BTreeMap<String, String>, String> {
        Ok(parse_pairs(self.outcome_aliases.as_deref(), "OUTCOME_ALIASES")?
            .into_iter()
            .map(|(alias, canonical)| (alias, canonical.to_lowercase()))
            .collect())
    }

    /// Matcher settings. Malformed aliases are ignored here; `validate` reports them.
    pub fn match_settings(&self) -> MatchSettings {
        MatchSettings {
            threshold: self.match_threshold,
            outcome_aliases: self.outcome_alias_map().unwrap_or_default(),
        }
    }

    /// Detector and sizing settings.
    pub fn detection_settings(&self) -> DetectionSettings {
        DetectionSettings {
            total_capital_usd: self.total_capital_usd,
            ev_stake_fraction: self.ev_stake_fraction,
            min_arbitrage_profit_pct: self.min_arbitrage_profit_pct,
            min_ev_pct: self.min_ev_pct,
            risk_low_min_profit_pct: self.risk_low_min_profit_pct,
            risk_medium_min_profit_pct: self.risk_medium_min_profit_pct,
            anchor_venues: self
                .anchor_venues
                .iter()
                .map(|v| v.trim().to_lowercase())
                .filter(|v| !v.is_empty())
                .collect(),
            best_price_enabled: self.best_price_enabled,
            best_price_min_edge_pct: self.best_price_min_edge_pct,
        }
    }

    /// Orchestrator settings.
    pub fn scan_settings(&self) -> ScanSettings {
        ScanSettings {
            interval: Duration::from_secs(self.scan_interval_secs),
            venue_timeout: Duration::from_millis(self.venue_timeout_ms),
            cycle_timeout: Duration::from_millis(self.cycle_timeout_ms),
            broadcast_capacity: self.broadcast_capacity,
        }
    }
}

/// Split `a=b,c=d` into lowercase-keyed pairs.
fn parse_pairs(raw: Option<&str>, var: &str) -> Result<Vec<(String, String)>, String> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };

    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (key, value) = entry
                .split_once('=')
                .ok_or_else(|| format!("{}: expected key=value, got {:?}", var, entry))?;
            let (key, value) = (key.trim(), value.trim());
            if key.is_empty() || value.is_empty() {
                return Err(format!("{}: empty key or value in {:?}", var, entry));
            }
            Ok((key.to_lowercase(), value.to_string()))
        })
        .collect()
}
