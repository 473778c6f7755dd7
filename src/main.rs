//! Cross-venue arbitrage scanner entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use arb_intel::api::{create_router, AppState};
use arb_intel::arbitrage::{format_opportunities_table, DISCLAIMER};
use arb_intel::config::{Config, VERBOSE_DIRECTIVE};
use arb_intel::market::{demo_venues, HttpVenueClient, VenueClient, VenueProfile};
use arb_intel::metrics;
use arb_intel::scanner::Scanner;
use arb_intel::utils::shutdown_signal;

/// Cross-venue arbitrage and +EV scanner (advisory only).
#[derive(Parser, Debug)]
#[command(name = "arb-intel")]
#[command(about = "Scans prediction markets and sportsbooks for arbitrage and +EV bets")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server and periodic scanner (default).
    Run {
        /// HTTP server port (overrides PORT).
        #[arg(short, long)]
        port: Option<u16>,

        /// Scan the built-in demo venues instead of VENUE_FEEDS.
        #[arg(long)]
        demo: bool,
    },

    /// Run a single scan cycle and print the results.
    ScanOnce {
        /// Scan the built-in demo venues instead of VENUE_FEEDS.
        #[arg(long)]
        demo: bool,

        /// Print opportunities as JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Check configuration validity.
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging (RUST_LOG and VERBOSE are read through Config)
    let directive = match Config::load() {
        Ok(config) => config.log_directive(args.verbose),
        Err(_) if args.verbose => VERBOSE_DIRECTIVE.to_string(),
        Err(_) => "info".to_string(),
    };
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    // Handle subcommands
    match args.command {
        Some(Command::CheckConfig) => cmd_check_config().await,
        Some(Command::ScanOnce { demo, json }) => cmd_scan_once(demo, json).await,
        Some(Command::Run { port, demo }) => cmd_run(port, demo).await,
        None => cmd_run(None, false).await,
    }
}

/// Load and validate configuration.
fn load_config() -> anyhow::Result<Config> {
    let config = Config::load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(anyhow::anyhow!("Configuration validation failed: {}", e));
    }

    Ok(config)
}

/// Venue clients from `VENUE_FEEDS`, or the demo set.
fn build_venues(config: &Config, demo: bool) -> anyhow::Result<Vec<Arc<dyn VenueClient>>> {
    if demo {
        return Ok(demo_venues()
            .into_iter()
            .map(|v| Arc::new(v) as Arc<dyn VenueClient>)
            .collect());
    }

    let timeout = Duration::from_millis(config.venue_timeout_ms);
    let mut venues: Vec<Arc<dyn VenueClient>> = Vec::new();
    for feed in config.venue_feeds().map_err(|e| anyhow::anyhow!(e))? {
        let client = HttpVenueClient::new(VenueProfile::for_venue(&feed.id), feed.url, timeout)?;
        venues.push(Arc::new(client));
    }
    Ok(venues)
}

/// Check configuration validity.
async fn cmd_check_config() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("ARB INTEL - CONFIGURATION CHECK");
    println!("======================================================================");

    // Load configuration
    print!("Loading configuration... ");
    let config = match Config::load() {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    // Validate configuration
    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    // Show configuration summary
    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  Scan Interval: {}s", config.scan_interval_secs);
    println!(
        "  Timeouts: venue {}ms, cycle {}ms",
        config.venue_timeout_ms, config.cycle_timeout_ms
    );
    println!("  Match Threshold: {}", config.match_threshold);
    println!("  Total Capital: ${}", config.total_capital_usd);
    println!("  EV Stake Fraction: {}", config.ev_stake_fraction);
    println!("  Min EV: {}%", config.min_ev_pct);
    println!("  Anchor Venues: {}", config.anchor_venues.join(", "));
    println!(
        "  Best Price Signals: {}",
        if config.best_price_enabled { "Enabled" } else { "Disabled" }
    );

    let feeds = config.venue_feeds().unwrap_or_default();
    if feeds.is_empty() {
        println!("  Venue Feeds: none (only `scan-once --demo` will find markets)");
    } else {
        println!("  Venue Feeds:");
        for feed in feeds {
            let profile = VenueProfile::for_venue(&feed.id);
            println!(
                "    {} ({}, fee {}%): {}",
                profile.display_name,
                feed.id,
                profile.fee_pct(),
                feed.url
            );
        }
    }
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Run one scan cycle and print the results.
async fn cmd_scan_once(demo: bool, json: bool) -> anyhow::Result<()> {
    let config = load_config()?;
    metrics::init_metrics();

    let venues = build_venues(&config, demo)?;
    let scanner = Scanner::from_config(&config, venues);

    let report = scanner.trigger_scan().await?;
    let snapshot = scanner.snapshot();

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot.opportunities)?);
        return Ok(());
    }

    println!("======================================================================");
    println!(
        "SCAN COMPLETE - {} markets, {} event groups, {} opportunities in {}ms{}",
        report.markets_scanned,
        snapshot.event_groups.len(),
        report.opportunities_found,
        report.duration_ms,
        if report.incomplete { " (incomplete)" } else { "" }
    );
    println!("======================================================================");
    for (venue, status) in &snapshot.per_venue_status {
        match &status.last_error {
            Some(err) => println!("  {:<12} {:<12} {}", venue, status.state.to_string(), err),
            None => println!(
                "  {:<12} {:<12} {} markets",
                venue,
                status.state.to_string(),
                status.markets
            ),
        }
    }
    println!("----------------------------------------------------------------------");
    println!("{}", format_opportunities_table(&snapshot.opportunities));

    for opp in snapshot.opportunities.iter().take(3) {
        println!("----------------------------------------------------------------------");
        println!("{}", opp.formatted_text);
    }

    println!("======================================================================");
    println!("{}", DISCLAIMER);

    Ok(())
}

/// Run the HTTP server and the periodic scanner until shutdown.
async fn cmd_run(port_override: Option<u16>, demo: bool) -> anyhow::Result<()> {
    // Load configuration
    info!("Loading configuration...");
    let config = load_config()?;
    let port = port_override.unwrap_or(config.port);

    // Initialize metrics
    let prometheus = install_prometheus();
    metrics::init_metrics();

    let venues = build_venues(&config, demo)?;
    if venues.is_empty() {
        return Err(anyhow::anyhow!(
            "No venues configured: set VENUE_FEEDS or pass --demo"
        ));
    }

    let scanner = Arc::new(Scanner::from_config(&config, venues));

    info!("Configuration loaded successfully");
    info!("Venues: {}", scanner.venue_ids().join(", "));
    info!("Scan interval: {}s", config.scan_interval_secs);
    info!("Total capital: ${}", config.total_capital_usd);

    // Create app state
    let mut app_state = AppState::new(Arc::clone(&scanner));
    if let Some(handle) = prometheus {
        app_state = app_state.with_metrics(handle);
    }

    // Start HTTP server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);

    let router = create_router(app_state);

    // Spawn HTTP server
    let server_handle = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    });

    info!("========================================");
    info!("ARB INTEL SCANNER STARTED (advisory only)");
    info!("========================================");

    scanner.run(shutdown_signal()).await;

    match server_handle.await {
        Ok(Ok(())) => info!("HTTP server stopped"),
        Ok(Err(e)) => warn!("HTTP server error: {}", e),
        Err(e) => warn!("HTTP server task failed: {}", e),
    }

    Ok(())
}

fn install_prometheus() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Failed to install Prometheus recorder: {}", e);
            None
        }
    }
}
