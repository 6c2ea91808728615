//! Tiger Tracker entry point.
//!
//! Loads configuration, initialises structured logging, opens and migrates
//! the ledger, seeds the reference catalog, optionally starts the dashboard,
//! then runs the ingestion scheduler until Ctrl+C or a fatal error.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use tiger_tracker::catalog::ReferenceCatalog;
use tiger_tracker::config;
use tiger_tracker::dashboard::{self, routes::DashboardState};
use tiger_tracker::engine::{IngestionCycle, Scheduler};
use tiger_tracker::quotes::coingecko::CoinGeckoClient;
use tiger_tracker::storage::Ledger;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = config::AppConfig::load("config.toml")?;

    init_logging();

    info!(
        interval_secs = cfg.ingest.interval_secs,
        assets = cfg.catalog.assets.len(),
        user = %cfg.catalog.user,
        "Tiger Tracker starting up"
    );

    // -- Ledger ------------------------------------------------------------

    let ledger = Ledger::connect(&cfg.database_url(), cfg.storage.max_connections).await?;
    ledger.migrate().await?;

    // -- Reference catalog ---------------------------------------------------

    let catalog = ReferenceCatalog::new(
        ledger.clone(),
        cfg.catalog.user.clone(),
        cfg.catalog.assets.clone(),
    );
    let seed = catalog.seed().await;
    if !seed.is_complete() {
        warn!(failed = ?seed.failed, "Reference data seeded with failures");
    }

    // -- Quote source --------------------------------------------------------

    let api_key = cfg.quote_api_key();
    if api_key.is_none() {
        warn!(env = %cfg.quotes.api_key_env, "No quote API key configured, using public rate limits");
    }
    let source = CoinGeckoClient::new(
        &cfg.quotes.base_url,
        api_key,
        &cfg.catalog.assets,
        cfg.ingest.fetch_timeout(),
    )?;

    // -- Dashboard -----------------------------------------------------------

    if cfg.dashboard.enabled {
        let state = Arc::new(DashboardState::new(ledger.clone()));
        dashboard::spawn_dashboard(state, cfg.dashboard.port).await?;
    }

    // -- Main loop -----------------------------------------------------------

    let cycle = IngestionCycle::new(
        Arc::new(source),
        catalog,
        ledger,
        cfg.ingest.fetch_timeout(),
        cfg.ingest.persist_timeout(),
    );
    let scheduler = Scheduler::new(cycle, cfg.ingest.interval());

    info!(
        interval_secs = cfg.ingest.interval_secs,
        "Entering main loop. Press Ctrl+C to stop."
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    let stats = scheduler
        .run(shutdown)
        .await
        .context("Ingestion stopped on a fatal error")?;

    info!(
        cycles = stats.cycles_run,
        failed = stats.cycles_failed,
        observations = stats.observations_recorded,
        "Tiger Tracker shut down cleanly."
    );

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tiger_tracker=info"));

    let json_logging = std::env::var("TRACKER_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
