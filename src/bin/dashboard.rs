//! Dashboard Binary - periodic refresh passes over the event database
//!
//! Runs a fetch-and-aggregate pass on a timer, keeps the last good report
//! and writes it as a JSON snapshot for the dashboard front end.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --bin dashboard
//! cargo run --release --bin dashboard -- --range 30d
//! cargo run --release --bin dashboard -- --once
//! ```
//!
//! ## Environment Variables
//!
//! - USAGEFLOW_DB_PATH - SQLite event database (default: data/usageflow.db)
//! - REFRESH_INTERVAL_SECS - Seconds between refresh passes (default: 60)
//! - DEFAULT_RANGE - Initial range: 24h, 7d, 30d, 3m, 6m, 9m, 1y (default: 7d)
//! - METRIC_CATALOG_PATH - JSON metric catalog (optional, built-in catalog otherwise)
//! - SNAPSHOT_PATH - Report snapshot file (default: dashboard_snapshot.json)
//! - SNAPSHOT_INTERVAL_SECS - Seconds between snapshot writes (default: 60)
//! - RUST_LOG - Logging level (optional, default: info)

use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use usageflow::catalog::MetricCatalog;
use usageflow::config::DashboardConfig;
use usageflow::dashboard::{
    load_snapshot, persistence_task, save_snapshot, ApplyOutcome, DisplayState, RefreshCoordinator, RefreshMessage,
};
use usageflow::engine::TimeRange;
use usageflow::store::{EventStore, SqliteEventStore};

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn parse_range_from_args(args: &[String]) -> Option<TimeRange> {
    let idx = args.iter().position(|x| x == "--range")?;
    let value = args.get(idx + 1)?;
    let range = TimeRange::from_str(value);
    if range.is_none() {
        log::warn!("Ignoring unknown --range '{}'", value);
    }
    range
}

fn load_catalog(config: &DashboardConfig) -> Result<MetricCatalog, Box<dyn std::error::Error>> {
    let catalog = match &config.catalog_path {
        Some(path) => MetricCatalog::load(path)?,
        None => {
            log::info!("📚 Using built-in metric catalog");
            MetricCatalog::default()
        }
    };

    for warning in catalog.validate() {
        log::warn!("⚠️  Catalog: {}", warning);
    }
    Ok(catalog)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    dotenv::dotenv().ok();

    let args: Vec<String> = env::args().collect();
    let once = has_flag(&args, "--once");
    let mut config = DashboardConfig::from_env();
    if let Some(range) = parse_range_from_args(&args) {
        config.default_range = range;
    }

    log::info!("🚀 Starting usage dashboard");
    log::info!("   Database: {}", config.db_path.display());
    log::info!("   Range: {}", config.default_range);
    log::info!("   Refresh interval: {}s", config.refresh_interval_secs);
    log::info!("   Snapshot: {}", config.snapshot_path.display());
    log::info!("   Snapshot interval: {}s", config.snapshot_interval_secs);

    let catalog = Arc::new(load_catalog(&config)?);
    let store: Arc<dyn EventStore> = Arc::new(SqliteEventStore::open(&config.db_path)?);

    let display = DisplayState::shared(config.default_range);
    match load_snapshot(&config.snapshot_path) {
        Ok(Some(saved)) => {
            display.write().await.restore(saved);
        }
        Ok(None) => {}
        Err(e) => log::warn!("Ignoring unreadable snapshot: {}", e),
    }

    let coordinator = RefreshCoordinator::new(store, catalog, display.clone());

    if once {
        let outcome = coordinator.spawn_pass().await.await?;
        if outcome != ApplyOutcome::Applied {
            return Err(format!("refresh pass did not complete: {:?}", outcome).into());
        }
        if let Some(snapshot) = display.read().await.current() {
            save_snapshot(snapshot, &config.snapshot_path)?;
            log::info!("✅ Wrote {}", config.snapshot_path.display());
        }
        return Ok(());
    }

    let (tx, rx) = mpsc::channel::<RefreshMessage>(16);

    tokio::spawn(persistence_task(
        display.clone(),
        config.snapshot_path.clone(),
        Duration::from_secs(config.snapshot_interval_secs),
    ));

    let refresh_handle = tokio::spawn(coordinator.run(rx, Duration::from_secs(config.refresh_interval_secs)));

    log::info!("✅ Dashboard running - press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;
    log::info!("🛑 Shutting down");

    tx.send(RefreshMessage::Shutdown).await.ok();
    refresh_handle.await?;

    let snapshot = display.read().await.current().cloned();
    if let Some(snapshot) = snapshot {
        if let Err(e) = save_snapshot(&snapshot, &config.snapshot_path) {
            log::warn!("Failed to save final snapshot: {}", e);
        }
    }

    Ok(())
}
