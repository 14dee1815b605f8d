//! Usage Report Binary - one aggregation pass printed as JSON
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --bin usage_report -- --range 30d > report.json
//! cargo run --release --bin usage_report -- --init-schema
//! ```
//!
//! `--init-schema` creates the dashboard tables in `USAGEFLOW_DB_PATH` (if
//! missing) before reading. Reads the same environment as the `dashboard`
//! binary.

use chrono::Utc;
use rusqlite::Connection;
use std::env;
use usageflow::catalog::MetricCatalog;
use usageflow::config::DashboardConfig;
use usageflow::dashboard::run_pass;
use usageflow::engine::TimeRange;
use usageflow::sqlite_pragma::apply_optimized_pragmas;
use usageflow::store::{apply_schema, SqliteEventStore};

fn parse_range_from_args(args: &[String]) -> Result<Option<TimeRange>, String> {
    let Some(idx) = args.iter().position(|x| x == "--range") else {
        return Ok(None);
    };
    match args.get(idx + 1) {
        Some(value) => TimeRange::from_str(value)
            .map(Some)
            .ok_or_else(|| {
                let known: Vec<&str> = TimeRange::all().iter().map(|r| r.as_str()).collect();
                format!("unknown range '{}', expected one of {}", value, known.join(", "))
            }),
        None => Err("--range needs a value".to_string()),
    }
}

fn init_schema(config: &DashboardConfig) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(&config.db_path)?;
    apply_optimized_pragmas(&conn)?;
    apply_schema(&conn)?;
    log::info!("✅ Schema ready in {}", config.db_path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    dotenv::dotenv().ok();

    let args: Vec<String> = env::args().collect();
    let config = DashboardConfig::from_env();
    let range = parse_range_from_args(&args)?.unwrap_or(config.default_range);

    if args.iter().any(|a| a == "--init-schema") {
        init_schema(&config)?;
    }

    let catalog = match &config.catalog_path {
        Some(path) => MetricCatalog::load(path)?,
        None => MetricCatalog::default(),
    };
    for warning in catalog.validate() {
        log::warn!("⚠️  Catalog: {}", warning);
    }

    let store = SqliteEventStore::open(&config.db_path)?;
    let report = run_pass(&store, &catalog, range, Utc::now()).await?;

    log::info!(
        "📊 {} range: {} events from {} users",
        report.range,
        report.overview.total_events,
        report.overview.unique_users
    );

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
