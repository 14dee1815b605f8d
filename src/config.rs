//! Dashboard runtime configuration from environment variables

use crate::engine::TimeRange;
use std::env;
use std::path::PathBuf;

/// Configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// SQLite event database
    pub db_path: PathBuf,

    /// Seconds between time-triggered refresh passes
    pub refresh_interval_secs: u64,

    /// Range used until a different one is selected
    pub default_range: TimeRange,

    /// JSON metric catalog; the built-in catalog when unset
    pub catalog_path: Option<PathBuf>,

    /// Where the latest report snapshot is written
    pub snapshot_path: PathBuf,

    /// Seconds between snapshot writes
    pub snapshot_interval_secs: u64,
}

impl DashboardConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `USAGEFLOW_DB_PATH` (default: data/usageflow.db)
    /// - `REFRESH_INTERVAL_SECS` (default: 60)
    /// - `DEFAULT_RANGE` (default: 7d; one of 24h, 7d, 30d, 3m, 6m, 9m, 1y)
    /// - `METRIC_CATALOG_PATH` (optional)
    /// - `SNAPSHOT_PATH` (default: dashboard_snapshot.json)
    /// - `SNAPSHOT_INTERVAL_SECS` (default: 60)
    pub fn from_env() -> Self {
        let default_range = match env::var("DEFAULT_RANGE") {
            Ok(s) => TimeRange::from_str(&s).unwrap_or_else(|| {
                log::warn!("Unknown DEFAULT_RANGE '{}', using 7d", s);
                TimeRange::Days7
            }),
            Err(_) => TimeRange::Days7,
        };

        Self {
            db_path: env::var("USAGEFLOW_DB_PATH")
                .unwrap_or_else(|_| "data/usageflow.db".to_string())
                .into(),

            refresh_interval_secs: env::var("REFRESH_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(60),

            default_range,

            catalog_path: env::var("METRIC_CATALOG_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),

            snapshot_path: env::var("SNAPSHOT_PATH")
                .unwrap_or_else(|_| "dashboard_snapshot.json".to_string())
                .into(),

            snapshot_interval_secs: env::var("SNAPSHOT_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: [&str; 6] = [
        "USAGEFLOW_DB_PATH",
        "REFRESH_INTERVAL_SECS",
        "DEFAULT_RANGE",
        "METRIC_CATALOG_PATH",
        "SNAPSHOT_PATH",
        "SNAPSHOT_INTERVAL_SECS",
    ];

    // Defaults and overrides share one test so no other test races on the
    // process environment
    #[test]
    fn test_default_and_custom_config() {
        for var in VARS {
            env::remove_var(var);
        }

        let config = DashboardConfig::from_env();
        assert_eq!(config.db_path, PathBuf::from("data/usageflow.db"));
        assert_eq!(config.refresh_interval_secs, 60);
        assert_eq!(config.default_range, TimeRange::Days7);
        assert_eq!(config.catalog_path, None);
        assert_eq!(config.snapshot_path, PathBuf::from("dashboard_snapshot.json"));
        assert_eq!(config.snapshot_interval_secs, 60);

        env::set_var("USAGEFLOW_DB_PATH", "/tmp/test.db");
        env::set_var("REFRESH_INTERVAL_SECS", "15");
        env::set_var("DEFAULT_RANGE", "3m");
        env::set_var("METRIC_CATALOG_PATH", "catalog.json");
        env::set_var("SNAPSHOT_INTERVAL_SECS", "0");

        let config = DashboardConfig::from_env();
        assert_eq!(config.db_path, PathBuf::from("/tmp/test.db"));
        assert_eq!(config.refresh_interval_secs, 15);
        assert_eq!(config.default_range, TimeRange::Months3);
        assert_eq!(config.catalog_path, Some(PathBuf::from("catalog.json")));
        assert_eq!(config.snapshot_interval_secs, 60);

        env::set_var("DEFAULT_RANGE", "fortnight");
        assert_eq!(DashboardConfig::from_env().default_range, TimeRange::Days7);

        // Cleanup
        for var in VARS {
            env::remove_var(var);
        }
    }
}
