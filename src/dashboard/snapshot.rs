//! JSON snapshot of the displayed report
//!
//! The snapshot is the presentation boundary: whatever renders the dashboard
//! reads this file. It is also read back at startup so the display is not
//! empty while the first pass runs.

use super::refresh::{DisplaySnapshot, SharedDisplay};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::interval;

/// Write the snapshot as pretty JSON
///
/// Writes to a sibling temp file first and renames it into place, so a
/// reader never sees a half-written snapshot.
pub fn save_snapshot(snapshot: &DisplaySnapshot, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string_pretty(snapshot)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;

    log::debug!("Saved pass #{} ({}) to {}", snapshot.pass_id, snapshot.report.range, path.display());
    Ok(())
}

/// Load a previously saved snapshot; `None` when there is no file yet
pub fn load_snapshot(path: &Path) -> Result<Option<DisplaySnapshot>, Box<dyn std::error::Error>> {
    if !path.exists() {
        log::info!("No existing snapshot file found: {}", path.display());
        return Ok(None);
    }

    let json = fs::read_to_string(path)?;
    let mut snapshot: DisplaySnapshot = serde_json::from_str(&json)?;
    snapshot.pass_id = 0;

    log::info!(
        "Loaded snapshot from {} ({} range, generated {})",
        path.display(),
        snapshot.report.range,
        snapshot.report.generated_at
    );
    Ok(Some(snapshot))
}

/// Background task that periodically writes the displayed report
///
/// Skips ticks where nothing new has been applied since the last write.
pub async fn persistence_task(display: SharedDisplay, path: PathBuf, every: Duration) {
    let mut timer = interval(every);
    let mut last_written: Option<u64> = None;

    loop {
        timer.tick().await;

        let snapshot = {
            let state = display.read().await;
            state.current().cloned()
        };

        let Some(snapshot) = snapshot else {
            continue;
        };
        if last_written == Some(snapshot.pass_id) {
            continue;
        }

        match save_snapshot(&snapshot, &path) {
            Ok(()) => last_written = Some(snapshot.pass_id),
            Err(e) => log::warn!("Failed to save snapshot: {}", e),
        }
    }
}
