// Run snapshot persistence
use crate::error::Error;
use crate::execution::{CloseOutReport, RunStatus};
use crate::models::{Bar, PositionState, Tick, TradeRecord};
use crate::settings::StrategyConfig;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Directory snapshots are written to when no path is given
pub const DEFAULT_SNAPSHOT_DIR: &str = "snapshots";

/// Complete record of a run: configuration, inputs, derived bars and outcome
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSnapshot {
    pub saved_at: DateTime<Utc>,
    pub config: StrategyConfig,
    pub run_start_time: DateTime<Utc>,
    pub status: RunStatus,
    pub state: PositionState,
    pub ticks: Vec<Tick>,
    pub bars: Vec<Bar>,
    pub trades: Vec<TradeRecord>,
    pub close_out: Option<CloseOutReport>,
}

/// Default file for a snapshot of `instrument` taken at `at`
///
/// e.g. `snapshots/EUR_USD_20240102T090000Z.json`
pub fn default_snapshot_path(instrument: &str, at: DateTime<Utc>) -> PathBuf {
    Path::new(DEFAULT_SNAPSHOT_DIR).join(format!(
        "{}_{}.json",
        instrument,
        at.format("%Y%m%dT%H%M%SZ")
    ))
}

fn ensure_json_extension(path: &Path) -> Result<()> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Ok(()),
        _ => Err(Error::Persistence {
            reason: format!("snapshot file must end with .json: {}", path.display()),
        }),
    }
}

/// Write `snapshot` to `path` as pretty JSON, creating parent directories
pub fn save_snapshot(snapshot: &RunSnapshot, path: &Path) -> Result<()> {
    ensure_json_extension(path)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(snapshot)?;
    fs::write(path, json)?;

    tracing::info!(
        path = %path.display(),
        ticks = snapshot.ticks.len(),
        trades = snapshot.trades.len(),
        "Saved run snapshot"
    );

    Ok(())
}

/// Read a snapshot written by [`save_snapshot`]
pub fn load_snapshot(path: &Path) -> Result<RunSnapshot> {
    ensure_json_extension(path)?;

    let json = fs::read_to_string(path)?;
    let snapshot: RunSnapshot = serde_json::from_str(&json)?;

    tracing::debug!(path = %path.display(), "Loaded run snapshot");

    Ok(snapshot)
}
