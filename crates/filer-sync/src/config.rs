//! Configuration constants and the optional JSON settings file.
//!
//! Every knob has a default here; the settings file only overrides what it names.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::file_system::listing::{SortDirection, SortKey};

/// Entries per streaming batch
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Quiet period after the last applied change before a reconciliation pass runs
pub const DEFAULT_RECONCILE_QUIESCENCE_MS: u64 = 2000;

/// Debounce window of the notify debouncer (coalesces event storms)
pub const DEFAULT_WATCHER_DEBOUNCE_MS: u64 = 200;

/// Environment variable the binary reads the settings file path from
pub const CONFIG_PATH_ENV: &str = "FILER_SYNC_CONFIG";

/// Engine settings.
/// Note: Uses serde aliases to accept both snake_case and camelCase keys
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    #[serde(alias = "batchSize")]
    pub batch_size: usize,
    #[serde(alias = "reconcileQuiescenceMs")]
    pub reconcile_quiescence_ms: u64,
    #[serde(alias = "watcherDebounceMs")]
    pub watcher_debounce_ms: u64,
    #[serde(alias = "sortKey")]
    pub sort_key: SortKey,
    #[serde(alias = "sortDirection")]
    pub sort_direction: SortDirection,
    /// Attach an OS watcher. Without it, only explicit refresh and reconciliation keep the view current.
    #[serde(alias = "liveUpdates")]
    pub live_updates: bool,
    /// Default refresh mode for callers that don't pick one (the binary).
    pub streaming: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            reconcile_quiescence_ms: DEFAULT_RECONCILE_QUIESCENCE_MS,
            watcher_debounce_ms: DEFAULT_WATCHER_DEBOUNCE_MS,
            sort_key: SortKey::default(),
            sort_direction: SortDirection::default(),
            live_updates: true,
            streaming: true,
        }
    }
}

impl SyncConfig {
    pub fn reconcile_quiescence(&self) -> Duration {
        Duration::from_millis(self.reconcile_quiescence_ms)
    }

    pub fn watcher_debounce(&self) -> Duration {
        Duration::from_millis(self.watcher_debounce_ms)
    }

    /// Batch size, never zero.
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.max(1)
    }
}

/// Loads settings from a JSON file.
/// Returns defaults if the file doesn't exist or can't be parsed.
pub fn load_config(path: Option<&Path>) -> SyncConfig {
    let Some(path) = path else {
        return SyncConfig::default();
    };

    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            log::warn!("Config: can't read {}, using defaults: {}", path.display(), e);
            return SyncConfig::default();
        }
    };

    parse_config(&contents).unwrap_or_else(|e| {
        log::warn!("Config: can't parse {}, using defaults: {}", path.display(), e);
        SyncConfig::default()
    })
}

fn parse_config(contents: &str) -> Result<SyncConfig, serde_json::Error> {
    serde_json::from_str(contents)
}
