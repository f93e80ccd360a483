// crates/relic-daemon/src/config.rs
//
// Runtime configuration for the Relic monitoring daemon.
// Loaded from a TOML file or populated with sensible defaults.

use serde::Deserialize;
use std::fs;

/// Runtime configuration for the daemon.
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    /// Directory for local data storage (RocksDB).
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Root of the scene directory tree (`<imagery_dir>/<site_id>/*.json`).
    #[serde(default = "default_imagery_dir")]
    pub imagery_dir: String,

    /// Optional JSON-lines file that receives every change event.
    #[serde(default)]
    pub alerts_path: Option<String>,

    /// Log level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Seconds between scheduler re-syncs with the site registry.
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,

    /// Upper bound on concurrent CPU-bound compositing and index work.
    #[serde(default = "default_max_concurrent_ticks")]
    pub max_concurrent_ticks: usize,
}

fn default_data_dir() -> String {
    "~/.relic/data".to_string()
}

fn default_imagery_dir() -> String {
    "~/.relic/imagery".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_sync_interval_secs() -> u64 {
    300
}

fn default_max_concurrent_ticks() -> usize {
    4
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            imagery_dir: default_imagery_dir(),
            alerts_path: None,
            log_level: default_log_level(),
            sync_interval_secs: default_sync_interval_secs(),
            max_concurrent_ticks: default_max_concurrent_ticks(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from a TOML file at the given path.
    pub fn load(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)?;
        let config: DaemonConfig = toml::from_str(&contents)?;
        Ok(config)
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return format!("{}/{}", home.display(), rest);
        }
    }
    path.to_string()
}
