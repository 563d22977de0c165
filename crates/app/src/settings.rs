//! Handles settings for the application. Configuration is written in
//! `settings.toml` (override the file name with `COINPURSE_CONFIG`).

use config::{Config, ConfigError, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    /// Log level passed to the tracing env-filter (`trace`..`error`).
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Economy {
    /// Path of the durable ledger snapshot.
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,
    /// Seconds between autosave checkpoints; 0 disables the autosave task.
    #[serde(default = "default_autosave_seconds")]
    pub autosave_seconds: u64,
    /// Explicit override for the mandatory shutdown checkpoint.
    #[serde(default = "default_save_on_shutdown")]
    pub save_on_shutdown: bool,
}

impl Default for Economy {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
            autosave_seconds: default_autosave_seconds(),
            save_on_shutdown: default_save_on_shutdown(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub app: App,
    #[serde(default)]
    pub economy: Economy,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_snapshot_path() -> String {
    "coinpurse.json".to_string()
}

fn default_autosave_seconds() -> u64 {
    300
}

fn default_save_on_shutdown() -> bool {
    true
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let name =
            std::env::var("COINPURSE_CONFIG").unwrap_or_else(|_| "settings".to_string());
        let settings = Config::builder()
            .add_source(File::with_name(&name).required(false))
            .build()?;

        settings.try_deserialize()
    }
}
