use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// `max_parallel_downloads` value meaning "no admission limit".
pub const UNLIMITED: i32 = -1;

/// Global configuration loaded from `~/.config/dlq/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqConfig {
    /// Maximum number of downloads with a live job at once (`-1` = unlimited).
    pub max_parallel_downloads: i32,
    /// Connect timeout handed to the HTTP transport, in milliseconds.
    pub connect_timeout_ms: u64,
    /// Read (stall) timeout handed to the HTTP transport, in milliseconds.
    pub read_timeout_ms: u64,
    /// Minimum spacing between progress callbacks, in milliseconds.
    pub progress_interval_ms: u64,
    /// Ask the notification collaborator to render terminal-state notifications.
    #[serde(default)]
    pub notifications_enabled: bool,
    /// Record database location (None = `~/.local/state/dlq/downloads.db`).
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

impl Default for DlqConfig {
    fn default() -> Self {
        Self {
            max_parallel_downloads: UNLIMITED,
            connect_timeout_ms: 10_000,
            read_timeout_ms: 10_000,
            progress_interval_ms: 1_500,
            notifications_enabled: false,
            db_path: None,
        }
    }
}

impl DlqConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    /// Admission limit as a count; None when unlimited (any negative value).
    pub fn parallel_limit(&self) -> Option<usize> {
        usize::try_from(self.max_parallel_downloads).ok()
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("dlq")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<DlqConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = DlqConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: DlqConfig = toml::from_str(&data)?;
    Ok(cfg)
}
