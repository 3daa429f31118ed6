//! Application configuration
//!
//! Loaded once at startup from a TOML file. A missing file is created with the defaults
//! so users have something to edit; a file that exists but does not parse is an error.

use crate::mapping::error::ConfigError;
use crate::mapping::keyboard::{default_bindings, BindingEntry, KeyboardLayout, WhammyBinding};
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const CONFIG_ENV: &str = "FRETPAD_CONFIG";
const CONFIG_DIR: &str = "fretpad";
const CONFIG_FILE: &str = "config.toml";

/// One day
pub const MAX_POLL_INTERVAL_MS: u64 = 86_400_000;
/// One day
pub const MAX_STATS_INTERVAL_SECS: u64 = 86_400;

/// Where controller state is read from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Gilrs,
    /// Windows only
    Xinput,
}

/// Where key events go
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    /// Windows only
    SendInput,
    /// Log batches instead of injecting them
    Log,
}

impl Default for SinkKind {
    fn default() -> Self {
        if cfg!(windows) {
            SinkKind::SendInput
        } else {
            SinkKind::Log
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Poll tick in milliseconds
    pub poll_interval_ms: u64,
    pub backend: BackendKind,
    /// XInput user index, only used by the `xinput` backend
    pub controller_slot: u32,
    pub sink: SinkKind,
    /// Release every held key when the loop stops
    pub release_on_shutdown: bool,
    pub stats_interval_secs: u64,
    /// Consecutive injection failures before the loop raises an error log
    pub failure_alert_threshold: u64,
    pub log_level: String,
    pub bindings: Vec<BindingEntry>,
    pub whammy: Option<WhammyBinding>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1,
            backend: BackendKind::Gilrs,
            controller_slot: 0,
            sink: SinkKind::default(),
            release_on_shutdown: true,
            stats_interval_secs: 30,
            failure_alert_threshold: 100,
            log_level: "info".to_string(),
            bindings: default_bindings(),
            whammy: Some(WhammyBinding::default()),
        }
    }
}

impl AppConfig {
    /// Checks everything that can be checked without touching a device
    pub fn validate(&self) -> Result<KeyboardLayout, ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.poll_interval_ms > MAX_POLL_INTERVAL_MS {
            return Err(ConfigError::IntervalTooLong {
                field: "poll_interval_ms",
                value: self.poll_interval_ms,
                max: MAX_POLL_INTERVAL_MS,
            });
        }
        if self.stats_interval_secs > MAX_STATS_INTERVAL_SECS {
            return Err(ConfigError::IntervalTooLong {
                field: "stats_interval_secs",
                value: self.stats_interval_secs,
                max: MAX_STATS_INTERVAL_SECS,
            });
        }
        if !cfg!(windows) {
            if self.backend == BackendKind::Xinput {
                return Err(ConfigError::UnsupportedBackend("xinput".to_string()));
            }
            if self.sink == SinkKind::SendInput {
                return Err(ConfigError::UnsupportedBackend("send_input".to_string()));
            }
        }
        KeyboardLayout::new(&self.bindings, self.whammy)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| eyre!("Failed to parse config file: {}", e))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| eyre!("Failed to serialize config: {}", e))
    }

    /// `$FRETPAD_CONFIG`, or `<config dir>/fretpad/config.toml`
    pub fn resolve_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }
        let mut path = dirs::config_dir().ok_or_else(|| eyre!("No config directory found"))?;
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        Ok(path)
    }

    /// Writes the defaults to `path` unless a file already exists there
    pub async fn ensure_default_config(path: &Path) -> Result<()> {
        if tokio::fs::try_exists(path)
            .await
            .map_err(|e| eyre!("Failed to check if config file exists: {}", e))?
        {
            return Ok(());
        }

        warn!(
            "Config file {} does not exist, writing defaults",
            path.display()
        );
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| eyre!("Failed to create config directory: {}", e))?;
        }
        let content = AppConfig::default().to_toml()?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| eyre!("Failed to write default config: {}", e))?;
        Ok(())
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;
        let config = Self::from_toml(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }
}
