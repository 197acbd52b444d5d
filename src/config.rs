//! Persistent configuration model and defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::info;

use crate::error::InfoDbResult;
use crate::state_store::ReconciliationState;

/// Root configuration persisted to `infodb.toml`.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Config {
    #[serde(default)]
    /// Cache and redo behavior.
    pub info_db: InfoDbConfig,
    #[serde(default)]
    /// Remote lookup service connection.
    pub lookup: LookupConfig,
}

/// Cache, worker pool, and redo preferences.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct InfoDbConfig {
    /// Re-attempt lookups for negative entries once per cooldown window.
    /// When unset, the `info_db_retry` flag already in the state file is kept.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_enabled: Option<bool>,
    #[serde(default = "default_redo_cooldown_secs")]
    pub redo_cooldown_secs: u64,
    #[serde(default = "default_lookup_workers")]
    pub lookup_workers: usize,
    #[serde(default = "default_lookup_queue_capacity")]
    pub lookup_queue_capacity: usize,
    /// Overrides the default `InfoDb.db` location.
    #[serde(default)]
    pub db_path: Option<String>,
    /// Overrides the default `state.toml` location.
    #[serde(default)]
    pub state_path: Option<String>,
}

/// HTTP lookup endpoint settings.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct LookupConfig {
    #[serde(default = "default_lookup_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

impl InfoDbConfig {
    pub fn redo_cooldown(&self) -> Duration {
        Duration::from_secs(self.redo_cooldown_secs)
    }

    /// Writes `retry_enabled` into the reconciliation state when it is set.
    pub fn apply_retry_override(&self, state: &ReconciliationState) -> InfoDbResult<()> {
        match self.retry_enabled {
            Some(enabled) => state.set_retry_enabled(enabled),
            None => Ok(()),
        }
    }
}

impl Default for InfoDbConfig {
    fn default() -> Self {
        Self {
            retry_enabled: None,
            redo_cooldown_secs: default_redo_cooldown_secs(),
            lookup_workers: default_lookup_workers(),
            lookup_queue_capacity: default_lookup_queue_capacity(),
            db_path: None,
            state_path: None,
        }
    }
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            endpoint: default_lookup_endpoint(),
            requests_per_second: default_requests_per_second(),
            connect_timeout_ms: default_connect_timeout_ms(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

fn default_redo_cooldown_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_lookup_workers() -> usize {
    4
}

fn default_lookup_queue_capacity() -> usize {
    256
}

fn default_lookup_endpoint() -> String {
    "http://127.0.0.1:8750/info".to_string()
}

fn default_requests_per_second() -> u32 {
    4
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_read_timeout_ms() -> u64 {
    7_000
}

/// Default config file location.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("infodb.toml"))
}

/// Clamps values that would stall or disable the cache.
pub fn sanitize_config(config: Config) -> Config {
    Config {
        info_db: InfoDbConfig {
            redo_cooldown_secs: config.info_db.redo_cooldown_secs.max(60),
            lookup_workers: config.info_db.lookup_workers.clamp(1, 64),
            lookup_queue_capacity: config.info_db.lookup_queue_capacity.max(1),
            ..config.info_db
        },
        lookup: LookupConfig {
            endpoint: config.lookup.endpoint.trim().trim_end_matches('/').to_string(),
            requests_per_second: config.lookup.requests_per_second.max(1),
            connect_timeout_ms: config.lookup.connect_timeout_ms.max(100),
            read_timeout_ms: config.lookup.read_timeout_ms.max(100),
        },
    }
}

/// Reads `path`, writing the default config first when it does not exist.
pub fn load_or_create(path: &Path) -> InfoDbResult<Config> {
    if !path.exists() {
        info!(
            "Config file not found. Creating default config. path={}",
            path.display()
        );
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, toml::to_string(&Config::default())?)?;
    }
    let content = std::fs::read_to_string(path)?;
    Ok(sanitize_config(toml::from_str::<Config>(&content)?))
}
