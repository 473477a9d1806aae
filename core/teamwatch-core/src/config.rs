//! Configuration loading.
//!
//! Reads `~/.teamwatch/config.toml` (or `TEAMWATCH_CONFIG`). A missing file
//! yields defaults; a malformed file is an error so a typo never silently
//! points the client at the wrong server.

use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{MonitorError, Result};
use crate::roster::StalenessPolicy;

const DEFAULT_CONFIG_RELATIVE_PATH: &str = ".teamwatch/config.toml";
pub const CONFIG_ENV: &str = "TEAMWATCH_CONFIG";
pub const SERVER_ENV: &str = "TEAMWATCH_SERVER";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    #[serde(default = "default_server_address")]
    pub address: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_server_address(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl ServerConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SyncConfig {
    #[serde(default)]
    pub staleness: StalenessPolicy,
    /// Maximum retained messages; 0 keeps every message.
    #[serde(default = "default_message_log_capacity")]
    pub message_log_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            staleness: StalenessPolicy::default(),
            message_log_capacity: default_message_log_capacity(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ReconnectConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_reconnect_window_secs")]
    pub window_secs: u64,
    #[serde(default = "default_reconnect_free_attempts")]
    pub free_attempts: usize,
    #[serde(default = "default_reconnect_step_secs")]
    pub step_secs: u64,
    #[serde(default = "default_reconnect_max_secs")]
    pub max_secs: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_secs: default_reconnect_window_secs(),
            free_attempts: default_reconnect_free_attempts(),
            step_secs: default_reconnect_step_secs(),
            max_secs: default_reconnect_max_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct MonitorConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

impl MonitorConfig {
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            staleness: self.sync.staleness,
            message_log_capacity: match self.sync.message_log_capacity {
                0 => None,
                capacity => Some(capacity),
            },
        }
    }
}

/// Runtime knobs consumed by the session reducers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    pub staleness: StalenessPolicy,
    pub message_log_capacity: Option<usize>,
}

fn default_server_address() -> String {
    "127.0.0.1:4100".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    3000
}

fn default_message_log_capacity() -> usize {
    10_000
}

fn default_true() -> bool {
    true
}

fn default_reconnect_window_secs() -> u64 {
    120
}

fn default_reconnect_free_attempts() -> usize {
    3
}

fn default_reconnect_step_secs() -> u64 {
    2
}

fn default_reconnect_max_secs() -> u64 {
    30
}

/// Returns the default config path (`~/.teamwatch/config.toml`).
pub fn default_config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or(MonitorError::HomeDirNotFound)?;
    Ok(home.join(DEFAULT_CONFIG_RELATIVE_PATH))
}

/// Loads the config from `path`, `TEAMWATCH_CONFIG`, or the default location,
/// then applies the `TEAMWATCH_SERVER` override.
pub fn load_config(path: Option<PathBuf>) -> Result<MonitorConfig> {
    let config_path = match path.or_else(|| env::var(CONFIG_ENV).ok().map(PathBuf::from)) {
        Some(path) => path,
        None => default_config_path()?,
    };

    let mut config = load_config_file(&config_path)?;
    if let Ok(address) = env::var(SERVER_ENV) {
        if !address.trim().is_empty() {
            config.server.address = address;
        }
    }
    Ok(config)
}

pub fn load_config_file(path: &Path) -> Result<MonitorConfig> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "Config file missing; using defaults");
        return Ok(MonitorConfig::default());
    }

    let content = fs_err::read_to_string(path).map_err(|source| MonitorError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str::<MonitorConfig>(&content).map_err(|err| MonitorError::ConfigMalformed {
        path: path.to_path_buf(),
        details: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_file_missing() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let config = load_config_file(&temp_dir.path().join("missing.toml")).expect("load config");
        assert_eq!(config, MonitorConfig::default());
        assert_eq!(config.server.address, "127.0.0.1:4100");
        assert_eq!(config.sync_options().message_log_capacity, Some(10_000));
        assert_eq!(
            config.sync_options().staleness,
            StalenessPolicy::LastReceivedWins
        );
    }

    #[test]
    fn parses_sections() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("config.toml");
        fs_err::write(
            &path,
            r#"
[server]
address = "10.0.0.5:9000"

[sync]
staleness = "reject_older"
message_log_capacity = 0

[reconnect]
enabled = false
max_secs = 5
"#,
        )
        .expect("write config");

        let config = load_config_file(&path).expect("load config");
        assert_eq!(config.server.address, "10.0.0.5:9000");
        assert_eq!(config.server.connect_timeout_ms, 3000);
        let options = config.sync_options();
        assert_eq!(options.staleness, StalenessPolicy::RejectOlder);
        assert_eq!(options.message_log_capacity, None);
        assert!(!config.reconnect.enabled);
        assert_eq!(config.reconnect.max_secs, 5);
        assert_eq!(config.reconnect.free_attempts, 3);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("config.toml");
        fs_err::write(&path, "[sync]\nstaleness = \"newest\"\n").expect("write config");

        let err = load_config_file(&path).expect_err("unknown policy");
        assert!(matches!(err, MonitorError::ConfigMalformed { .. }));
    }
}
