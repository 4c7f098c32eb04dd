//! Configuration loading and types

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tendcloud_core::Poller;

/// Environment variable pointing at the daemon configuration file
pub const CONFIG_ENV: &str = "TENDCLOUD_CONFIG";

/// Top-level configuration for tendcloud daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Desired state document, re-read on every eligible pass
    #[serde(default = "default_desired_state")]
    pub desired_state: PathBuf,
    /// Daemon server settings
    #[serde(default)]
    pub daemon: DaemonConfig,
    /// Stabilization wait settings
    #[serde(default)]
    pub waiter: WaiterConfig,
    /// Provider backend selection
    #[serde(default)]
    pub provider: ProviderConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            desired_state: default_desired_state(),
            daemon: DaemonConfig::default(),
            waiter: WaiterConfig::default(),
            provider: ProviderConfig::default(),
        }
    }
}

fn default_desired_state() -> PathBuf {
    PathBuf::from("desired-state.toml")
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Daemon server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Address and port to bind to
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Seconds between desired state modification checks
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            tick_interval_secs: default_tick_interval_secs(),
        }
    }
}

impl DaemonConfig {
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs.max(1))
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_tick_interval_secs() -> u64 {
    5
}

/// Stabilization wait settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaiterConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for WaiterConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl WaiterConfig {
    #[must_use]
    pub fn poller(&self) -> Poller {
        Poller::new(Duration::from_secs(self.interval_secs), self.max_attempts)
    }
}

fn default_interval_secs() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    360
}

/// Provider backend implementations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderBackend {
    /// In-memory cloud, one per region
    #[default]
    Simulated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub backend: ProviderBackend,
    /// Status polls a simulated resource spends in a transitional status
    #[serde(default = "default_settle_polls")]
    pub settle_polls: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            backend: ProviderBackend::default(),
            settle_polls: default_settle_polls(),
        }
    }
}

fn default_settle_polls() -> u32 {
    2
}

impl Config {
    /// Load configuration from file
    ///
    /// A relative `desired_state` path is resolved against the directory of
    /// the configuration file.
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        if config.desired_state.is_relative()
            && let Some(dir) = path.parent()
        {
            config.desired_state = dir.join(&config.desired_state);
        }
        Ok(config)
    }

    /// Load from default paths or use defaults
    ///
    /// # Errors
    /// Returns error if a found file cannot be read or parsed
    pub fn load_default() -> eyre::Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load(Path::new(&path));
        }

        let mut paths = vec![
            PathBuf::from("tendcloud.toml"),
            PathBuf::from("/etc/tendcloud/tendcloud.toml"),
        ];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("tendcloud/tendcloud.toml"));
        }

        for path in paths {
            if path.exists() {
                return Self::load(&path);
            }
        }

        tracing::warn!("no config file found, using defaults");
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.daemon.bind, "127.0.0.1:8080");
        assert_eq!(config.daemon.log_format, LogFormat::Pretty);
        assert_eq!(config.daemon.tick_interval(), Duration::from_secs(5));
        assert_eq!(config.waiter.poller().ceiling(), Duration::from_secs(3600));
        assert_eq!(config.provider.backend, ProviderBackend::Simulated);
        assert_eq!(config.desired_state, PathBuf::from("desired-state.toml"));
    }

    #[test]
    fn test_parse_full_document() {
        let config: Config = toml::from_str(
            r#"
desired_state = "/srv/tendcloud/state.toml"

[daemon]
bind = "0.0.0.0:9000"
log_level = "debug"
log_format = "json"
tick_interval_secs = 30

[waiter]
interval_secs = 2
max_attempts = 15

[provider]
backend = "simulated"
settle_polls = 0
"#,
        )
        .unwrap();

        assert_eq!(config.daemon.bind, "0.0.0.0:9000");
        assert_eq!(config.daemon.log_format, LogFormat::Json);
        assert_eq!(config.waiter.poller().ceiling(), Duration::from_secs(30));
        assert_eq!(config.provider.settle_polls, 0);
        assert_eq!(config.desired_state, PathBuf::from("/srv/tendcloud/state.toml"));
    }

    #[test]
    fn test_relative_state_path_follows_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tendcloud.toml");
        std::fs::write(&path, "desired_state = \"state.toml\"\n").unwrap();

        let config = Config::load(&path).unwrap();

        assert_eq!(config.desired_state, dir.path().join("state.toml"));
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let parsed: Result<Config, _> = toml::from_str("[provider]\nbackend = \"mainframe\"\n");
        assert!(parsed.is_err());
    }
}
