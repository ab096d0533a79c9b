use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::notifications::QueueSettings;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse TOML from config file at {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("Failed to load config from environment: {0}")]
    Env(#[from] envy::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Externally reachable base URL, used to build checkin links.
    pub base_url: String,
    pub log_dir: String,
    pub notifier_tick_ms: u64,
    pub notifier_limit_window_seconds: u64,
    pub checkin_sweep_seconds: u64,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
struct PartialServerConfig {
    base_url: Option<String>,
    log_dir: Option<String>,
    notifier_tick_ms: Option<u64>,
    notifier_limit_window_seconds: Option<u64>,
    checkin_sweep_seconds: Option<u64>,
}

const ENV_PREFIX: &str = "STATUSWATCH_";

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            log_dir: default_log_dir(),
            notifier_tick_ms: 1000,
            notifier_limit_window_seconds: 60,
            checkin_sweep_seconds: 10,
        }
    }
}

impl ServerConfig {
    /// Loads configuration in layers: defaults, then the optional TOML file,
    /// then `STATUSWATCH_*` environment variables (a `.env` file is honoured).
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::load_with_env(config_path, std::env::vars())
    }

    fn load_with_env<I>(config_path: Option<&str>, env_vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        // 1. Load from file (optional)
        let file_config = match config_path {
            Some(path_str) if Path::new(path_str).exists() => {
                let contents = fs::read_to_string(path_str).map_err(|source| ConfigError::Read {
                    path: path_str.to_string(),
                    source,
                })?;
                toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                    path: path_str.to_string(),
                    source,
                })?
            }
            _ => PartialServerConfig::default(),
        };

        // 2. Load from environment variables
        let env_config = envy::prefixed(ENV_PREFIX).from_iter::<_, PartialServerConfig>(env_vars)?;

        // 3. Merge: environment overrides file
        let defaults = ServerConfig::default();
        let config = ServerConfig {
            base_url: env_config
                .base_url
                .or(file_config.base_url)
                .unwrap_or(defaults.base_url),
            log_dir: env_config
                .log_dir
                .or(file_config.log_dir)
                .unwrap_or(defaults.log_dir),
            notifier_tick_ms: env_config
                .notifier_tick_ms
                .or(file_config.notifier_tick_ms)
                .unwrap_or(defaults.notifier_tick_ms),
            notifier_limit_window_seconds: env_config
                .notifier_limit_window_seconds
                .or(file_config.notifier_limit_window_seconds)
                .unwrap_or(defaults.notifier_limit_window_seconds),
            checkin_sweep_seconds: env_config
                .checkin_sweep_seconds
                .or(file_config.checkin_sweep_seconds)
                .unwrap_or(defaults.checkin_sweep_seconds),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("base_url must not be empty".to_string()));
        }
        if self.notifier_tick_ms == 0 {
            return Err(ConfigError::Invalid("notifier_tick_ms must be positive".to_string()));
        }
        if self.checkin_sweep_seconds == 0 {
            return Err(ConfigError::Invalid(
                "checkin_sweep_seconds must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn queue_settings(&self) -> QueueSettings {
        QueueSettings {
            tick: Duration::from_millis(self.notifier_tick_ms),
            limit_window: Duration::from_secs(self.notifier_limit_window_seconds),
        }
    }

    pub fn checkin_sweep_period(&self) -> Duration {
        Duration::from_secs(self.checkin_sweep_seconds)
    }
}
