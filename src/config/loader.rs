//! Configuration Loader
//!
//! Loads and validates configuration from TOML files matching sniper.toml structure.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::application::MonitorSettings;
use crate::strategy::{ConfigError, StrategyConfig};

/// Environment variable overriding `[monitor] data_dir`
pub const DATA_DIR_ENV: &str = "SNIPER_DATA_DIR";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Main configuration structure matching sniper.toml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub monitor: MonitorSection,
    #[serde(default)]
    pub backtest: BacktestSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Live monitor scheduling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSection {
    /// Seconds between monitoring cycles
    pub poll_interval_secs: u64,
    /// Timeout for each price or discovery call
    pub fetch_timeout_ms: u64,
    /// Where open positions are persisted
    pub data_dir: String,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
            fetch_timeout_ms: 5_000,
            data_dir: "data".to_string(),
        }
    }
}

impl MonitorSection {
    pub fn settings(&self) -> MonitorSettings {
        MonitorSettings {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            fetch_timeout: Duration::from_millis(self.fetch_timeout_ms),
        }
    }

    /// Data directory with `SNIPER_DATA_DIR` override and `~` expansion
    pub fn data_dir_path(&self) -> PathBuf {
        resolve_data_dir(&self.data_dir, std::env::var(DATA_DIR_ENV).ok())
    }
}

/// Backtest inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSection {
    /// Recorded histories (JSON). Synthetic data is generated when absent.
    pub history_file: Option<String>,
    pub synthetic_seed: u64,
    pub synthetic_tokens: usize,
    pub synthetic_points: usize,
}

impl Default for BacktestSection {
    fn default() -> Self {
        Self {
            history_file: None,
            synthetic_seed: 42,
            synthetic_tokens: 25,
            synthetic_points: 240,
        }
    }
}

impl BacktestSection {
    pub fn history_path(&self) -> Option<PathBuf> {
        self.history_file
            .as_deref()
            .map(|p| PathBuf::from(shellexpand::tilde(p).to_string()))
    }
}

/// Logging configuration section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Invalid strategy: {0}")]
    StrategyError(#[from] ConfigError),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, LoaderError> {
    let content = std::fs::read_to_string(path)?;
    Config::from_toml_str(&content)
}

fn resolve_data_dir(configured: &str, env_override: Option<String>) -> PathBuf {
    let raw = env_override
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| configured.to_string());
    PathBuf::from(shellexpand::tilde(&raw).to_string())
}

impl Config {
    /// Configuration with the given strategy and default sections
    pub fn with_strategy(strategy: StrategyConfig) -> Self {
        Self {
            strategy,
            monitor: MonitorSection::default(),
            backtest: BacktestSection::default(),
            logging: LoggingSection::default(),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, LoaderError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), LoaderError> {
        self.strategy.validate()?;

        if self.monitor.poll_interval_secs == 0 {
            return Err(LoaderError::ValidationError(
                "poll_interval_secs must be > 0".to_string(),
            ));
        }

        if self.monitor.fetch_timeout_ms == 0 {
            return Err(LoaderError::ValidationError(
                "fetch_timeout_ms must be > 0".to_string(),
            ));
        }

        if self.monitor.data_dir.trim().is_empty() {
            return Err(LoaderError::ValidationError(
                "data_dir cannot be empty".to_string(),
            ));
        }

        if self.backtest.synthetic_tokens == 0 || self.backtest.synthetic_points == 0 {
            return Err(LoaderError::ValidationError(format!(
                "synthetic_tokens and synthetic_points must be > 0, got {} and {}",
                self.backtest.synthetic_tokens, self.backtest.synthetic_points
            )));
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(LoaderError::ValidationError(format!(
                "logging level must be one of {:?}, got {}",
                LOG_LEVELS, self.logging.level
            )));
        }

        Ok(())
    }
}

impl From<&Config> for StrategyConfig {
    fn from(config: &Config) -> Self {
        config.strategy.clone()
    }
}
