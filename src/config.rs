use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;
use url::Url;

const CONFIG_DIR_PREFIX: &str = "sheet-cli";
const DEFAULT_API_BASE_URL: &str = "https://sheets.googleapis.com/v4/";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub google: GoogleConfig,
    pub retry: RetryConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct GoogleConfig {
    /// Directory holding `credentials.json` and the token cache
    pub credentials_dir: Option<PathBuf>,
    pub api_base_url: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            credentials_dir: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }
}

/// Ceiling on `retry.max_attempts`
const MAX_RETRY_ATTEMPTS: u32 = 10;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_file()?;

        if !config_path.exists() {
            debug!(path = ?config_path, "No config file, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&config_path)?;
        Self::parse(&contents)
    }

    fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {}", e)))?;

        if !(1..=MAX_RETRY_ATTEMPTS).contains(&config.retry.max_attempts) {
            return Err(AppError::Config(format!(
                "retry.max_attempts must be between 1 and {}, got {}",
                MAX_RETRY_ATTEMPTS, config.retry.max_attempts
            )));
        }

        Url::parse(&config.google.api_base_url).map_err(|e| {
            AppError::Config(format!(
                "Invalid google.api_base_url '{}': {}",
                config.google.api_base_url, e
            ))
        })?;

        Ok(config)
    }

    fn xdg_dirs() -> xdg::BaseDirectories {
        xdg::BaseDirectories::with_prefix(CONFIG_DIR_PREFIX)
    }

    /// Get the config file path
    pub fn config_file() -> Result<PathBuf> {
        let xdg_dirs = Self::xdg_dirs();
        xdg_dirs
            .get_config_file("config.toml")
            .ok_or_else(|| AppError::Config("Failed to determine config directory".to_string()))
    }

    /// Get the directory holding the client secret and token cache
    pub fn credentials_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.google.credentials_dir {
            return Ok(dir.clone());
        }

        Self::xdg_dirs()
            .get_config_home()
            .ok_or_else(|| AppError::Config("Failed to determine credentials directory".to_string()))
    }
}
