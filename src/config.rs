use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::constants;
use crate::error::AppError;

/// ETL tuning knobs: pacing, retry policy and validation thresholds.
///
/// None of these are derived from a documented upstream rate-limit contract;
/// they are operator policy, tuned empirically.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EtlConfig {
    /// Sleep between entities in a reconciliation pass, in seconds
    #[serde(default = "default_sleep_seconds")]
    pub sleep_seconds: f64,
    /// Maximum attempts per remote call
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Backoff schedule in seconds, indexed by attempt
    #[serde(default = "default_backoff_seconds")]
    pub backoff_seconds: Vec<u64>,
    /// Wall-clock budget per remote call, in seconds
    #[serde(default = "default_max_total_wait")]
    pub max_total_wait_seconds: u64,
    /// Allowed total-vs-split rebound discrepancy before the consistency
    /// rule flags a row
    #[serde(default = "default_rebound_tolerance")]
    pub rebound_tolerance: i64,
}

fn default_sleep_seconds() -> f64 {
    constants::pacing::DEFAULT_SLEEP_SECONDS
}

fn default_max_retries() -> u32 {
    constants::retry::MAX_RETRIES
}

fn default_backoff_seconds() -> Vec<u64> {
    constants::retry::BACKOFF_SECONDS.to_vec()
}

fn default_max_total_wait() -> u64 {
    constants::retry::MAX_TOTAL_WAIT_SECONDS
}

fn default_rebound_tolerance() -> i64 {
    constants::validation::REBOUND_TOLERANCE
}

impl Default for EtlConfig {
    fn default() -> Self {
        EtlConfig {
            sleep_seconds: default_sleep_seconds(),
            max_retries: default_max_retries(),
            backoff_seconds: default_backoff_seconds(),
            max_total_wait_seconds: default_max_total_wait(),
            rebound_tolerance: default_rebound_tolerance(),
        }
    }
}

/// Application configuration, loaded from a TOML file with environment
/// variable overrides.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Database connection URL (SQLite)
    #[serde(default = "default_database_url")]
    pub database_url: String,
    /// Base URL of the stats API, without a trailing slash
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// HTTP timeout in seconds for API requests
    #[serde(default = "default_http_timeout")]
    pub http_timeout_seconds: u64,
    /// Path to the log file. If not specified, logs go to a default location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file_path: Option<String>,
    /// Pin the season instead of auto-detecting from the system date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season_override: Option<String>,
    #[serde(default)]
    pub etl: EtlConfig,
}

fn default_database_url() -> String {
    constants::DEFAULT_DATABASE_URL.to_string()
}

fn default_api_base_url() -> String {
    constants::DEFAULT_API_BASE_URL.to_string()
}

fn default_http_timeout() -> u64 {
    constants::DEFAULT_HTTP_TIMEOUT_SECONDS
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_url: default_database_url(),
            api_base_url: default_api_base_url(),
            http_timeout_seconds: default_http_timeout(),
            log_file_path: None,
            season_override: None,
            etl: EtlConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the default config file location. A missing
    /// file is not an error: defaults apply, and environment variables can
    /// still override them.
    ///
    /// # Environment Variables
    /// - `HOOPLINE_DATABASE_URL` - Override database URL
    /// - `HOOPLINE_API_BASE_URL` - Override API base URL
    /// - `HOOPLINE_LOG_FILE` - Override log file path
    /// - `HOOPLINE_HTTP_TIMEOUT` - Override HTTP timeout in seconds
    /// - `HOOPLINE_SEASON` - Pin the season label
    /// - `HOOPLINE_SLEEP_SECONDS` - Override inter-entity sleep
    pub async fn load() -> Result<Self, AppError> {
        let config_path = get_config_path();

        let mut config = if Path::new(&config_path).exists() {
            let content = fs::read_to_string(&config_path).await?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("HOOPLINE_DATABASE_URL") {
            self.database_url = url;
        }
        if let Ok(url) = std::env::var("HOOPLINE_API_BASE_URL") {
            self.api_base_url = url;
        }
        if let Ok(path) = std::env::var("HOOPLINE_LOG_FILE") {
            self.log_file_path = Some(path);
        }
        if let Some(timeout) = std::env::var("HOOPLINE_HTTP_TIMEOUT")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            self.http_timeout_seconds = timeout;
        }
        if let Ok(season) = std::env::var("HOOPLINE_SEASON") {
            self.season_override = Some(season);
        }
        if let Some(sleep) = std::env::var("HOOPLINE_SLEEP_SECONDS")
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
        {
            self.etl.sleep_seconds = sleep;
        }
    }

    /// Validates the configuration settings.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.database_url.trim().is_empty() {
            return Err(AppError::config_error("database_url must not be empty"));
        }
        if self.api_base_url.trim().is_empty() {
            return Err(AppError::config_error("api_base_url must not be empty"));
        }
        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://") {
            return Err(AppError::config_error(format!(
                "api_base_url must start with http:// or https://, got '{}'",
                self.api_base_url
            )));
        }
        if self.http_timeout_seconds == 0 {
            return Err(AppError::config_error(
                "http_timeout_seconds must be greater than zero",
            ));
        }
        if self.etl.max_retries == 0 {
            return Err(AppError::config_error(
                "etl.max_retries must be greater than zero",
            ));
        }
        if self.etl.backoff_seconds.is_empty() {
            return Err(AppError::config_error(
                "etl.backoff_seconds must contain at least one entry",
            ));
        }
        if self.etl.sleep_seconds < 0.0 {
            return Err(AppError::config_error(
                "etl.sleep_seconds must not be negative",
            ));
        }
        if let Some(season) = &self.season_override {
            crate::season::validate_season_label(season)?;
        }
        Ok(())
    }

    /// Saves current configuration to the default config file location.
    pub async fn save(&self) -> Result<(), AppError> {
        self.save_to_path(&get_config_path()).await
    }

    /// Saves configuration to a custom file path, creating parent
    /// directories as needed.
    pub async fn save_to_path(&self, path: &str) -> Result<(), AppError> {
        let config_dir = Path::new(path).parent().ok_or_else(|| {
            AppError::config_error(format!("Path '{path}' has no parent directory"))
        })?;

        if !config_dir.exists() {
            fs::create_dir_all(config_dir).await?;
        }
        let content = toml::to_string_pretty(self)?;
        let mut file = fs::File::create(path).await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Loads configuration from a custom file path, without environment
    /// overrides.
    pub async fn load_from_path(path: &str) -> Result<Self, AppError> {
        let content = fs::read_to_string(path).await?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }
}

/// Returns the platform-specific path for the config file.
pub fn get_config_path() -> String {
    dirs::config_dir()
        .map(|p| p.join("hoopline").join("config.toml"))
        .unwrap_or_else(|| Path::new(".").join("hoopline-config.toml"))
        .to_string_lossy()
        .to_string()
}

/// Returns the platform-specific path for the log directory.
pub fn get_log_dir_path() -> String {
    dirs::config_dir()
        .map(|p| p.join("hoopline").join("logs"))
        .unwrap_or_else(|| Path::new(".").join("logs"))
        .to_string_lossy()
        .to_string()
}
