// src/config.rs
use crate::cache::CacheConfig;
use crate::client::{ApiClientConfig, RetryPolicy};
use crate::monitoring::{LogFormat, MonitoringConfig};
use crate::storage::{StorageBackend, StorageConfig};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub api: ApiClientConfig,
    pub retry: RetryPolicy,
    pub cache: CacheConfig,
    pub storage: StorageConfig,
    pub monitoring: MonitoringConfig,
    pub predictions_for_finished_matches: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3010,
            api: ApiClientConfig::default(),
            retry: RetryPolicy::default(),
            cache: CacheConfig::default(),
            storage: StorageConfig::default(),
            monitoring: MonitoringConfig::default(),
            predictions_for_finished_matches: false,
        }
    }
}

fn parse_var<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
        Err(_) => Ok(None),
    }
}

fn parse_bool(key: &str) -> Result<Option<bool>, ConfigError> {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(Some(true)),
            "false" | "0" | "no" => Ok(Some(false)),
            _ => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
        },
        Err(_) => Ok(None),
    }
}

impl AppConfig {
    /// Environment, after `.env` unless `NO_DOTENV=true`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let skip_dotenv = env::var("NO_DOTENV")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(false);
        if !skip_dotenv {
            dotenvy::dotenv().ok();
        }
        Self::from_current_env()
    }

    /// Process environment only.
    pub fn from_current_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(host) = env::var("BACKEND_HOST") {
            config.host = host;
        }
        if let Some(port) = parse_var("BACKEND_PORT")? {
            config.port = port;
        }

        if let Ok(url) = env::var("PREDICTOR_API_BASE_URL") {
            config.api.base_url = url;
        }
        if let Ok(key) = env::var("PREDICTOR_API_SECRET_KEY") {
            config.api.secret_key = key;
        }
        if let Some(secs) = parse_var::<u64>("PREDICTOR_API_TIMEOUT_SECS")? {
            config.api.timeout = Duration::from_secs(secs);
        }

        if let Some(attempts) = parse_var("PREDICTOR_RETRY_ATTEMPTS")? {
            config.retry.max_attempts = attempts;
        }
        if let Some(ms) = parse_var::<u64>("PREDICTOR_RETRY_DELAY_MS")? {
            config.retry.initial_delay = Duration::from_millis(ms);
        }

        if let Some(max_items) = parse_var("PREDICTOR_CACHE_MAX_ITEMS")? {
            config.cache.max_items = max_items;
        }

        if let Ok(raw) = env::var("PREDICTOR_STORAGE_BACKEND") {
            config.storage.backend = StorageBackend::from_str(&raw).map_err(|_| ConfigError::InvalidValue {
                key: "PREDICTOR_STORAGE_BACKEND".to_string(),
                value: raw,
            })?;
        }
        if let Ok(path) = env::var("PREDICTOR_SQLITE_PATH") {
            config.storage.sqlite_path = PathBuf::from(path);
        }
        if let Ok(url) = env::var("REDIS_URL") {
            config.storage.redis_url = url;
        }

        if let Some(enabled) = parse_bool("PREDICTIONS_FOR_FINISHED_MATCHES_ENABLED")? {
            config.predictions_for_finished_matches = enabled;
        }

        if let Some(enabled) = parse_bool("MONITORING_ENABLED")? {
            config.monitoring.enabled = enabled;
        }
        if let Ok(filter) = env::var("RUST_LOG") {
            config.monitoring.filter = filter;
        }
        if let Some(format) = parse_var::<LogFormat>("LOG_FORMAT")? {
            config.monitoring.console = Some(format);
        }
        if parse_bool("LOG_TO_FILE")?.unwrap_or(false) {
            let dir = env::var("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| MonitoringConfig::default_log_dir());
            config.monitoring.file_dir = Some(dir);
        }

        Ok(config)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
