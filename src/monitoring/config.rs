//! Logging setup consumed by [`init_tracing`](super::init_tracing).
//!
//! Filled in by `AppConfig::from_env` from `MONITORING_ENABLED`, `RUST_LOG`,
//! `LOG_FORMAT`, `LOG_TO_FILE` and `LOG_DIR`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const LOG_SUBDIR: &str = "faceit-predictor";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    /// `EnvFilter` directive used when `RUST_LOG` is unset at init time.
    pub filter: String,
    /// stderr output; `None` silences the console.
    pub console: Option<LogFormat>,
    /// Daily rolling JSON logs are written here when set.
    pub file_dir: Option<PathBuf>,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            filter: "info".to_string(),
            console: Some(LogFormat::Text),
            file_dir: None,
        }
    }
}

impl MonitoringConfig {
    /// `<local data dir>/faceit-predictor/logs`, or under `/tmp` without one.
    pub fn default_log_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(LOG_SUBDIR)
            .join("logs")
    }

    pub fn with_file_logging(mut self, dir: impl Into<PathBuf>) -> Self {
        self.file_dir = Some(dir.into());
        self
    }

    /// Creates the file log directory. `Ok(true)` when it did not exist yet.
    pub fn ensure_log_dir(&self) -> io::Result<bool> {
        match self.file_dir.as_deref() {
            Some(dir) => create_missing(dir),
            None => Ok(false),
        }
    }
}

fn create_missing(dir: &Path) -> io::Result<bool> {
    if dir.is_dir() {
        return Ok(false);
    }
    std::fs::create_dir_all(dir)?;
    Ok(true)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Text,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Json => "json",
            LogFormat::Text => "text",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [LogFormat::Json, LogFormat::Text]
            .into_iter()
            .find(|format| s.eq_ignore_ascii_case(format.as_str()))
            .ok_or_else(|| format!("unknown log format: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_log_to_console_only() {
        let config = MonitoringConfig::default();
        assert!(config.enabled);
        assert_eq!(config.filter, "info");
        assert_eq!(config.console, Some(LogFormat::Text));
        assert_eq!(config.file_dir, None);
        assert!(MonitoringConfig::default_log_dir().ends_with("faceit-predictor/logs"));
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("Text".parse::<LogFormat>(), Ok(LogFormat::Text));
        assert!("xml".parse::<LogFormat>().is_err());
        assert_eq!(LogFormat::Json.to_string(), "json");
    }

    #[test]
    fn test_ensure_log_dir_reports_creation() {
        let dir = tempfile::tempdir().unwrap();
        let config = MonitoringConfig::default().with_file_logging(dir.path().join("nested/logs"));

        assert!(config.ensure_log_dir().unwrap());
        assert!(!config.ensure_log_dir().unwrap());
        assert!(!MonitoringConfig::default().ensure_log_dir().unwrap());
    }
}
