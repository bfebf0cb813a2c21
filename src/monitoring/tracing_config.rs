//! Structured logging with tracing
//!
//! Sets up:
//! - Console logging on stderr (text or JSON)
//! - File logging with daily rotation, JSON lines (optional)
//! - Level filtering from RUST_LOG or the configured level

use super::config::{LogFormat, MonitoringConfig};
use tracing::info;
use tracing_appender::non_blocking;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::daily;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const LOG_FILE_PREFIX: &str = "predictor.log";

/// Initialize tracing subscriber
///
/// Returns the file writer guard when file logging is on. Keep it alive for
/// the duration of the program; dropping it stops file logging.
pub fn init_tracing(config: &MonitoringConfig) -> std::io::Result<Option<WorkerGuard>> {
    if !config.enabled {
        return Ok(None);
    }

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.filter));

    let console_layer = config.console.map(|format| {
        let base = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true);
        match format {
            LogFormat::Json => base.json().boxed(),
            LogFormat::Text => base.boxed(),
        }
    });

    let created_dir = config.ensure_log_dir()?;
    let mut guard = None;
    let file_layer = config.file_dir.as_ref().map(|dir| {
        let (writer, file_guard) = non_blocking(daily(dir, LOG_FILE_PREFIX));
        guard = Some(file_guard);
        fmt::layer()
            .with_writer(writer)
            .with_ansi(false) // No ANSI codes in files
            .json()
    });

    // a subscriber may already be installed (tests, embedding hosts)
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    if let (true, Some(dir)) = (created_dir, &config.file_dir) {
        info!(path = %dir.display(), "Created log directory");
    }
    info!(
        console = ?config.console.map(|f| f.as_str()),
        file_logging = config.file_dir.is_some(),
        "Tracing initialized"
    );

    Ok(guard)
}
