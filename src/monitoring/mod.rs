//! Monitoring module for the predictor sidecar
//!
//! Provides:
//! - Structured logging with tracing
//! - Prometheus metrics for the cache and the backend client

pub mod config;
pub mod metrics;
pub mod tracing_config;

pub use config::{LogFormat, MonitoringConfig};
pub use metrics::export_prometheus;
pub use tracing_config::init_tracing;
