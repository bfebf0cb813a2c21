//! Multiplicative backoff around a [`PredictionSource`].
//!
//! Attempt `k` (0-indexed) that fails waits `initial_delay * multiplier^k`
//! before attempt `k + 1`. There is no cap on the delay and no overall
//! deadline; the last failure is returned to the caller.

use super::{ApiError, PredictionSource};
use crate::models::Prediction;
use crate::monitoring::metrics;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1000;
pub const DEFAULT_MULTIPLIER: f64 = 1.25;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            multiplier: DEFAULT_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            ..Default::default()
        }
    }

    /// Zero attempts still makes one request.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay after the failed attempt `attempt` (0-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt as i32);
        let nanos = self.initial_delay.as_nanos() as f64 * factor;
        Duration::from_nanos(nanos.round().min(u64::MAX as f64) as u64)
    }
}

pub async fn fetch_with_retry(
    source: &dyn PredictionSource,
    match_id: &str,
    nickname: &str,
    policy: &RetryPolicy,
) -> Result<Prediction, ApiError> {
    let started = Instant::now();
    let attempts = policy.attempts();
    let mut attempt = 0;

    let result = loop {
        metrics::API_ATTEMPTS_TOTAL.inc();
        match source.fetch_prediction(match_id, nickname).await {
            Ok(prediction) => break Ok(prediction),
            Err(e) if attempt + 1 < attempts && e.is_retryable() => {
                let delay = policy.delay_for(attempt);
                debug!(
                    match_id,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Prediction fetch failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                warn!(
                    match_id,
                    attempts = attempt + 1,
                    status = ?e.status(),
                    error = %e,
                    "Prediction fetch failed"
                );
                metrics::API_FAILURES_TOTAL.inc();
                break Err(e);
            }
        }
    };

    metrics::observe_fetch_duration_ms(started.elapsed().as_secs_f64() * 1000.0);
    result
}
