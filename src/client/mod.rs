// src/client/mod.rs
// Prediction backend client: one-shot HTTP fetch plus bounded retry.

pub mod http_client;
pub mod retry;

pub use http_client::{ApiClientConfig, PredictionApiClient, DEFAULT_BASE_URL};
pub use retry::{fetch_with_retry, RetryPolicy};

use crate::models::Prediction;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("prediction backend returned HTTP {status}")]
    Http { status: u16 },
    #[error("request to prediction backend failed: {0}")]
    Network(String),
    #[error("invalid prediction response: {0}")]
    InvalidResponse(String),
    #[error("client configuration error: {0}")]
    Config(String),
}

impl ApiError {
    /// HTTP status of a non-2xx response, if that is what failed.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status } => Some(*status),
            _ => None,
        }
    }

    /// Every failure is retried, client errors included.
    pub fn is_retryable(&self) -> bool {
        true
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            ApiError::Http {
                status: status.as_u16(),
            }
        } else if e.is_decode() {
            ApiError::InvalidResponse(e.to_string())
        } else {
            ApiError::Network(e.to_string())
        }
    }
}

/// Anything that can produce a prediction for a match/player pair in one attempt.
#[async_trait::async_trait]
pub trait PredictionSource: Send + Sync {
    async fn fetch_prediction(&self, match_id: &str, nickname: &str) -> Result<Prediction, ApiError>;
    fn source_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_only_for_http_errors() {
        assert_eq!(ApiError::Http { status: 503 }.status(), Some(503));
        assert_eq!(ApiError::Network("reset".into()).status(), None);
    }

    #[test]
    fn test_all_errors_retryable() {
        assert!(ApiError::Http { status: 404 }.is_retryable());
        assert!(ApiError::InvalidResponse("eof".into()).is_retryable());
    }

    #[test]
    fn test_display_carries_status() {
        let e = ApiError::Http { status: 500 };
        assert!(e.to_string().contains("500"));
    }
}
