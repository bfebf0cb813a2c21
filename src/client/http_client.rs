// src/client/http_client.rs
// HTTP prediction source backed by a pooled reqwest client

use super::{ApiError, PredictionSource};
use crate::models::Prediction;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://faceit-cs2-predictor.brkovic.dev";
pub const NICKNAME_HEADER: &str = "Faceit-Player-Nickname";

#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    pub base_url: String,
    pub secret_key: String,
    /// Per-attempt request timeout
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            secret_key: String::new(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

pub struct PredictionApiClient {
    base_url: String,
    secret_key: String,
    client: reqwest::Client,
}

impl PredictionApiClient {
    pub fn new(config: &ApiClientConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn match_url(&self, match_id: &str) -> String {
        format!("{}/match/{}", self.base_url, match_id)
    }
}

#[async_trait::async_trait]
impl PredictionSource for PredictionApiClient {
    async fn fetch_prediction(&self, match_id: &str, nickname: &str) -> Result<Prediction, ApiError> {
        let url = self.match_url(match_id);
        debug!(match_id, nickname, url = %url, "Fetching prediction");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.secret_key)
            .header(NICKNAME_HEADER, nickname)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Http {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    fn source_name(&self) -> &str {
        &self.base_url
    }
}
