// src/orchestrator.rs
// Cache-first retrieval: cache hit, otherwise fetch with retry and store

use crate::cache::PredictionCache;
use crate::client::{fetch_with_retry, ApiError, PredictionSource, RetryPolicy};
use crate::models::Prediction;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

pub const PREDICTIONS_NOT_SUPPORTED: &str =
    "Calculating match predictions for finished matches is not supported yet";

pub struct MatchDataService {
    cache: Arc<PredictionCache>,
    source: Arc<dyn PredictionSource>,
    retry: RetryPolicy,
    finished_matches_enabled: bool,
    in_flight: InFlightMap,
}

impl MatchDataService {
    pub fn new(cache: Arc<PredictionCache>, source: Arc<dyn PredictionSource>, retry: RetryPolicy) -> Self {
        Self {
            cache,
            source,
            retry,
            finished_matches_enabled: false,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_finished_matches(mut self, enabled: bool) -> Self {
        self.finished_matches_enabled = enabled;
        self
    }

    pub fn cache(&self) -> &Arc<PredictionCache> {
        &self.cache
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// A cached prediction is returned as is, with no staleness check. On a
    /// miss the fetched prediction is stored (errors excluded by the cache)
    /// and returned. Only a fully failed fetch is an `Err`.
    pub async fn get_match_data(&self, match_id: &str, nickname: &str) -> Result<Prediction, ApiError> {
        if let Some(cached) = self.cache.get(match_id).await {
            debug!(match_id, "Serving cached prediction");
            return Ok(cached);
        }

        let prediction = fetch_with_retry(self.source.as_ref(), match_id, nickname, &self.retry).await?;
        self.cache.put(match_id, &prediction).await;
        info!(
            match_id,
            source = self.source.source_name(),
            error = prediction.is_error(),
            "Fetched prediction"
        );
        Ok(prediction)
    }

    /// Same as [`get_match_data`](Self::get_match_data), but concurrent calls
    /// for one match id run one at a time, so later callers hit the cache.
    pub async fn get_match_data_guarded(&self, match_id: &str, nickname: &str) -> Result<Prediction, ApiError> {
        let slot = InFlightSlot::acquire(&self.in_flight, match_id);
        let _turn = slot.lock.lock().await;
        self.get_match_data(match_id, nickname).await
    }

    /// Entry point for a matchroom page. Finished matches are answered with an
    /// error prediction without fetching unless enabled in configuration.
    pub async fn load_match(&self, match_id: &str, nickname: &str, finished: bool) -> Result<Prediction, ApiError> {
        if finished && !self.finished_matches_enabled {
            debug!(match_id, "Skipping prediction for finished match");
            return Ok(Prediction::from_error(PREDICTIONS_NOT_SUPPORTED));
        }
        self.get_match_data_guarded(match_id, nickname).await
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.lock().len()
    }
}

type InFlightMap = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// Holds one caller's share of a per-match lock. The map entry goes away with
/// the last holder, including when the request future is dropped mid-fetch.
struct InFlightSlot<'a> {
    map: &'a InFlightMap,
    match_id: &'a str,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl<'a> InFlightSlot<'a> {
    fn acquire(map: &'a InFlightMap, match_id: &'a str) -> Self {
        let lock = map.lock().entry(match_id.to_string()).or_default().clone();
        Self { map, match_id, lock }
    }
}

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        let mut map = self.map.lock();
        // one reference in the map, one here
        if Arc::strong_count(&self.lock) == 2 {
            map.remove(self.match_id);
        }
    }
}
