//! Prediction cache
//!
//! Layout in the key/value store:
//! - `MATCHES`: compressed JSON object `match_id -> Prediction`
//! - `MATCH_PREDICTION_ORDER`: JSON array of match ids, most recent first
//! - `STORAGE_CLEARED`: schema version marker
//!
//! The order array is the only source of eviction order and always names
//! exactly the ids present in the mapping. Reads never promote an entry.
//! There is no locking across concurrent `put` calls; two interleaved writers
//! can lose one update (see `MatchDataService::get_match_data_guarded`).

use super::{keys, CacheConfig, CacheError, CacheResult, CacheStats};
use crate::codec::CompressionCodec;
use crate::models::Prediction;
use crate::monitoring::metrics;
use crate::storage::StorageAdapter;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheSnapshot {
    pub entries: HashMap<String, Prediction>,
    pub order: Vec<String>,
}

impl CacheSnapshot {
    /// Collapse duplicate ids and drop ids/entries without a counterpart.
    fn normalize(&mut self) -> bool {
        let before = (self.order.len(), self.entries.len());
        let mut seen = HashSet::with_capacity(self.order.len());
        let entries = &self.entries;
        self.order
            .retain(|id| entries.contains_key(id) && seen.insert(id.clone()));
        self.entries.retain(|id, _| seen.contains(id));
        before != (self.order.len(), self.entries.len())
    }

    /// Order ids and mapping keys are the same set, without duplicates.
    pub fn is_consistent(&self) -> bool {
        let ids: HashSet<&String> = self.order.iter().collect();
        ids.len() == self.order.len()
            && ids.len() == self.entries.len()
            && ids.iter().all(|id| self.entries.contains_key(*id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutOutcome {
    Stored { evicted: Vec<String> },
    /// The prediction carried an error and was not persisted.
    SkippedError,
    /// Read, encode or write failed; the stored cache is unchanged.
    Failed,
}

pub struct PredictionCache {
    storage: StorageAdapter,
    codec: CompressionCodec,
    config: CacheConfig,
    stats: Mutex<CacheStats>,
}

impl PredictionCache {
    pub fn new(storage: StorageAdapter, config: CacheConfig) -> Self {
        Self {
            storage,
            codec: CompressionCodec::default(),
            config,
            stats: Mutex::new(CacheStats::default()),
        }
    }

    pub fn with_codec(mut self, codec: CompressionCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Build the cache and run the schema gate once, before any read or write.
    pub async fn open(storage: StorageAdapter, config: CacheConfig) -> Self {
        let cache = Self::new(storage, config);
        cache.ensure_schema_current().await;
        cache
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.lock().clone()
    }

    fn max_items(&self) -> usize {
        self.config.max_items.max(1)
    }

    /// Wipes the cached entries and order when the stored version marker is
    /// missing or differs, then writes the current marker. Returns whether a
    /// wipe happened.
    pub async fn ensure_schema_current(&self) -> bool {
        match self.try_ensure_schema_current().await {
            Ok(wiped) => wiped,
            Err(e) => {
                warn!(error = %e, "Prediction cache schema check failed");
                self.stats.lock().faults += 1;
                false
            }
        }
    }

    async fn try_ensure_schema_current(&self) -> CacheResult<bool> {
        let expected = self.config.storage_version.as_str();
        let stored = self.storage.try_get(&[keys::STORAGE_CLEARED]).await?;
        let current = stored.get(keys::STORAGE_CLEARED).and_then(Value::as_str);

        if current == Some(expected) {
            debug!(version = expected, "Prediction cache schema is current");
            return Ok(false);
        }

        self.storage
            .remove(&[keys::MATCHES, keys::MATCH_PREDICTION_ORDER])
            .await?;
        self.storage
            .set_one(keys::STORAGE_CLEARED, Value::String(expected.to_string()))
            .await?;
        info!(
            previous = current.unwrap_or("<none>"),
            current = expected,
            "Prediction cache wiped for new storage version"
        );
        Ok(true)
    }

    /// Cached prediction for `match_id`; any storage or decode fault is a miss.
    pub async fn get(&self, match_id: &str) -> Option<Prediction> {
        let found = match self.try_get(match_id).await {
            Ok(found) => found,
            Err(e) => {
                warn!(match_id, error = %e, "Error reading cached prediction");
                self.stats.lock().faults += 1;
                None
            }
        };

        let mut stats = self.stats.lock();
        if found.is_some() {
            stats.hits += 1;
            metrics::CACHE_HITS_TOTAL.inc();
        } else {
            stats.misses += 1;
            metrics::CACHE_MISSES_TOTAL.inc();
        }
        found
    }

    async fn try_get(&self, match_id: &str) -> CacheResult<Option<Prediction>> {
        let mut envelope = self.load_envelope().await?;
        Ok(envelope.entries.remove(match_id))
    }

    /// Insert `prediction` as the most recent entry, evicting from the tail
    /// when the cache is full. Error-carrying predictions are never stored.
    pub async fn put(&self, match_id: &str, prediction: &Prediction) -> PutOutcome {
        if prediction.is_error() {
            debug!(match_id, "Not caching error prediction");
            self.stats.lock().skipped_writes += 1;
            return PutOutcome::SkippedError;
        }

        match self.try_put(match_id, prediction).await {
            Ok(evicted) => {
                if !evicted.is_empty() {
                    self.stats.lock().evictions += evicted.len() as u64;
                    metrics::CACHE_EVICTIONS_TOTAL.inc_by(evicted.len() as u64);
                }
                PutOutcome::Stored { evicted }
            }
            Err(e) => {
                warn!(match_id, error = %e, "Error caching prediction");
                self.stats.lock().faults += 1;
                PutOutcome::Failed
            }
        }
    }

    async fn try_put(&self, match_id: &str, prediction: &Prediction) -> CacheResult<Vec<String>> {
        let mut envelope = self.load_envelope().await?;

        // a re-inserted id moves to the front instead of occupying two slots
        envelope.order.retain(|id| id != match_id);

        let mut evicted = Vec::new();
        while envelope.order.len() >= self.max_items() {
            match envelope.order.pop() {
                Some(oldest) => {
                    envelope.entries.remove(&oldest);
                    evicted.push(oldest);
                }
                None => break,
            }
        }

        envelope
            .entries
            .insert(match_id.to_string(), prediction.clone());
        envelope.order.insert(0, match_id.to_string());

        self.store_envelope(&envelope).await?;
        metrics::CACHE_SIZE.set(envelope.order.len() as i64);
        debug!(match_id, size = envelope.order.len(), ?evicted, "Cached prediction");
        Ok(evicted)
    }

    /// Current entries and order; empty when the stored envelope is unreadable.
    pub async fn snapshot(&self) -> CacheSnapshot {
        match self.load_envelope().await {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "Error reading prediction cache envelope");
                CacheSnapshot::default()
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.snapshot().await.len()
    }

    /// Drop every cached prediction; the version marker is kept.
    pub async fn clear(&self) -> CacheResult<()> {
        self.storage
            .remove(&[keys::MATCHES, keys::MATCH_PREDICTION_ORDER])
            .await?;
        metrics::CACHE_SIZE.set(0);
        info!("Prediction cache cleared");
        Ok(())
    }

    async fn load_envelope(&self) -> CacheResult<CacheSnapshot> {
        let items = self
            .storage
            .try_get(&[keys::MATCHES, keys::MATCH_PREDICTION_ORDER])
            .await?;

        let mut envelope = CacheSnapshot {
            entries: self.decode_entries(items.get(keys::MATCHES))?,
            order: decode_order(items.get(keys::MATCH_PREDICTION_ORDER))?,
        };
        if envelope.normalize() {
            debug!(size = envelope.order.len(), "Repaired inconsistent prediction cache envelope");
        }
        Ok(envelope)
    }

    fn decode_entries(&self, raw: Option<&Value>) -> CacheResult<HashMap<String, Prediction>> {
        match raw {
            None | Some(Value::Null) => Ok(HashMap::new()),
            Some(Value::String(blob)) => {
                let json = self.codec.decompress(blob)?;
                serde_json::from_str(&json)
                    .map_err(|e| CacheError::Envelope(format!("entries: {}", e)))
            }
            Some(other) => Err(CacheError::Envelope(format!(
                "entries: expected compressed string, found {}",
                json_kind(other)
            ))),
        }
    }

    async fn store_envelope(&self, envelope: &CacheSnapshot) -> CacheResult<()> {
        let json = serde_json::to_string(&envelope.entries)
            .map_err(|e| CacheError::Envelope(format!("entries: {}", e)))?;
        let compressed = self.codec.compress(&json)?;

        let mut items = HashMap::with_capacity(2);
        items.insert(keys::MATCHES.to_string(), Value::String(compressed));
        items.insert(
            keys::MATCH_PREDICTION_ORDER.to_string(),
            Value::from(envelope.order.clone()),
        );
        self.storage.set(items).await?;
        Ok(())
    }
}

/// Accepts the order as a JSON array or as JSON text of one.
fn decode_order(raw: Option<&Value>) -> CacheResult<Vec<String>> {
    match raw {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(text)) => serde_json::from_str(text)
            .map_err(|e| CacheError::Envelope(format!("order: {}", e))),
        Some(value @ Value::Array(_)) => serde_json::from_value(value.clone())
            .map_err(|e| CacheError::Envelope(format!("order: {}", e))),
        Some(other) => Err(CacheError::Envelope(format!(
            "order: expected array, found {}",
            json_kind(other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::STORAGE_VERSION;
    use serde_json::json;

    fn prediction(win: f64) -> Prediction {
        Prediction::with_maps([("de_mirage", (1.0 - win, win))])
    }

    async fn fresh_cache(max_items: usize) -> PredictionCache {
        PredictionCache::open(StorageAdapter::in_memory(), CacheConfig::with_max_items(max_items)).await
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let cache = fresh_cache(10).await;
        assert_eq!(cache.put("m1", &prediction(0.6)).await, PutOutcome::Stored { evicted: vec![] });
        assert_eq!(cache.get("m1").await, Some(prediction(0.6)));
        assert_eq!(cache.get("m2").await, None);

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
    }

    #[tokio::test]
    async fn test_get_does_not_promote() {
        let cache = fresh_cache(2).await;
        cache.put("m1", &prediction(0.1)).await;
        cache.put("m2", &prediction(0.2)).await;
        assert!(cache.get("m1").await.is_some());

        // m1 is still the oldest by insertion
        let outcome = cache.put("m3", &prediction(0.3)).await;
        assert_eq!(outcome, PutOutcome::Stored { evicted: vec!["m1".to_string()] });
        assert_eq!(cache.snapshot().await.order, vec!["m3", "m2"]);
    }

    #[tokio::test]
    async fn test_reinsert_moves_to_front_without_eviction() {
        let cache = fresh_cache(3).await;
        for id in ["m1", "m2", "m3"] {
            cache.put(id, &prediction(0.5)).await;
        }

        let outcome = cache.put("m1", &prediction(0.9)).await;
        assert_eq!(outcome, PutOutcome::Stored { evicted: vec![] });

        let snapshot = cache.snapshot().await;
        assert_eq!(snapshot.order, vec!["m1", "m3", "m2"]);
        assert_eq!(snapshot.entries["m1"], prediction(0.9));
        assert!(snapshot.is_consistent());
    }

    #[tokio::test]
    async fn test_error_prediction_is_not_stored() {
        let cache = fresh_cache(10).await;
        cache.put("m1", &prediction(0.5)).await;
        let before = cache.snapshot().await;

        let outcome = cache.put("m2", &Prediction::from_error("x")).await;
        assert_eq!(outcome, PutOutcome::SkippedError);
        assert_eq!(cache.snapshot().await, before);
        assert_eq!(cache.stats().skipped_writes, 1);
    }

    #[tokio::test]
    async fn test_corrupt_blob_reads_as_miss() {
        let storage = StorageAdapter::in_memory();
        let cache = PredictionCache::open(storage.clone(), CacheConfig::default()).await;
        storage
            .set_one(keys::MATCHES, json!("definitely not compressed"))
            .await
            .unwrap();

        assert_eq!(cache.get("m1").await, None);
        assert_eq!(cache.stats().faults, 1);
    }

    #[tokio::test]
    async fn test_failed_put_leaves_storage_untouched() {
        let storage = StorageAdapter::in_memory();
        let cache = PredictionCache::open(storage.clone(), CacheConfig::default()).await;
        storage.set_one(keys::MATCHES, json!(42)).await.unwrap();

        assert_eq!(cache.put("m1", &prediction(0.5)).await, PutOutcome::Failed);
        let raw = storage.get(&[keys::MATCHES, keys::MATCH_PREDICTION_ORDER]).await;
        assert_eq!(raw[keys::MATCHES], json!(42));
        assert!(!raw.contains_key(keys::MATCH_PREDICTION_ORDER));
    }

    #[tokio::test]
    async fn test_legacy_duplicate_order_is_repaired() {
        let storage = StorageAdapter::in_memory();
        let cache = PredictionCache::open(storage.clone(), CacheConfig::with_max_items(3)).await;
        cache.put("m1", &prediction(0.1)).await;
        cache.put("m2", &prediction(0.2)).await;

        // duplicate and orphan ids, order stored as JSON text
        storage
            .set_one(
                keys::MATCH_PREDICTION_ORDER,
                json!("[\"m2\",\"m1\",\"m2\",\"ghost\"]"),
            )
            .await
            .unwrap();

        let snapshot = cache.snapshot().await;
        assert_eq!(snapshot.order, vec!["m2", "m1"]);
        assert!(snapshot.is_consistent());

        cache.put("m3", &prediction(0.3)).await;
        cache.put("m4", &prediction(0.4)).await;
        let snapshot = cache.snapshot().await;
        assert_eq!(snapshot.order, vec!["m4", "m3", "m2"]);
        assert!(snapshot.is_consistent());
    }

    #[tokio::test]
    async fn test_entry_missing_from_order_is_a_miss() {
        let storage = StorageAdapter::in_memory();
        let cache = PredictionCache::open(storage.clone(), CacheConfig::default()).await;
        cache.put("m1", &prediction(0.1)).await;
        cache.put("m2", &prediction(0.2)).await;

        storage
            .set_one(keys::MATCH_PREDICTION_ORDER, json!(["m2"]))
            .await
            .unwrap();

        assert_eq!(cache.get("m1").await, None);
        assert_eq!(cache.get("m2").await, Some(prediction(0.2)));
        assert!(!cache.snapshot().await.entries.contains_key("m1"));
    }

    #[tokio::test]
    async fn test_lowered_bound_evicts_down_to_fit() {
        let storage = StorageAdapter::in_memory();
        let big = PredictionCache::open(storage.clone(), CacheConfig::with_max_items(5)).await;
        for id in ["m1", "m2", "m3", "m4", "m5"] {
            big.put(id, &prediction(0.5)).await;
        }

        let small = PredictionCache::new(storage, CacheConfig::with_max_items(2));
        let outcome = small.put("m6", &prediction(0.5)).await;
        assert_eq!(
            outcome,
            PutOutcome::Stored {
                evicted: vec!["m1".into(), "m2".into(), "m3".into(), "m4".into()]
            }
        );
        assert_eq!(small.snapshot().await.order, vec!["m6", "m5"]);
    }

    #[tokio::test]
    async fn test_schema_gate() {
        let storage = StorageAdapter::in_memory();
        let old = PredictionCache::open(
            storage.clone(),
            CacheConfig {
                max_items: 10,
                storage_version: "1.0.0.23".into(),
            },
        )
        .await;
        old.put("m1", &prediction(0.5)).await;

        let cache = PredictionCache::new(storage.clone(), CacheConfig::default());
        assert!(cache.ensure_schema_current().await);
        assert_eq!(cache.get("m1").await, None);
        assert!(cache.snapshot().await.is_empty());

        let marker = storage.get(&[keys::STORAGE_CLEARED]).await;
        assert_eq!(marker[keys::STORAGE_CLEARED], json!(STORAGE_VERSION));

        // second run is a no-op
        cache.put("m2", &prediction(0.5)).await;
        assert!(!cache.ensure_schema_current().await);
        assert!(cache.get("m2").await.is_some());
    }

    #[tokio::test]
    async fn test_clear_keeps_marker() {
        let storage = StorageAdapter::in_memory();
        let cache = PredictionCache::open(storage.clone(), CacheConfig::default()).await;
        cache.put("m1", &prediction(0.5)).await;
        cache.clear().await.unwrap();

        assert_eq!(cache.len().await, 0);
        assert!(!storage.get(&[keys::STORAGE_CLEARED]).await.is_empty());
    }
}
