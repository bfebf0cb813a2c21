// tests/cache_invariants.rs
// Bounded size, eviction order, error exclusion and the schema gate,
// exercised over both the in-memory and sqlite backends.

use faceit_predictor::cache::{keys, CacheConfig, PredictionCache, PutOutcome, STORAGE_VERSION};
use faceit_predictor::codec::CompressionCodec;
use faceit_predictor::models::Prediction;
use faceit_predictor::storage::{SqliteStore, StorageAdapter};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;

fn prediction(map: &str, win: f64) -> Prediction {
    Prediction::with_maps([(map, (1.0 - win, win))])
}

fn sqlite_adapter(dir: &TempDir) -> StorageAdapter {
    let store = SqliteStore::open(&dir.path().join("storage.db")).expect("open sqlite store");
    StorageAdapter::new(Arc::new(store))
}

async fn backends() -> Vec<(&'static str, StorageAdapter, Option<TempDir>)> {
    let dir = tempfile::tempdir().expect("tempdir");
    let sqlite = sqlite_adapter(&dir);
    vec![
        ("memory", StorageAdapter::in_memory(), None),
        ("sqlite", sqlite, Some(dir)),
    ]
}

#[tokio::test]
async fn bounded_size_and_lockstep_structures() {
    for (name, storage, _dir) in backends().await {
        let cache = PredictionCache::open(storage, CacheConfig::default()).await;
        for i in 0..25 {
            cache.put(&format!("m{}", i % 13), &prediction("de_mirage", 0.5)).await;
            let snapshot = cache.snapshot().await;
            assert!(snapshot.len() <= 10, "{name}: size {}", snapshot.len());
            assert!(snapshot.is_consistent(), "{name}: orphans after put {i}");
        }
    }
}

#[tokio::test]
async fn oldest_entry_is_evicted_first() {
    for (name, storage, _dir) in backends().await {
        let cache = PredictionCache::open(storage, CacheConfig::default()).await;
        for i in (1..=10).rev() {
            // m10 oldest ... m1 newest
            cache.put(&format!("m{}", i), &prediction("de_nuke", 0.6)).await;
        }
        let before = cache.snapshot().await;
        assert_eq!(before.order.first().map(String::as_str), Some("m1"));
        assert_eq!(before.order.last().map(String::as_str), Some("m10"));

        let outcome = cache.put("m11", &prediction("de_nuke", 0.7)).await;
        assert_eq!(outcome, PutOutcome::Stored { evicted: vec!["m10".to_string()] }, "{name}");

        let after = cache.snapshot().await;
        assert_eq!(after.order[0], "m11");
        assert!(!after.order.contains(&"m10".to_string()));
        assert!(!after.entries.contains_key("m10"));
        assert_eq!(&after.order[1..], &before.order[..9]);
        assert!(cache.get("m10").await.is_none());
        assert!(cache.get("m11").await.is_some());
    }
}

#[tokio::test]
async fn error_predictions_never_cached() {
    for (name, storage, _dir) in backends().await {
        let cache = PredictionCache::open(storage, CacheConfig::default()).await;
        cache.put("m1", &prediction("de_dust2", 0.4)).await;
        let before = cache.snapshot().await;

        let outcome = cache.put("m2", &Prediction::from_error("Match not found")).await;
        assert_eq!(outcome, PutOutcome::SkippedError, "{name}");
        assert_eq!(cache.snapshot().await, before);
        assert!(cache.get("m2").await.is_none());
    }
}

#[tokio::test]
async fn schema_gate_wipes_stale_data() {
    let dir = tempfile::tempdir().unwrap();
    let old = CacheConfig {
        storage_version: "1.0.0.23".to_string(),
        ..Default::default()
    };
    {
        let cache = PredictionCache::open(sqlite_adapter(&dir), old).await;
        cache.put("m1", &prediction("de_train", 0.55)).await;
        assert!(cache.get("m1").await.is_some());
    }

    // reopen the same file with the current version
    let storage = sqlite_adapter(&dir);
    let cache = PredictionCache::open(storage.clone(), CacheConfig::default()).await;
    assert!(cache.get("m1").await.is_none());

    let stored = storage.get(&[keys::STORAGE_CLEARED, keys::MATCHES]).await;
    assert_eq!(stored.get(keys::STORAGE_CLEARED), Some(&Value::from(STORAGE_VERSION)));
    assert!(!stored.contains_key(keys::MATCHES));

    // current marker: nothing is wiped on the next start
    cache.put("m2", &prediction("de_train", 0.55)).await;
    let cache = PredictionCache::open(sqlite_adapter(&dir), CacheConfig::default()).await;
    assert!(cache.get("m2").await.is_some());
}

#[tokio::test]
async fn corrupt_blob_reads_as_miss_and_put_leaves_it() {
    let storage = StorageAdapter::in_memory();
    let cache = PredictionCache::open(storage.clone(), CacheConfig::default()).await;
    storage
        .set_one(keys::MATCHES, Value::String("%%% not base64 %%%".into()))
        .await
        .unwrap();

    assert!(cache.get("m1").await.is_none());
    assert_eq!(cache.put("m1", &prediction("de_anubis", 0.5)).await, PutOutcome::Failed);
    let raw = storage.get(&[keys::MATCHES]).await;
    assert_eq!(raw.get(keys::MATCHES), Some(&Value::String("%%% not base64 %%%".into())));
}

#[tokio::test]
async fn entries_are_stored_compressed() {
    let storage = StorageAdapter::in_memory();
    let cache = PredictionCache::open(storage.clone(), CacheConfig::default()).await;
    cache.put("m1", &prediction("de_inferno", 0.42)).await;

    let raw = storage.get(&[keys::MATCHES, keys::MATCH_PREDICTION_ORDER]).await;
    let blob = raw[keys::MATCHES].as_str().expect("compressed string");
    let json = CompressionCodec::default().decompress(blob).unwrap();
    assert!(json.contains("de_inferno"));
    assert_eq!(raw[keys::MATCH_PREDICTION_ORDER], serde_json::json!(["m1"]));
}
