//! Key/value storage behind the prediction cache and the extension settings.
//!
//! A single `KeyValueStore` implementation is chosen at startup from
//! `StorageConfig` and wrapped in a `StorageAdapter`, which gives every caller
//! the same `get` / `set` / change-stream surface regardless of backend.

pub mod memory;
pub mod redis_store;
pub mod sqlite_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use sqlite_store::SqliteStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("deserialization error for key {key}: {reason}")]
    Deserialization { key: String, reason: String },
    #[error("storage connection failed: {0}")]
    Connection(String),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns the subset of `keys` that exist.
    async fn get(&self, keys: &[&str]) -> StorageResult<HashMap<String, Value>>;
    async fn set(&self, items: HashMap<String, Value>) -> StorageResult<()>;
    async fn remove(&self, keys: &[&str]) -> StorageResult<()>;
    fn backend_name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Sqlite,
    Redis,
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" => Ok(StorageBackend::Sqlite),
            "redis" => Ok(StorageBackend::Redis),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(format!("Unknown storage backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub sqlite_path: PathBuf,
    pub redis_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            sqlite_path: default_sqlite_path(),
            redis_url: "redis://127.0.0.1:6379/".to_string(),
        }
    }
}

pub fn default_sqlite_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("faceit-predictor")
        .join("storage.db")
}

/// Emitted after a successful write; `new_value` is `None` for removals.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageChange {
    pub key: String,
    pub new_value: Option<Value>,
}

const CHANGE_CHANNEL_CAPACITY: usize = 64;

#[derive(Clone)]
pub struct StorageAdapter {
    store: Arc<dyn KeyValueStore>,
    changes: broadcast::Sender<StorageChange>,
}

impl StorageAdapter {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self { store, changes }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Open the configured backend.
    pub async fn open(config: &StorageConfig) -> StorageResult<Self> {
        let store: Arc<dyn KeyValueStore> = match config.backend {
            StorageBackend::Sqlite => Arc::new(SqliteStore::open(&config.sqlite_path)?),
            StorageBackend::Redis => Arc::new(RedisStore::connect(&config.redis_url).await?),
            StorageBackend::Memory => Arc::new(MemoryStore::new()),
        };
        info!(backend = store.backend_name(), "Storage adapter ready");
        Ok(Self::new(store))
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Never fails: a backend error reads as "no keys present".
    pub async fn get(&self, keys: &[&str]) -> HashMap<String, Value> {
        match self.store.get(keys).await {
            Ok(items) => items,
            Err(e) => {
                warn!(backend = self.backend_name(), error = %e, "Storage read failed");
                HashMap::new()
            }
        }
    }

    pub async fn try_get(&self, keys: &[&str]) -> StorageResult<HashMap<String, Value>> {
        self.store.get(keys).await
    }

    pub async fn set(&self, items: HashMap<String, Value>) -> StorageResult<()> {
        let events: Vec<StorageChange> = items
            .iter()
            .map(|(key, value)| StorageChange {
                key: key.clone(),
                new_value: Some(value.clone()),
            })
            .collect();
        self.store.set(items).await?;
        self.publish(events);
        Ok(())
    }

    pub async fn set_one(&self, key: &str, value: Value) -> StorageResult<()> {
        let mut items = HashMap::with_capacity(1);
        items.insert(key.to_string(), value);
        self.set(items).await
    }

    pub async fn remove(&self, keys: &[&str]) -> StorageResult<()> {
        self.store.remove(keys).await?;
        self.publish(
            keys.iter()
                .map(|key| StorageChange {
                    key: key.to_string(),
                    new_value: None,
                })
                .collect(),
        );
        Ok(())
    }

    /// Change stream for every write made through this adapter (and its clones).
    pub fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }

    fn publish(&self, events: Vec<StorageChange>) {
        for event in events {
            // no receivers is fine
            let _ = self.changes.send(event);
        }
    }
}
