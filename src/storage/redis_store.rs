// src/storage/redis_store.rs
// Redis-backed key/value store; each key holds the JSON text of its value

use super::{KeyValueStore, StorageError, StorageResult};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{error, info};

fn redis_err(e: redis::RedisError) -> StorageError {
    StorageError::Backend(e.to_string())
}

#[derive(Clone)]
pub struct RedisStore {
    client: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> StorageResult<Self> {
        let client = redis::Client::open(redis_url).map_err(|e| {
            error!("Failed to open Redis client: {}", e);
            StorageError::Connection(e.to_string())
        })?;
        let manager = ConnectionManager::new(client).await.map_err(|e| {
            error!("Failed to create Redis connection manager: {}", e);
            StorageError::Connection(e.to_string())
        })?;
        info!("Redis storage connected at {}", redis_url);
        Ok(Self { client: manager })
    }

    pub async fn health_check(&self) -> StorageResult<String> {
        let mut conn = self.client.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(redis_err)
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, keys: &[&str]) -> StorageResult<HashMap<String, Value>> {
        let mut found = HashMap::new();
        if keys.is_empty() {
            return Ok(found);
        }

        let mut conn = self.client.clone();
        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(keys.to_vec())
            .query_async(&mut conn)
            .await
            .map_err(redis_err)?;

        for (key, raw) in keys.iter().zip(values) {
            if let Some(json) = raw {
                let value = serde_json::from_str(&json).map_err(|e| {
                    StorageError::Deserialization {
                        key: key.to_string(),
                        reason: e.to_string(),
                    }
                })?;
                found.insert(key.to_string(), value);
            }
        }
        Ok(found)
    }

    async fn set(&self, items: HashMap<String, Value>) -> StorageResult<()> {
        if items.is_empty() {
            return Ok(());
        }

        let mut pairs = Vec::with_capacity(items.len());
        for (key, value) in items {
            let json = serde_json::to_string(&value)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            pairs.push((key, json));
        }

        // MSET applies all pairs atomically
        let mut conn = self.client.clone();
        conn.mset::<_, _, ()>(pairs.as_slice()).await.map_err(redis_err)
    }

    async fn remove(&self, keys: &[&str]) -> StorageResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.client.clone();
        conn.del::<_, ()>(keys.to_vec()).await.map_err(redis_err)
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
