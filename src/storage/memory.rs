// src/storage/memory.rs
// Process-local store for tests and ephemeral runs

use super::{KeyValueStore, StorageResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, keys: &[&str]) -> StorageResult<HashMap<String, Value>> {
        let items = self.items.read();
        Ok(keys
            .iter()
            .filter_map(|key| items.get(*key).map(|v| (key.to_string(), v.clone())))
            .collect())
    }

    async fn set(&self, items: HashMap<String, Value>) -> StorageResult<()> {
        self.items.write().extend(items);
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> StorageResult<()> {
        let mut items = self.items.write();
        for key in keys {
            items.remove(*key);
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_remove() {
        let store = MemoryStore::new();
        let mut items = HashMap::new();
        items.insert("k1".to_string(), json!("v1"));
        items.insert("k2".to_string(), json!([1, 2]));
        store.set(items).await.unwrap();
        assert_eq!(store.len(), 2);

        store.remove(&["k1", "missing"]).await.unwrap();
        let got = store.get(&["k1", "k2"]).await.unwrap();
        assert!(!got.contains_key("k1"));
        assert_eq!(got["k2"], json!([1, 2]));
    }
}
