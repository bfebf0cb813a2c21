//! SQLite-backed key/value store.
//!
//! Every key holds one JSON blob. A multi-key `set` runs in a single
//! transaction, so the cache mapping and its order are written together.
//! rusqlite is blocking; calls are moved onto the blocking pool.

use super::{KeyValueStore, StorageError, StorageResult};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

fn db_err(e: rusqlite::Error) -> StorageError {
    StorageError::Backend(e.to_string())
}

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StorageError::Connection(format!("{}: {}", parent.display(), e))
                })?;
            }
        }
        let conn = Connection::open(path)
            .map_err(|e| StorageError::Connection(format!("{}: {}", path.display(), e)))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        init_table(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StorageResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            f(&mut *guard)
        })
        .await
        .map_err(|e| StorageError::Backend(format!("sqlite task failed: {}", e)))?
    }
}

/// Initialize the kv_store table if it doesn't exist.
fn init_table(conn: &Connection) -> StorageResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS kv_store (
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL,
            updated_at TEXT DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )
    .map_err(db_err)?;
    Ok(())
}

fn load(conn: &Connection, key: &str) -> StorageResult<Option<Value>> {
    let json: Option<String> = conn
        .query_row(
            "SELECT value_json FROM kv_store WHERE key = ?1",
            [key],
            |row| row.get(0),
        )
        .optional()
        .map_err(db_err)?;

    match json {
        Some(json_str) => serde_json::from_str(&json_str)
            .map(Some)
            .map_err(|e| StorageError::Deserialization {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        None => Ok(None),
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, keys: &[&str]) -> StorageResult<HashMap<String, Value>> {
        let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        self.with_conn(move |conn| {
            let mut found = HashMap::new();
            for key in keys {
                if let Some(value) = load(conn, &key)? {
                    found.insert(key, value);
                }
            }
            Ok(found)
        })
        .await
    }

    async fn set(&self, items: HashMap<String, Value>) -> StorageResult<()> {
        let mut rows = Vec::with_capacity(items.len());
        for (key, value) in items {
            let json = serde_json::to_string(&value)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            rows.push((key, json));
        }

        self.with_conn(move |conn| {
            let now = Utc::now().to_rfc3339();
            let tx = conn.transaction().map_err(db_err)?;
            for (key, json) in &rows {
                tx.execute(
                    "INSERT INTO kv_store (key, value_json, updated_at)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET
                        value_json = excluded.value_json,
                        updated_at = excluded.updated_at",
                    params![key, json, now],
                )
                .map_err(db_err)?;
            }
            tx.commit().map_err(db_err)
        })
        .await
    }

    async fn remove(&self, keys: &[&str]) -> StorageResult<()> {
        let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        self.with_conn(move |conn| {
            let tx = conn.transaction().map_err(db_err)?;
            for key in &keys {
                tx.execute("DELETE FROM kv_store WHERE key = ?1", [key])
                    .map_err(db_err)?;
            }
            tx.commit().map_err(db_err)
        })
        .await
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}
