// src/cache/mod.rs
// Bounded, insertion-ordered prediction cache persisted through the storage adapter

pub mod prediction_cache;
pub use prediction_cache::{CacheSnapshot, PredictionCache, PutOutcome};

use crate::codec::CodecError;
use crate::storage::StorageError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bump to discard every cached prediction on the next startup.
pub const STORAGE_VERSION: &str = "1.0.0.24";
pub const DEFAULT_MAX_CACHED_ITEMS: usize = 10;

pub mod keys {
    pub const MATCHES: &str = "faceit_cs2_predictor_matches";
    pub const MATCH_PREDICTION_ORDER: &str = "faceit_cs2_predictor_match_prediction_order";
    pub const STORAGE_CLEARED: &str = "faceit_cs2_predictor_storage_cleared";
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("malformed cache envelope: {0}")]
    Envelope(String),
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub max_items: usize,
    pub storage_version: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_items: DEFAULT_MAX_CACHED_ITEMS,
            storage_version: STORAGE_VERSION.to_string(),
        }
    }
}

impl CacheConfig {
    pub fn with_max_items(max_items: usize) -> Self {
        Self {
            max_items,
            ..Default::default()
        }
    }
}

/// Cache statistics for monitoring
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Error-carrying predictions that were not persisted.
    pub skipped_writes: u64,
    /// Reads or writes that failed and were treated as a miss / no-op.
    pub faults: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
