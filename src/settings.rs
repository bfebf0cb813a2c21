// src/settings.rs
// Feature toggles persisted through the storage adapter

use crate::storage::{StorageAdapter, StorageChange, StorageResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

pub mod keys {
    pub const EXTENSION_ENABLED: &str = "faceit_cs2_predictor_extension_enabled";
    pub const MAP_PREDICTIONS_ENABLED: &str = "faceit_cs2_predictor_map_predictions_enabled";
    pub const ADVANCED_STATS_ENABLED: &str = "faceit_cs2_predictor_advanced_stats_enabled";
    pub const MATCHMAKING_DATA_ENABLED: &str = "faceit_cs2_predictor_matchmaking_data_enabled";

    pub const ALL: [&str; 4] = [
        EXTENSION_ENABLED,
        MAP_PREDICTIONS_ENABLED,
        ADVANCED_STATS_ENABLED,
        MATCHMAKING_DATA_ENABLED,
    ];
}

/// A missing toggle reads as enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionSettings {
    pub extension_enabled: bool,
    pub map_predictions_enabled: bool,
    pub advanced_stats_enabled: bool,
    pub matchmaking_data_enabled: bool,
}

impl Default for ExtensionSettings {
    fn default() -> Self {
        Self {
            extension_enabled: true,
            map_predictions_enabled: true,
            advanced_stats_enabled: true,
            matchmaking_data_enabled: true,
        }
    }
}

/// Partial update; absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsUpdate {
    pub extension_enabled: Option<bool>,
    pub map_predictions_enabled: Option<bool>,
    pub advanced_stats_enabled: Option<bool>,
    pub matchmaking_data_enabled: Option<bool>,
}

impl SettingsUpdate {
    fn pairs(&self) -> Vec<(&'static str, bool)> {
        [
            (keys::EXTENSION_ENABLED, self.extension_enabled),
            (keys::MAP_PREDICTIONS_ENABLED, self.map_predictions_enabled),
            (keys::ADVANCED_STATS_ENABLED, self.advanced_stats_enabled),
            (keys::MATCHMAKING_DATA_ENABLED, self.matchmaking_data_enabled),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect()
    }
}

impl ExtensionSettings {
    pub async fn load(storage: &StorageAdapter) -> Self {
        let items = storage.get(&keys::ALL).await;
        let flag = |key: &str| items.get(key).and_then(Value::as_bool).unwrap_or(true);
        Self {
            extension_enabled: flag(keys::EXTENSION_ENABLED),
            map_predictions_enabled: flag(keys::MAP_PREDICTIONS_ENABLED),
            advanced_stats_enabled: flag(keys::ADVANCED_STATS_ENABLED),
            matchmaking_data_enabled: flag(keys::MATCHMAKING_DATA_ENABLED),
        }
    }

    /// Persist a single toggle.
    pub async fn save(storage: &StorageAdapter, key: &str, enabled: bool) -> StorageResult<()> {
        storage.set_one(key, Value::Bool(enabled)).await
    }

    /// Persist every field present in `update` in one write and return the merged settings.
    pub async fn update(storage: &StorageAdapter, update: &SettingsUpdate) -> StorageResult<Self> {
        let pairs = update.pairs();
        if !pairs.is_empty() {
            let items = pairs
                .iter()
                .map(|(key, value)| (key.to_string(), Value::Bool(*value)))
                .collect();
            storage.set(items).await?;
        }
        Ok(Self::load(storage).await)
    }

    fn slot(&mut self, key: &str) -> Option<&mut bool> {
        match key {
            keys::EXTENSION_ENABLED => Some(&mut self.extension_enabled),
            keys::MAP_PREDICTIONS_ENABLED => Some(&mut self.map_predictions_enabled),
            keys::ADVANCED_STATS_ENABLED => Some(&mut self.advanced_stats_enabled),
            keys::MATCHMAKING_DATA_ENABLED => Some(&mut self.matchmaking_data_enabled),
            _ => None,
        }
    }

    /// Apply a live storage change. Returns true when a toggle changed.
    pub fn apply_change(&mut self, change: &StorageChange) -> bool {
        let Some(slot) = self.slot(&change.key) else {
            return false;
        };
        let value = match &change.new_value {
            Some(Value::Bool(v)) => *v,
            None => true,
            Some(other) => {
                debug!(key = %change.key, value = %other, "Ignoring non-boolean setting value");
                return false;
            }
        };
        let changed = *slot != value;
        *slot = value;
        changed
    }
}
