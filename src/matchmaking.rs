// src/matchmaking.rs
// Server locations and map pool scraped from FACEIT match/v2 responses

use crate::storage::{StorageAdapter, StorageError, StorageResult};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

pub const MATCHMAKING_DATA_KEY: &str = "faceit_cs2_predictor_matchmaking_data";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchmakingData {
    pub server_countries: Vec<String>,
    pub available_maps: Vec<String>,
    /// Epoch millis
    pub updated_on: i64,
}

/// Accepts the response as a JSON object or as JSON text. `None` when there is no payload.
pub fn extract_matchmaking_data(response: &Value) -> Option<MatchmakingData> {
    let parsed;
    let response = match response {
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(v) => {
                parsed = v;
                &parsed
            }
            Err(e) => {
                warn!(error = %e, "Matchmaking response is not valid JSON");
                return None;
            }
        },
        other => other,
    };

    let payload = response.get("payload").filter(|p| !p.is_null())?;

    let server_countries: Vec<String> = payload
        .get("locations")
        .and_then(Value::as_array)
        .map(|locations| {
            locations
                .iter()
                .filter_map(|l| l.get("class_name").and_then(Value::as_str))
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let mut available_maps: Vec<String> = payload
        .get("tags")
        .and_then(Value::as_array)
        .and_then(|tags| tags.iter().filter_map(Value::as_str).find(|t| t.contains("de_")))
        .map(|tag| {
            tag.split(',')
                .filter_map(|m| m.strip_prefix("de_"))
                .map(capitalize)
                .collect()
        })
        .unwrap_or_default();
    available_maps.sort();

    Some(MatchmakingData {
        server_countries,
        available_maps,
        updated_on: Utc::now().timestamp_millis(),
    })
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub async fn store(storage: &StorageAdapter, data: &MatchmakingData) -> StorageResult<()> {
    let value = serde_json::to_value(data)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    storage.set_one(MATCHMAKING_DATA_KEY, value).await?;
    debug!(maps = data.available_maps.len(), "Matchmaking data saved");
    Ok(())
}

pub async fn load(storage: &StorageAdapter) -> Option<MatchmakingData> {
    let mut items = storage.get(&[MATCHMAKING_DATA_KEY]).await;
    let value = items.remove(MATCHMAKING_DATA_KEY)?;
    match serde_json::from_value(value) {
        Ok(data) => Some(data),
        Err(e) => {
            warn!(error = %e, "Stored matchmaking data is malformed");
            None
        }
    }
}
