//! Prediction data returned by the predictor backend.
//!
//! A `Prediction` is immutable once received: the cache stores it as-is and
//! the sidecar only derives views from it.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// `(team1_lose_probability, team1_win_probability)`, each in `[0, 1]`.
pub type MapProbability = (f64, f64);

/// player nickname -> map name -> historical matches on that map
pub type TeamStats = BTreeMap<String, BTreeMap<String, Vec<PlayerMatchStat>>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predictions: Option<BTreeMap<String, MapProbability>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team1_stats: Option<TeamStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team2_stats: Option<TeamStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Fields the backend sends that this crate does not interpret.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Prediction {
    pub fn with_maps<I, S>(maps: I) -> Self
    where
        I: IntoIterator<Item = (S, MapProbability)>,
        S: Into<String>,
    {
        Self {
            predictions: Some(maps.into_iter().map(|(m, p)| (m.into(), p)).collect()),
            ..Default::default()
        }
    }

    pub fn from_error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }

    /// Application-level failure reported inside a 2xx body.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Map names of the prediction, sorted.
    pub fn map_names(&self) -> Vec<String> {
        self.predictions
            .as_ref()
            .map(|p| p.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// One historical match of one player on one map.
/// Malformed fields decode to their defaults; they never fail the whole
/// `Prediction`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerMatchStat {
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub kills: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub deaths: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub assists: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub triple_kills: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub quadro_kills: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub penta_kills: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub headshots: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub headshot_percentage: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub kd_ratio: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub kr_ratio: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub mvps: f64,
    /// 1 for a win, 0 for a loss
    #[serde(default, deserialize_with = "lenient_f64")]
    pub result: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Millis(i64),
    Text(String),
    Other(serde_json::Value),
}

/// The backend has sent both RFC 3339 strings and epoch milliseconds.
/// Anything else (null, garbage text) reads as the epoch.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let parsed = match RawTimestamp::deserialize(deserializer)? {
        RawTimestamp::Millis(ms) => Utc.timestamp_millis_opt(ms).single(),
        RawTimestamp::Text(text) => parse_timestamp_text(&text),
        RawTimestamp::Other(_) => None,
    };
    Ok(parsed.unwrap_or_default())
}

fn parse_timestamp_text(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    text.trim().parse::<i64>().ok().and_then(|ms| Utc.timestamp_millis_opt(ms).single())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNumber {
    Number(f64),
    Text(String),
    Other(serde_json::Value),
}

/// Counters arrive as numbers, numeric strings or null.
fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawNumber::deserialize(deserializer)? {
        RawNumber::Number(n) => n,
        RawNumber::Text(text) => text.trim().parse::<f64>().ok().filter(|n| n.is_finite()).unwrap_or_default(),
        RawNumber::Other(_) => 0.0,
    })
}
