// src/stats.rs
// Per-player, per-map averages over a trailing window of days

use crate::models::{PlayerMatchStat, TeamStats};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DAYS_BEFORE_DEFAULT: u32 = 3;
pub const DAYS_BEFORE_AVAILABLE: [u32; 5] = [3, 7, 10, 14, 30];

pub const DEFAULT_MAPS: [&str; 8] = [
    "de_ancient",
    "de_anubis",
    "de_dust2",
    "de_inferno",
    "de_mirage",
    "de_nuke",
    "de_overpass",
    "de_train",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapStats {
    pub avg_kills: f64,
    pub avg_deaths: f64,
    pub avg_assists: f64,
    pub avg_triple_kills: f64,
    pub avg_quadro_kills: f64,
    pub avg_penta_kills: f64,
    pub avg_headshots: f64,
    pub avg_headshot_percentage: f64,
    pub avg_kd_ratio: f64,
    pub avg_kr_ratio: f64,
    pub avg_mvps: f64,
    pub total_matches_played: u32,
    pub total_matches_won: f64,
    pub win_percentage: f64,
}

/// nickname -> map -> aggregated stats
pub type TeamMapStats = BTreeMap<String, BTreeMap<String, MapStats>>;

/// True when `days` is one of the offered look-back windows.
pub fn is_available_window(days: u32) -> bool {
    DAYS_BEFORE_AVAILABLE.contains(&days)
}

pub fn calculate_team_map_stats(team_stats: &TeamStats, days_before: u32, now: DateTime<Utc>) -> TeamMapStats {
    let from = now - Duration::days(i64::from(days_before));

    team_stats
        .iter()
        .map(|(nickname, maps)| {
            let per_map = maps
                .iter()
                .map(|(map, matches)| (map.clone(), calculate_map_stats(matches, from)))
                .collect();
            (nickname.clone(), per_map)
        })
        .collect()
}

fn calculate_map_stats(matches: &[PlayerMatchStat], from: DateTime<Utc>) -> MapStats {
    let recent: Vec<&PlayerMatchStat> = matches.iter().filter(|m| m.created_at >= from).collect();
    if recent.is_empty() {
        return MapStats::default();
    }

    let n = recent.len() as f64;
    let avg = |field: fn(&PlayerMatchStat) -> f64| recent.iter().map(|m| field(m)).sum::<f64>() / n;
    let won: f64 = recent.iter().map(|m| m.result).sum();

    MapStats {
        avg_kills: avg(|m| m.kills),
        avg_deaths: avg(|m| m.deaths),
        avg_assists: avg(|m| m.assists),
        avg_triple_kills: avg(|m| m.triple_kills),
        avg_quadro_kills: avg(|m| m.quadro_kills),
        avg_penta_kills: avg(|m| m.penta_kills),
        avg_headshots: avg(|m| m.headshots),
        avg_headshot_percentage: avg(|m| m.headshot_percentage),
        avg_kd_ratio: avg(|m| m.kd_ratio),
        avg_kr_ratio: avg(|m| m.kr_ratio),
        avg_mvps: avg(|m| m.mvps),
        total_matches_played: recent.len() as u32,
        total_matches_won: won,
        win_percentage: won / n * 100.0,
    }
}

/// Map list for display: the prediction's maps, or the default pool.
pub fn display_maps(prediction_maps: &[String]) -> Vec<String> {
    if prediction_maps.is_empty() {
        DEFAULT_MAPS.iter().map(|m| m.to_string()).collect()
    } else {
        prediction_maps.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn stat(created_at: DateTime<Utc>, kills: f64, result: f64) -> PlayerMatchStat {
        PlayerMatchStat {
            created_at,
            kills,
            deaths: 10.0,
            kd_ratio: kills / 10.0,
            result,
            ..Default::default()
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 20, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_averages_within_window() {
        let now = now();
        let mut maps = BTreeMap::new();
        maps.insert(
            "de_mirage".to_string(),
            vec![
                stat(now - Duration::days(1), 20.0, 1.0),
                stat(now - Duration::days(2), 10.0, 0.0),
                stat(now - Duration::days(9), 40.0, 1.0),
            ],
        );
        let mut team = TeamStats::new();
        team.insert("s1mple".to_string(), maps);

        let stats = calculate_team_map_stats(&team, 3, now);
        let mirage = &stats["s1mple"]["de_mirage"];
        assert_eq!(mirage.total_matches_played, 2);
        assert_eq!(mirage.avg_kills, 15.0);
        assert_eq!(mirage.avg_kd_ratio, 1.5);
        assert_eq!(mirage.total_matches_won, 1.0);
        assert_eq!(mirage.win_percentage, 50.0);

        let wide = calculate_team_map_stats(&team, 10, now);
        assert_eq!(wide["s1mple"]["de_mirage"].total_matches_played, 3);
    }

    #[test]
    fn test_no_recent_matches_is_zero() {
        let now = now();
        let mut maps = BTreeMap::new();
        maps.insert("de_nuke".to_string(), vec![stat(now - Duration::days(30), 25.0, 1.0)]);
        maps.insert("de_train".to_string(), Vec::new());
        let mut team = TeamStats::new();
        team.insert("p".to_string(), maps);

        let stats = calculate_team_map_stats(&team, 7, now);
        assert_eq!(stats["p"]["de_nuke"], MapStats::default());
        assert_eq!(stats["p"]["de_train"], MapStats::default());
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(MapStats::default()).unwrap();
        assert!(json.get("avgKdRatio").is_some());
        assert!(json.get("totalMatchesPlayed").is_some());
    }

    #[test]
    fn test_display_maps_fallback() {
        assert_eq!(display_maps(&[]).len(), DEFAULT_MAPS.len());
        assert_eq!(display_maps(&["de_vertigo".to_string()]), vec!["de_vertigo"]);
        assert!(is_available_window(14));
        assert!(!is_available_window(5));
    }
}
