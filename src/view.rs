// src/view.rs
// Display-ready projection of a prediction, gated by the extension toggles

use crate::models::Prediction;
use crate::settings::ExtensionSettings;
use crate::stats::{calculate_team_map_stats, display_maps, TeamMapStats};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapPrediction {
    pub map: String,
    pub team1_win_percentage: f64,
    pub team1_lose_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamStatsView {
    pub days_before: u32,
    pub maps: Vec<String>,
    pub team1: TeamMapStats,
    pub team2: TeamMapStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionView {
    pub match_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub predictions: Vec<MapPrediction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<TeamStatsView>,
}

/// Probability in [0, 1] as a percentage with two decimals.
pub fn to_percentage(probability: f64) -> f64 {
    (probability * 100.0 * 100.0).round() / 100.0
}

pub fn build_view(
    match_id: &str,
    prediction: &Prediction,
    settings: &ExtensionSettings,
    days_before: u32,
    now: DateTime<Utc>,
) -> PredictionView {
    let mut view = PredictionView {
        match_id: match_id.to_string(),
        error: None,
        predictions: Vec::new(),
        stats: None,
    };

    if let Some(error) = &prediction.error {
        view.error = Some(error.clone());
        return view;
    }

    if settings.advanced_stats_enabled {
        if let (Some(team1), Some(team2)) = (&prediction.team1_stats, &prediction.team2_stats) {
            view.stats = Some(TeamStatsView {
                days_before,
                maps: display_maps(&prediction.map_names()),
                team1: calculate_team_map_stats(team1, days_before, now),
                team2: calculate_team_map_stats(team2, days_before, now),
            });
        }
    }

    if settings.map_predictions_enabled {
        if let Some(predictions) = &prediction.predictions {
            view.predictions = predictions
                .iter()
                .map(|(map, (lose, win))| MapPrediction {
                    map: map.clone(),
                    team1_win_percentage: to_percentage(*win),
                    team1_lose_percentage: to_percentage(*lose),
                })
                .collect();
        }
    }

    view
}
