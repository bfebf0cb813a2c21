// src/api/mod.rs
// Loopback HTTP surface queried by the desktop shell and content script

use crate::config::AppConfig;
use crate::matchmaking;
use crate::matchroom::{match_id_from_url, nickname_from_player_href};
use crate::monitoring::metrics;
use crate::orchestrator::MatchDataService;
use crate::settings::{ExtensionSettings, SettingsUpdate};
use crate::stats::DAYS_BEFORE_DEFAULT;
use crate::storage::StorageAdapter;
use crate::view::build_view;
use actix_web::{web, App, HttpResponse, HttpServer};
use chrono::Utc;
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

pub const FETCH_FAILED_MESSAGE: &str = "Failed to load match data. Please try refreshing the page.";

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MatchDataService>,
    pub storage: StorageAdapter,
    pub settings: Arc<RwLock<ExtensionSettings>>,
}

impl AppState {
    /// Loads the toggles and keeps them in sync with later storage writes.
    pub async fn new(service: Arc<MatchDataService>, storage: StorageAdapter) -> Self {
        let settings = Arc::new(RwLock::new(ExtensionSettings::load(&storage).await));
        spawn_settings_watcher(storage.clone(), settings.clone());
        Self {
            service,
            storage,
            settings,
        }
    }

    fn settings(&self) -> ExtensionSettings {
        *self.settings.read()
    }
}

fn spawn_settings_watcher(storage: StorageAdapter, settings: Arc<RwLock<ExtensionSettings>>) {
    let mut rx = storage.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(change) => {
                    if settings.write().apply_change(&change) {
                        debug!(key = %change.key, "Setting changed");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Settings watcher lagged, reloading");
                    let fresh = ExtensionSettings::load(&storage).await;
                    *settings.write() = fresh;
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

#[derive(Deserialize)]
pub struct MatchQuery {
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub finished: bool,
    pub days_before: Option<u32>,
}

#[derive(Deserialize)]
pub struct MatchroomQuery {
    pub url: String,
    #[serde(default)]
    pub player_href: String,
    #[serde(default)]
    pub finished: bool,
    pub days_before: Option<u32>,
}

pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let cache = state.service.cache();
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "storage_backend": state.storage.backend_name(),
        "cache_size": cache.len().await,
        "cache_max_items": cache.config().max_items,
    }))
}

pub async fn get_metrics() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(metrics::export_prometheus())
}

async fn respond_with_match(
    state: &AppState,
    match_id: &str,
    nickname: &str,
    finished: bool,
    days_before: Option<u32>,
) -> HttpResponse {
    let settings = state.settings();
    if !settings.extension_enabled {
        return HttpResponse::ServiceUnavailable().json(json!({ "error": "Extension is disabled" }));
    }

    match state.service.load_match(match_id, nickname, finished).await {
        Ok(prediction) => {
            let days = days_before.unwrap_or(DAYS_BEFORE_DEFAULT);
            HttpResponse::Ok().json(build_view(match_id, &prediction, &settings, days, Utc::now()))
        }
        Err(e) => {
            error!(match_id, error = %e, "Failed to load match data");
            HttpResponse::BadGateway().json(json!({ "error": FETCH_FAILED_MESSAGE }))
        }
    }
}

pub async fn get_match(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<MatchQuery>,
) -> HttpResponse {
    let match_id = path.into_inner();
    respond_with_match(&state, &match_id, &query.nickname, query.finished, query.days_before).await
}

pub async fn get_matchroom(state: web::Data<AppState>, query: web::Query<MatchroomQuery>) -> HttpResponse {
    let Some(match_id) = match_id_from_url(&query.url) else {
        return HttpResponse::BadRequest().json(json!({ "error": "Not a matchroom URL" }));
    };
    let nickname = nickname_from_player_href(&query.player_href);
    respond_with_match(&state, &match_id, &nickname, query.finished, query.days_before).await
}

pub async fn get_settings(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.settings())
}

pub async fn put_settings(state: web::Data<AppState>, body: web::Json<SettingsUpdate>) -> HttpResponse {
    match ExtensionSettings::update(&state.storage, &body).await {
        Ok(settings) => {
            *state.settings.write() = settings;
            HttpResponse::Ok().json(settings)
        }
        Err(e) => {
            error!(error = %e, "Failed to save settings");
            HttpResponse::InternalServerError().json(json!({ "error": e.to_string() }))
        }
    }
}

pub async fn post_matchmaking(state: web::Data<AppState>, body: web::Json<Value>) -> HttpResponse {
    let Some(data) = matchmaking::extract_matchmaking_data(&body) else {
        return HttpResponse::BadRequest().json(json!({ "error": "Response has no payload" }));
    };
    match matchmaking::store(&state.storage, &data).await {
        Ok(()) => HttpResponse::Ok().json(data),
        Err(e) => {
            error!(error = %e, "Failed to save matchmaking data");
            HttpResponse::InternalServerError().json(json!({ "error": e.to_string() }))
        }
    }
}

pub async fn get_matchmaking(state: web::Data<AppState>) -> HttpResponse {
    if !state.settings().matchmaking_data_enabled {
        return HttpResponse::NoContent().finish();
    }
    match matchmaking::load(&state.storage).await {
        Some(data) => HttpResponse::Ok().json(data),
        None => HttpResponse::NoContent().finish(),
    }
}

pub async fn get_cache(state: web::Data<AppState>) -> HttpResponse {
    let cache = state.service.cache();
    let snapshot = cache.snapshot().await;
    HttpResponse::Ok().json(json!({
        "size": snapshot.len(),
        "max_items": cache.config().max_items,
        "order": snapshot.order,
        "consistent": snapshot.is_consistent(),
        "stats": cache.stats(),
        "hit_rate": cache.stats().hit_rate(),
    }))
}

pub async fn clear_cache(state: web::Data<AppState>) -> HttpResponse {
    match state.service.cache().clear().await {
        Ok(()) => HttpResponse::Ok().json(json!({ "status": "cleared" })),
        Err(e) => {
            error!(error = %e, "Failed to clear prediction cache");
            HttpResponse::InternalServerError().json(json!({ "error": e.to_string() }))
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        // ============================================================================
        // MONITORING ROUTES
        // ============================================================================
        .route("/health", web::get().to(health_check))
        .route("/metrics", web::get().to(get_metrics))
        // ============================================================================
        // PREDICTION ROUTES
        // ============================================================================
        .route("/match/{match_id}", web::get().to(get_match))
        .route("/matchroom", web::get().to(get_matchroom))
        .route("/settings", web::get().to(get_settings))
        .route("/settings", web::put().to(put_settings))
        .route("/matchmaking", web::post().to(post_matchmaking))
        .route("/matchmaking", web::get().to(get_matchmaking))
        .route("/cache", web::get().to(get_cache))
        .route("/cache", web::delete().to(clear_cache));
}

pub async fn start_api_server(config: &AppConfig, state: AppState) -> std::io::Result<()> {
    let bind_addr = config.bind_addr();
    let data = web::Data::new(state);

    info!(addr = %bind_addr, "Starting predictor API server");
    HttpServer::new(move || App::new().app_data(data.clone()).configure(configure))
        .bind(&bind_addr)?
        .run()
        .await
}
