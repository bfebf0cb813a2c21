// src/main.rs
use faceit_predictor::api::{start_api_server, AppState};
use faceit_predictor::cache::PredictionCache;
use faceit_predictor::client::PredictionApiClient;
use faceit_predictor::config::AppConfig;
use faceit_predictor::monitoring::{init_tracing, metrics};
use faceit_predictor::orchestrator::MatchDataService;
use faceit_predictor::storage::StorageAdapter;
use std::io;
use std::sync::Arc;
use tracing::info;

fn other_err(e: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e.to_string())
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    let config = AppConfig::from_env().map_err(other_err)?;

    // keep the guard alive for the lifetime of the process
    let _log_guard = init_tracing(&config.monitoring)?;
    metrics::init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        backend = ?config.storage.backend,
        api = %config.api.base_url,
        "Starting faceit-predictor"
    );

    let storage = StorageAdapter::open(&config.storage).await.map_err(other_err)?;
    let cache = Arc::new(PredictionCache::open(storage.clone(), config.cache.clone()).await);
    let client = Arc::new(PredictionApiClient::new(&config.api).map_err(other_err)?);

    let service = Arc::new(
        MatchDataService::new(cache, client, config.retry.clone())
            .with_finished_matches(config.predictions_for_finished_matches),
    );
    let state = AppState::new(service, storage).await;

    start_api_server(&config, state).await
}
