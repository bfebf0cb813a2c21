pub mod api;
pub mod cache;
pub mod client;
pub mod codec;
pub mod config;
pub mod matchmaking;
pub mod matchroom;
pub mod models;
pub mod monitoring;
pub mod orchestrator;
pub mod settings;
pub mod stats;
pub mod storage;
pub mod view;

pub use cache::PredictionCache;
pub use models::Prediction;
pub use orchestrator::MatchDataService;
