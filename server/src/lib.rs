pub mod analyze;
pub mod auth;
pub mod config;
pub mod error;
pub mod health;
pub mod media_ingestion;
pub mod processing;
pub mod storage;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{
    analyze::analyze_image, config::Config, health::health_check,
    media_ingestion::handle_image_upload, processing::SkinAnalyzer, storage::ImageStore,
};

/// Log filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=info";

/// Source of timestamps for responses.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<ImageStore>,
    pub analyzer: Arc<SkinAnalyzer>,
    pub clock: Clock,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self::with_clock(config, Arc::new(Utc::now))
    }

    pub fn with_clock(config: Config, clock: Clock) -> Self {
        let store = Arc::new(ImageStore::new(config.upload_dir.clone()));
        let analyzer = Arc::new(SkinAnalyzer::new(store.clone()));
        Self {
            config: Arc::new(config),
            store,
            analyzer,
            clock,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.request_body_limit();

    Router::new()
        .route("/health", get(health_check))
        .route(
            "/upload",
            post(handle_image_upload).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/analyze", post(analyze_image))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
