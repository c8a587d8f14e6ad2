pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod health;
pub mod hub;
pub mod insight;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod patterns;
pub mod pnl;
pub mod stats;
pub mod store;

use axum::{
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::ServerConfig;
pub use error::JournalError;
pub use gateway::{GatewaySettings, IngestionGateway};
pub use hub::EventHub;
pub use observability::{Logger, MetricsCollector};

/// Application state shared across handlers
pub struct AppState {
    pub gateway: Arc<IngestionGateway>,
    pub metrics: MetricsCollector,
    pub rate_limiter: middleware::RateLimiter,
    pub webhook_enabled: bool,
}

impl AppState {
    pub fn new(gateway: Arc<IngestionGateway>, rate_limiter: middleware::RateLimiter, webhook_enabled: bool) -> Self {
        Self {
            metrics: gateway.metrics().clone(),
            gateway,
            rate_limiter,
            webhook_enabled,
        }
    }
}

/// Build the API router
pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let journal_routes = Router::new()
        .route(
            "/trades",
            get(handlers::trades::list_trades).post(handlers::trades::create_trade),
        )
        .route("/trades/open", get(handlers::trades::list_open_trades))
        .route("/trades/by-date/{date}", get(handlers::trades::list_trades_by_date))
        .route(
            "/trades/{id}",
            get(handlers::trades::get_trade).patch(handlers::trades::update_trade),
        )
        .route("/trades/{id}/close", post(handlers::trades::close_trade))
        .route(
            "/signals",
            get(handlers::signals::list_signals).post(handlers::signals::create_signal),
        )
        .route("/signals/{id}/status", patch(handlers::signals::update_signal_status))
        .route("/stats", get(handlers::stats::get_stats))
        .route("/stats/strategies", get(handlers::stats::get_strategy_stats))
        .route("/stats/calendar", get(handlers::stats::get_calendar_stats))
        .route("/learning", get(handlers::stats::list_learning_events))
        .route("/memory", get(handlers::memory::get_memory))
        .route("/memory/sync", post(handlers::memory::sync_memory))
        .route("/events", get(handlers::events::stream_events));

    // Producer-facing ingestion, rate limited per caller
    let webhook_routes = Router::new()
        .route("/webhook", post(handlers::webhook::ingest))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::webhook_rate_limit_middleware,
        ));

    Router::new()
        .nest("/v1", journal_routes.merge(webhook_routes))
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/health", get(health::health_detail))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
