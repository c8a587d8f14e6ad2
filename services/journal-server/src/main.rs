use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use journal_server::insight::{CannedInsight, HttpInsightGenerator, InsightGenerator};
use journal_server::middleware::RateLimiter;
use journal_server::store::{InMemoryRepository, JournalRepository, PgRepository};
use journal_server::{AppState, EventHub, GatewaySettings, IngestionGateway, MetricsCollector, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::load()?;

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting trading journal server...");

    let repo: Arc<dyn JournalRepository> = match config.database_url.as_deref() {
        Some(url) => {
            info!("Connecting to database...");
            let db = journal_server::db::init_db(url).await?;
            info!("Running migrations...");
            journal_server::db::migrate(&db).await?;
            info!("Database ready");
            Arc::new(PgRepository::new(db))
        }
        None => {
            warn!("No database_url configured, journal is held in memory only");
            Arc::new(InMemoryRepository::new())
        }
    };

    let insight: Arc<dyn InsightGenerator> = match config.insight_url.as_deref() {
        Some(url) => {
            info!(url, "Using remote insight generator");
            Arc::new(HttpInsightGenerator::new(url)?)
        }
        None => Arc::new(CannedInsight),
    };

    if config.webhook_secret.is_none() {
        warn!("No webhook_secret configured, webhook calls will be rejected");
    }

    let hub = EventHub::new(config.hub.channel_capacity);
    let _heartbeat = hub.spawn_heartbeat(Duration::from_secs(config.hub.heartbeat_secs));

    let gateway = Arc::new(IngestionGateway::new(
        repo,
        hub,
        insight,
        MetricsCollector::new(),
        GatewaySettings::from_config(&config),
    ));
    let rate_limiter = RateLimiter::new(config.rate_limit.window_secs, config.rate_limit.max_requests);
    let state = Arc::new(AppState::new(gateway, rate_limiter, config.webhook_secret.is_some()));

    let app = journal_server::app(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Journal server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
