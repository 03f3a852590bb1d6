//! uptrail - push monitor ingestion and uptime server.

use uptrail::broadcast::BroadcastHub;
use uptrail::config::ServerConfig;
use uptrail::db::Store;
use uptrail::metrics::MetricsRegistry;
use uptrail::notify::{LogNotifier, Notifier, WebhookNotifier};
use uptrail::pipeline::Pipeline;
use uptrail::scheduler::RetentionManager;
use uptrail::uptime::UptimeRegistry;
use uptrail::web::Server;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("uptrail=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    tracing::info!("Starting uptrail on port {}...", cfg.http_port);
    tracing::info!("Using database at {}", cfg.db_path);

    // Initialize database
    let store = Arc::new(Store::new(&cfg.db_path)?);
    tracing::info!("Database initialized successfully");

    let notifier: Arc<dyn Notifier> = match &cfg.webhook_url {
        Some(url) => {
            tracing::info!("Sending notifications to {}", url);
            Arc::new(WebhookNotifier::new(url.clone(), Duration::from_secs(10))?)
        }
        None => Arc::new(LogNotifier),
    };

    let hub = BroadcastHub::default();
    let mut live = hub.subscribe();
    tokio::spawn(async move {
        loop {
            match live.recv().await {
                Ok(update) => tracing::debug!(
                    "Live update for user {}: monitor {} is {}",
                    update.user_id,
                    update.heartbeat.monitor_id,
                    update.heartbeat.status
                ),
                Err(RecvError::Lagged(n)) => tracing::warn!("Live update log skipped {} updates", n),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let pipeline = Arc::new(Pipeline::new(
        store.clone(),
        Arc::new(UptimeRegistry::new()),
        notifier,
        Arc::new(hub),
        Arc::new(MetricsRegistry::new()),
    ));

    // Start retention
    let retention = RetentionManager::new(store, cfg.keep_days);
    retention.start();

    // Start web server
    let server = Server::new(cfg, pipeline);
    server.start().await?;

    retention.stop().await;
    Ok(())
}
