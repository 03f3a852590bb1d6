//! Web server module.

mod handlers;

pub use handlers::*;

use crate::config::ServerConfig;
use crate::pipeline::Pipeline;

use axum::{
    extract::DefaultBodyLimit,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub pipeline: Arc<Pipeline>,
}

/// Web server for uptrail.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(config: ServerConfig, pipeline: Arc<Pipeline>) -> Self {
        Self {
            state: AppState { config, pipeline },
        }
    }

    /// Build the router with all routes.
    fn routes(&self) -> Router {
        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

        Router::new()
            // Push monitors
            .route(
                "/api/push/{token}",
                get(handlers::handle_push).post(handlers::handle_push),
            )
            // Uptime queries
            .route(
                "/api/monitors/{id}/uptime/{duration}",
                get(handlers::handle_get_uptime),
            )
            // Badges
            .route("/api/badge/{id}/status", get(handlers::handle_status_badge))
            .route("/api/badge/{id}/uptime", get(handlers::handle_uptime_badge_default))
            .route("/api/badge/{id}/uptime/{duration}", get(handlers::handle_uptime_badge))
            .route("/api/badge/{id}/ping", get(handlers::handle_ping_badge_default))
            .route("/api/badge/{id}/ping/{duration}", get(handlers::handle_ping_badge))
            .route("/api/badge/{id}/response", get(handlers::handle_response_badge))
            .route(
                "/api/badge/{id}/avg-response",
                get(handlers::handle_avg_response_badge_default),
            )
            .route(
                "/api/badge/{id}/avg-response/{duration}",
                get(handlers::handle_avg_response_badge),
            )
            // Heartbeat report
            .route("/api/report", get(handlers::handle_report))
            // Scrape endpoint
            .route("/metrics", get(handlers::handle_metrics))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .layer(DefaultBodyLimit::max(64 * 1024)) // 64KB
            .with_state(self.state.clone())
    }

    /// Start the server on the configured port.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.config.http_port));
        let router = self.routes();

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}
