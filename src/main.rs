mod api;
mod classify;
mod config;
mod countdown;
mod error;
mod feed;
mod models;
mod observability;
mod orders;
mod routing;
mod state;
mod tracking;
mod viewport;

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use crate::orders::HttpOrderApi;
use crate::routing::{OsrmClient, RoutingApi};
use crate::tracking::session::SessionManager;
use crate::viewport::{MapSurface, TracingSurface};

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    let config = config::Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let orders_api = Arc::new(HttpOrderApi::new(config.orders_api_url.clone()));
    let shared_state = Arc::new(state::AppState::new(
        orders_api,
        config.feed_buffer_size,
        config.reload_retry_attempts,
        Duration::from_millis(config.reload_retry_backoff_ms),
    ));

    if let Err(err) = tracking::reload_snapshot(&shared_state).await {
        tracing::warn!(error = %err, "initial order history load failed; starting empty");
    }

    let routing_api: Arc<dyn RoutingApi> = Arc::new(OsrmClient::new(config.routing_api_url.clone()));
    let surface: Arc<dyn MapSurface> = Arc::new(TracingSurface);
    let manager = SessionManager::new(
        routing_api,
        surface,
        Duration::from_millis(config.route_timeout_ms),
    );
    tokio::spawn(tracking::session::run_supervisor(
        shared_state.clone(),
        manager,
        Duration::from_secs(config.session_resync_secs),
    ));

    let engine = countdown::CountdownEngine::start(Duration::from_millis(config.tick_interval_ms));
    tokio::spawn(tracking::run_countdown_loop(
        shared_state.clone(),
        engine.subscribe(),
    ));

    let app = api::rest::router(shared_state.clone());

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| error::AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "tracking api started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| error::AppError::Internal(format!("server error: {err}")))?;

    engine.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
