//! Cloakgate Server - Headless Daemon
//!
//! Builds the cloaking services once at startup and exposes their
//! management API on /api/*.
//!
//! Access via: http://localhost:8046

use anyhow::Result;
use axum::{extract::DefaultBodyLimit, http::StatusCode, response::IntoResponse, routing::get, Router};
use clap::Parser;
use std::net::SocketAddr;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod api;
mod cli;
mod state;
#[cfg(test)]
mod test_helpers;

use cli::Cli;
use state::AppState;

const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)))
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Cloakgate Server starting on {}:{}...", cli.host, cli.port);

    let config = cloakgate_core::modules::load_or_default(&cli.config)?;
    info!(
        path = %cli.config.display(),
        mode = %config.cloak.mode,
        trace = config.masquerade_trace.enable,
        fingerprint = config.tls_fingerprint.enabled,
        "Configuration loaded"
    );

    let state = AppState::new(&config, Some(cli.config.clone()))?;
    info!("Application state initialized");

    let app = build_router(state.clone());

    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address {}:{}: {}", cli.host, cli.port, e))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("API available at http://{}/api/", addr);

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    state.shutdown();
    info!("Server stopped");
    Ok(())
}

pub(crate) fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", api::router())
        .route("/health", get(health_check))
        .route("/healthz", get(health_check))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, axum::Json(serde_json::json!({"status": "ok"})))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
