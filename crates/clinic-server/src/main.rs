//! Clinic Server: application entry point.

use std::net::SocketAddr;

use anyhow::Context;
use clinic_auth::spawn_sweeper;
use clinic_db::DbManager;
use clinic_server::{AppState, ServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("clinic=info")),
        )
        .json()
        .init();

    tracing::info!("Starting clinic server...");

    let config = ServerConfig::load()?;
    let auth_config = config.auth_config()?;

    let db = DbManager::connect(&config.database)
        .await
        .context("connecting to SurrealDB")?;

    let sweep_every = auth_config.rate_limit.sweep_interval();
    let state = AppState::new(db.client().clone(), auth_config);
    let sweeper = spawn_sweeper(state.limiter.clone(), sweep_every);

    let app = clinic_server::router(state);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "Listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    sweeper.abort();
    tracing::info!("Clinic server stopped.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
