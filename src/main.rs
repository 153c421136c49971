pub mod api;
pub mod config;
pub mod data_structures;
pub mod pages;
pub mod worker;

use crate::data_structures::AppState;
use anyhow::Context;
use std::{net::SocketAddr, sync::Arc};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_config = config::AppConfig::load()?;

    // Initialize tracing with node_name in all logs
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    // Set a global span with node_name for all subsequent logs
    let _span = tracing::info_span!("node", name = %app_config.node_name).entered();

    tracing::info!("Starting gantt-lab");
    tracing::info!(
        ?app_config.environment,
        port = app_config.port,
        upload_ttl = ?app_config.upload_ttl,
        max_upload_bytes = app_config.max_upload_bytes,
        "Loaded configuration"
    );

    let app_state = AppState::new(app_config.clone());

    tracing::info!("Spawning upload cleanup worker");
    tokio::spawn(worker::run(app_state.uploads.clone(), app_config.clone()));

    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .finish()
            .context("Invalid rate limiter settings")?,
    );

    let app = api::router(app_state).layer(GovernorLayer::new(governor_conf));

    let addr = SocketAddr::from(([0, 0, 0, 0], app_config.port));
    tracing::info!(%addr, "Server listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
