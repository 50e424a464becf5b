// Main entry point - Dependency injection, polling and snapshot server setup
use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use traffic_sync::application::clock::SystemClock;
use traffic_sync::application::scheduler::PollScheduler;
use traffic_sync::application::sync_engine::{PollTrigger, SyncEngine};
use traffic_sync::application::transformer::RecordTransformer;
use traffic_sync::infrastructure::config::load_config;
use traffic_sync::infrastructure::http_sensor_api::HttpSensorApi;
use traffic_sync::presentation::app_state::AppState;
use traffic_sync::presentation::router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = load_config().context("failed to load configuration")?;

    // Sensor API client (infrastructure layer)
    let api = Arc::new(HttpSensorApi::new(
        &config.sync.base_url,
        config.request_timeout(),
        config.sync.channel_in_path,
        config.sync.use_system_proxy,
    )?);

    // Engine (application layer)
    let transformer =
        RecordTransformer::new(config.timestamp_normalizer()?, config.display_format()?);
    let engine = Arc::new(SyncEngine::new(
        api,
        Arc::new(SystemClock),
        transformer,
        config.channel_catalog()?,
    ));

    tokio::spawn({
        let engine = engine.clone();
        async move {
            let snapshot = engine.update(PollTrigger::Initial).await;
            tracing::info!(
                channel = %snapshot.channel_id,
                state = %snapshot.state,
                samples = snapshot.series.len(),
                "initial poll finished"
            );
        }
    });

    let mut scheduler = PollScheduler::new(engine.clone(), config.poll_interval());
    scheduler.start();

    // Snapshot server (presentation layer)
    let state = Arc::new(AppState {
        engine,
        stale_after_secs: config.sync.stale_after_secs,
    });
    let addr: SocketAddr = config
        .server
        .bind_addr
        .parse()
        .with_context(|| format!("invalid server.bind_addr {:?}", config.server.bind_addr))?;
    tracing::info!(
        "Starting traffic-sync on {} polling {}",
        addr,
        config.sync.base_url
    );

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
