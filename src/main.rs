//! bankwerk service entry point
//!
//! Wires the core services over the in-memory store and runs the HTTP
//! gateway plus the standing-order scheduler as a background job.

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use tokio::signal;
use tracing::{error, info};

use bankwerk::api::{self, AppState};
use bankwerk::config::AppConfig;
use bankwerk::identity::JwtVerifier;
use bankwerk::ledger::MemoryStore;
use bankwerk::logging::init_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = std::env::args().nth(1).unwrap_or_else(|| "dev".to_string());
    let config = AppConfig::load(&env);
    let _guard = init_logging(&config);

    info!(env = %env, version = env!("CARGO_PKG_VERSION"), git = env!("GIT_HASH"), "Starting bankwerk");

    let store = Arc::new(MemoryStore::new(config.store.clone()));
    let verifier = Arc::new(JwtVerifier::new(&config.jwt_secret));
    let state = Arc::new(AppState::new(store, verifier, &config));

    // Scheduler job: due standing orders + TAN expiry sweep.
    let job_state = state.clone();
    let interval_secs = config.scheduler.interval_secs;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        loop {
            ticker.tick().await;
            let now = Utc::now();
            if let Err(e) = job_state.scheduler.run_pass(now).await {
                error!(error = %e, "Standing order pass failed");
            }
            if let Err(e) = job_state.orchestrator.sweep_expired(now).await {
                error!(error = %e, "TAN expiry sweep failed");
            }
        }
    });

    let addr: SocketAddr = format!("{}:{}", config.gateway.host, config.gateway.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Gateway listening");

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!(error = %e, "Failed to install Ctrl+C handler");
    }
    info!("Shutdown signal received");
}
