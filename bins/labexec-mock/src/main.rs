mod handlers;
mod jobs;
mod routes;

use anyhow::{Context, Result};
use axum::Router;
use jobs::{JobTable, DEFAULT_JOB_RETENTION};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8910";
const DEFAULT_QUEUE_DELAY_MS: u64 = 200;
const DEFAULT_RUN_DELAY_MS: u64 = 500;

pub struct AppState {
    pub jobs: JobTable,
}

fn env_millis(var: &str, default: u64) -> Result<Duration> {
    match std::env::var(var) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .with_context(|| format!("{} must be a number of milliseconds, got {:?}", var, value)),
        Err(_) => Ok(Duration::from_millis(default)),
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new().merge(routes::routes()).with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }

    info!("Mock executor booting...");

    let queue_delay = env_millis("MOCK_QUEUE_DELAY_MS", DEFAULT_QUEUE_DELAY_MS)?;
    let run_delay = env_millis("MOCK_RUN_DELAY_MS", DEFAULT_RUN_DELAY_MS)?;
    let retention = env_millis(
        "MOCK_JOB_RETENTION_MS",
        DEFAULT_JOB_RETENTION.as_millis() as u64,
    )?;
    info!(
        queue_delay_ms = queue_delay.as_millis() as u64,
        run_delay_ms = run_delay.as_millis() as u64,
        retention_ms = retention.as_millis() as u64,
        "Job timing configured"
    );

    let state = Arc::new(AppState {
        jobs: JobTable::new(queue_delay, run_delay).with_retention(retention),
    });

    let addr = std::env::var("MOCK_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("HTTP server listening on {}", addr);

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        warn!("Received shutdown signal, stopping...");
    };

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error")?;

    info!("Mock executor stopped");
    Ok(())
}
