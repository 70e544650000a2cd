mod handlers;
mod metrics;
mod routes;

use axum::Router;
use sandcheck_engine::{DockerEngine, SandboxConfig, Verifier};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub verifier: Verifier,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes::routes())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if std::env::var("SANDCHECK_LOG_FORMAT").as_deref() == Ok("json") {
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

    info!("sandcheck API booting...");

    let config = SandboxConfig::load_default()?;
    info!(
        image = %config.image,
        timeout_ms = config.timeout_ms,
        memory_limit_mb = config.memory_limit_mb,
        max_parallel_tests = config.max_parallel_tests,
        "Sandbox configuration loaded"
    );

    let engine = DockerEngine::new(config)?;

    // Containers left by a previous crash still count against the host.
    match engine.reap_orphans().await {
        Ok(removed) => info!(removed = removed, "Startup reap finished"),
        Err(e) => warn!(error = %e, "Could not reap leftover containers"),
    }

    let max_parallel_tests = engine.config().max_parallel_tests;
    let state = Arc::new(AppState {
        verifier: Verifier::with_concurrency(Arc::new(engine), max_parallel_tests),
    });

    let app = build_router(state);

    let addr = std::env::var("SANDCHECK_BIND").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = TcpListener::bind(&addr).await?;

    info!("HTTP server listening on {}", addr);
    info!("Ready to verify submissions");

    axum::serve(listener, app).await?;
    Ok(())
}
