//! HTTP front of the counselling-response classifier.

use anyhow::Result;
use counsel_core::{clear_ready, init_tracing, load_config, mark_ready, start_health_server, ModelService};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

pub mod routes;

/// Full startup: config, tracing, model registry, health server, API listener.
/// Returns once ctrl-c has been received and in-flight requests have drained.
pub async fn run() -> Result<()> {
    let cfg = load_config("counsel-api")?;
    init_tracing(&cfg.service_name, &cfg.log_level)?;
    info!(?cfg, "config loaded");

    let service = Arc::new(ModelService::bootstrap(&cfg)?);
    start_health_server(cfg.health_port).await?;

    let listener = TcpListener::bind((cfg.host.as_str(), cfg.port)).await?;
    info!(addr = %listener.local_addr()?, "api listening");
    mark_ready();
    serve(service, listener, shutdown_signal()).await
}

/// Serve the API on `listener` until `shutdown` resolves, then drain queued metric updates.
pub async fn serve<F>(service: Arc<ModelService>, listener: TcpListener, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, routes::router(service.clone()))
        .with_graceful_shutdown(shutdown)
        .await?;
    service.recorder().flush().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = ?e, "ctrl-c handler failed");
    }
    clear_ready();
    info!("shutdown");
}
