//! Tracing setup, Prometheus counters and the liveness/readiness server.

use anyhow::Result;
use axum::{http::{header, StatusCode}, response::{IntoResponse, Response}, routing::get, Router};
use once_cell::sync::{Lazy, OnceCell};
use prometheus::{register_histogram, register_int_counter, Encoder, Histogram, IntCounter, TextEncoder};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static TRACING_INIT: OnceCell<()> = OnceCell::new();
static STARTED_AT: Lazy<Instant> = Lazy::new(Instant::now);
static NODE_LIVENESS: AtomicBool = AtomicBool::new(true);
static NODE_READINESS: AtomicBool = AtomicBool::new(false);

pub fn mark_ready() { NODE_READINESS.store(true, Ordering::SeqCst); }
pub fn clear_ready() { NODE_READINESS.store(false, Ordering::SeqCst); }

pub struct PredictionCounters {
    pub predictions_total: IntCounter,
    pub errors_total: IntCounter,
    pub low_confidence_total: IntCounter,
    pub model_swaps_total: IntCounter,
    pub confidence: Histogram,
}

pub static PREDICTION_COUNTERS: Lazy<PredictionCounters> = Lazy::new(|| PredictionCounters {
    predictions_total: register_int_counter!("counsel_predictions_total", "Successful predictions served")
        .expect("register counsel_predictions_total"),
    errors_total: register_int_counter!("counsel_prediction_errors_total", "Predictions failed during lookup or scoring")
        .expect("register counsel_prediction_errors_total"),
    low_confidence_total: register_int_counter!("counsel_low_confidence_total", "Predictions below the configured confidence threshold")
        .expect("register counsel_low_confidence_total"),
    model_swaps_total: register_int_counter!("counsel_model_swaps_total", "Current model version changes via update")
        .expect("register counsel_model_swaps_total"),
    confidence: register_histogram!("counsel_prediction_confidence", "Confidence margin of served predictions",
        vec![0.05, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0])
        .expect("register counsel_prediction_confidence"),
});

pub fn counters() -> &'static PredictionCounters { &PREDICTION_COUNTERS }

/// Install the global subscriber once. `RUST_LOG` wins over `default_level`;
/// `COUNSEL_JSON_LOG=1` switches to JSON lines.
pub fn init_tracing(service: &str, default_level: &str) -> Result<()> {
    TRACING_INIT.get_or_try_init(|| -> Result<()> {
        let json = std::env::var("COUNSEL_JSON_LOG").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
        let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level))?;
        let json_layer = json.then(|| fmt::layer().json().flatten_event(true).with_current_span(true).with_span_list(false));
        let text_layer = (!json).then(|| fmt::layer().with_target(true).with_thread_ids(false).with_line_number(true));
        tracing_subscriber::registry().with(env_filter).with(json_layer).with(text_layer).try_init()?;
        Ok(())
    })?;
    Lazy::force(&STARTED_AT);
    info!(target: "counsel", service, "tracing initialized");
    Ok(())
}

/// Serve `/live`, `/ready`, `/status` and Prometheus `/metrics` on `port` (0 picks one).
pub async fn start_health_server(port: u16) -> Result<SocketAddr> {
    Lazy::force(&PREDICTION_COUNTERS);
    let app = Router::new()
        .route("/live", get(|| async { axum::Json(serde_json::json!({"live": NODE_LIVENESS.load(Ordering::SeqCst)})) }))
        .route("/ready", get(ready_handler))
        .route("/status", get(|| async {
            axum::Json(serde_json::json!({
                "live": NODE_LIVENESS.load(Ordering::SeqCst),
                "ready": NODE_READINESS.load(Ordering::SeqCst),
                "uptime_secs": STARTED_AT.elapsed().as_secs(),
            }))
        }))
        .route("/metrics", get(metrics_handler));
    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await?;
    let addr = listener.local_addr()?;
    info!(?addr, "health server listening");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = ?e, "health server failed");
        }
    });
    Ok(addr)
}

async fn ready_handler() -> Response {
    let ready = NODE_READINESS.load(Ordering::SeqCst);
    let status = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, axum::Json(serde_json::json!({"ready": ready}))).into_response()
}

async fn metrics_handler() -> Response {
    let metric_families = prometheus::gather();
    let mut buf = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&metric_families, &mut buf) {
        return (StatusCode::INTERNAL_SERVER_ERROR, format!("encode error: {e}")).into_response();
    }
    (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain; version=0.0.4")], buf).into_response()
}
