use axum::{
    extract::{Query, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use counsel_core::{MetricsSnapshot, ModelService, Prediction, VersionListing};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};

pub type AppState = Arc<ModelService>;

#[derive(Debug, Deserialize)]
pub struct PredictionRequest {
    pub text: String,
    #[serde(default)]
    pub model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateParams {
    pub version: String,
}

/// Error surfaced to HTTP clients as `{"detail": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn internal(e: impl std::fmt::Display) -> Self { Self { status: StatusCode::INTERNAL_SERVER_ERROR, detail: e.to_string() } }
    pub fn bad_request(e: impl std::fmt::Display) -> Self { Self { status: StatusCode::BAD_REQUEST, detail: e.to_string() } }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "detail": self.detail }))).into_response()
    }
}

pub fn router(service: AppState) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/metrics", get(metrics))
        .route("/models/update", post(update_model))
        .route("/models/versions", get(list_models))
        .layer(middleware::from_fn(cors))
        .with_state(service)
}

async fn predict(State(svc): State<AppState>, Json(req): Json<PredictionRequest>) -> Result<Json<Prediction>, ApiError> {
    info!(model_version = ?req.model_version, "processing prediction request");
    svc.predict(&req.text, req.model_version.as_deref())
        .map(Json)
        .map_err(|e| {
            error!(error = %e, "prediction error");
            ApiError::internal(e)
        })
}

async fn metrics(State(svc): State<AppState>) -> Json<MetricsSnapshot> {
    Json(svc.metrics_snapshot())
}

async fn update_model(State(svc): State<AppState>, Query(params): Query<UpdateParams>) -> Result<Json<serde_json::Value>, ApiError> {
    svc.update_model(&params.version).map_err(|e| {
        error!(error = %e, version = %params.version, "model update failed");
        ApiError::bad_request(e)
    })?;
    Ok(Json(serde_json::json!({ "message": format!("Successfully updated to model version {}", params.version) })))
}

async fn list_models(State(svc): State<AppState>) -> Json<VersionListing> {
    Json(svc.versions())
}

/// Permissive CORS: any origin, method and header, no credentials.
async fn cors(req: Request, next: Next) -> Response {
    let preflight = req.method() == Method::OPTIONS;
    let mut resp = if preflight { StatusCode::NO_CONTENT.into_response() } else { next.run(req).await };
    let h = resp.headers_mut();
    h.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    h.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("*"));
    h.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*"));
    if preflight {
        h.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("600"));
    }
    resp
}
