//! Drives the HTTP surface against a live server on an ephemeral port.

use counsel_core::{ModelService, ServiceConfig};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

const PREFIX: &str = "counselor_response_classifier";

fn write_model(dir: &Path, version: &str) {
    // "lost" -> [0.3, 0.7], "alone" -> [0.2, 0.8]
    let model = json!({
        "classes": ["listening", "advice"],
        "intercept": [0.0, 0.0],
        "coefficients": {
            "lost": [0.0, (7.0f64 / 3.0).ln()],
            "alone": [0.0, 4.0f64.ln()],
        }
    });
    std::fs::write(dir.join(format!("{PREFIX}_{version}.json")), model.to_string()).unwrap();
}

struct Harness {
    base: String,
    client: reqwest::Client,
    dir: tempfile::TempDir,
    _shutdown: oneshot::Sender<()>,
}

impl Harness {
    async fn start(versions: &[&str], default_version: Option<&str>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        for v in versions { write_model(dir.path(), v); }
        let cfg = ServiceConfig {
            model_dir: dir.path().to_path_buf(),
            default_model_version: default_version.map(str::to_string),
            ..ServiceConfig::default()
        };
        let service = Arc::new(ModelService::bootstrap(&cfg).unwrap());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(counsel_api::serve(service, listener, async move { let _ = rx.await; }));
        Self { base, client: reqwest::Client::new(), dir, _shutdown: tx }
    }

    async fn predict(&self, body: Value) -> reqwest::Response {
        self.client.post(format!("{}/predict", self.base)).json(&body).send().await.unwrap()
    }

    async fn get_json(&self, path: &str) -> Value {
        self.client.get(format!("{}{}", self.base, path)).send().await.unwrap().json().await.unwrap()
    }

    async fn update(&self, version: &str) -> reqwest::Response {
        self.client.post(format!("{}/models/update", self.base)).query(&[("version", version)]).send().await.unwrap()
    }
}

#[tokio::test]
async fn predict_returns_probability_and_margin() {
    let h = Harness::start(&["a1b2"], None).await;
    let resp = h.predict(json!({"text": "I feel lost"})).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert!((body["prediction"].as_f64().unwrap() - 0.7).abs() < 1e-9);
    assert!((body["confidence"].as_f64().unwrap() - 0.4).abs() < 1e-9);
    assert_eq!(body["model_version"], "a1b2");
    assert!(body["timestamp"].as_str().is_some_and(|t| t.contains('T')));
    assert!(body["interpretation"].as_str().unwrap().contains("70.0% likelihood"));
}

#[tokio::test]
async fn metrics_eventually_reflect_predictions() {
    let h = Harness::start(&["a1b2"], None).await;
    assert_eq!(h.predict(json!({"text": "I feel lost"})).await.status(), 200);
    assert_eq!(h.predict(json!({"text": "I feel alone", "model_version": "a1b2"})).await.status(), 200);

    // updates are applied in the background; poll until both land
    let deadline = Instant::now() + Duration::from_secs(2);
    let metrics = loop {
        let m = h.get_json("/metrics").await;
        if m["predictions"] == 2 || Instant::now() > deadline { break m; }
        tokio::time::sleep(Duration::from_millis(10)).await;
    };
    assert_eq!(metrics["predictions"], 2);
    assert_eq!(metrics["errors"], 0);
    assert!((metrics["avg_confidence"].as_f64().unwrap() - 0.5).abs() < 1e-9);
}

#[tokio::test]
async fn unknown_version_is_a_server_error_listing_versions() {
    let h = Harness::start(&["a1b2"], None).await;
    let resp = h.predict(json!({"text": "I feel lost", "model_version": "nonexistent"})).await;
    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.contains("nonexistent") && detail.contains("a1b2"), "{detail}");
    assert_eq!(h.get_json("/metrics").await["errors"], 1);
}

#[tokio::test]
async fn blank_text_scores_from_intercept() {
    let h = Harness::start(&["a1b2"], None).await;
    let resp = h.predict(json!({"text": "   "})).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert!((body["prediction"].as_f64().unwrap() - 0.5).abs() < 1e-9);
    assert!(body["confidence"].as_f64().unwrap().abs() < 1e-9);
    assert_eq!(h.get_json("/metrics").await["errors"], 0);
}

#[tokio::test]
async fn bogus_update_is_rejected_without_side_effects() {
    let h = Harness::start(&["a1b2"], None).await;
    let before = h.get_json("/models/versions").await;
    let resp = h.update("bogus").await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["detail"].as_str().is_some());
    assert_eq!(h.get_json("/models/versions").await, before);
    assert_eq!(h.get_json("/metrics").await["last_updated"], Value::Null);
}

#[tokio::test]
async fn update_loads_new_version_and_makes_it_current() {
    let h = Harness::start(&["a1b2"], None).await;
    write_model(h.dir.path(), "c3d4");
    let resp = h.update("c3d4").await;
    assert_eq!(resp.status(), 200);
    let versions = h.get_json("/models/versions").await;
    assert_eq!(versions, json!({"current_version": "c3d4", "available_versions": ["a1b2", "c3d4"]}));
    assert!(h.get_json("/metrics").await["last_updated"].is_string());
    let body: Value = h.predict(json!({"text": "I feel lost"})).await.json().await.unwrap();
    assert_eq!(body["model_version"], "c3d4");
}

#[tokio::test]
async fn configured_default_version_wins_at_startup() {
    let h = Harness::start(&["a1b2", "c3d4"], Some("c3d4")).await;
    assert_eq!(h.get_json("/models/versions").await["current_version"], "c3d4");
}

#[tokio::test]
async fn preflight_gets_cors_headers() {
    let h = Harness::start(&["a1b2"], None).await;
    let resp = h.client.request(reqwest::Method::OPTIONS, format!("{}/predict", h.base))
        .header("Origin", "http://localhost:3000")
        .header("Access-Control-Request-Method", "POST")
        .send().await.unwrap();
    assert_eq!(resp.status(), 204);
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");
    let resp = h.client.get(format!("{}/models/versions", h.base)).send().await.unwrap();
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");
}

#[tokio::test]
async fn empty_model_directory_refuses_to_start() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = ServiceConfig { model_dir: dir.path().to_path_buf(), ..ServiceConfig::default() };
    let err = ModelService::bootstrap(&cfg).err().expect("bootstrap must fail");
    assert!(err.to_string().contains("No models available"), "{err}");
}
