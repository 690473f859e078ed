//! Application context: one registry and one metrics aggregator, built at startup and
//! shared by every request handler.

use crate::artifact::{FsArtifactStore, ModelArtifact};
use crate::config::ServiceConfig;
use crate::error::{ModelLoadError, PredictError};
use crate::model_registry::{ModelRegistry, VersionListing};
use crate::prediction_metrics::{MetricsAggregator, MetricsRecorder, MetricsSnapshot};
use crate::scoring::{interpretation, score_text};
use crate::telemetry::counters;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub prediction: f64,
    pub confidence: f64,
    pub model_version: String,
    pub timestamp: DateTime<Utc>,
    pub interpretation: String,
}

pub struct ModelService {
    registry: ModelRegistry,
    metrics: Arc<MetricsAggregator>,
    recorder: MetricsRecorder,
    performance_threshold: f64,
}

impl ModelService {
    /// Wrap an already populated registry. Spawns the metrics worker on the current runtime.
    pub fn new(registry: ModelRegistry, performance_threshold: f64) -> Self {
        let metrics = Arc::new(MetricsAggregator::new());
        let (recorder, _worker) = MetricsRecorder::spawn(metrics.clone());
        Self { registry, metrics, recorder, performance_threshold }
    }

    /// Scan the configured model directory. Fails if nothing could be loaded.
    pub fn bootstrap(cfg: &ServiceConfig) -> Result<Self> {
        let store = FsArtifactStore::new(&cfg.model_dir, &cfg.model_prefix, &cfg.model_extension);
        let registry = ModelRegistry::new(Arc::new(store));
        let count = registry.load_all().with_context(|| format!("loading models from {}", cfg.model_dir.display()))?;
        if let Some(v) = cfg.default_model_version.as_deref() {
            if !registry.prefer(v) { warn!(version = %v, "configured default model version not found"); }
        }
        registry.ensure_loaded()?;
        info!(count, current = ?registry.current_version(), "model registry ready");
        Ok(Self::new(registry, cfg.performance_threshold))
    }

    #[instrument(skip(self, text), fields(text_len = text.len()))]
    pub fn predict(&self, text: &str, requested: Option<&str>) -> Result<Prediction, PredictError> {
        let outcome = self.registry.resolve(requested).map_err(PredictError::from)
            .and_then(|m| score_text(m.artifact.as_ref(), text).map(|s| (m.version, s)).map_err(PredictError::from));
        let (version, score) = match outcome {
            Ok(v) => v,
            Err(e) => {
                self.metrics.record_error();
                counters().errors_total.inc();
                warn!(error = %e, "prediction failed");
                return Err(e);
            }
        };
        self.recorder.dispatch(score.confidence);
        counters().predictions_total.inc();
        counters().confidence.observe(score.confidence);
        if score.confidence < self.performance_threshold {
            counters().low_confidence_total.inc();
            warn!(confidence = score.confidence, threshold = self.performance_threshold, %version, "low confidence prediction");
        }
        let prediction = Prediction {
            prediction: score.prediction,
            confidence: score.confidence,
            interpretation: interpretation(&score),
            model_version: version,
            timestamp: Utc::now(),
        };
        info!(prediction = prediction.prediction, confidence = prediction.confidence, model_version = %prediction.model_version, "prediction successful");
        Ok(prediction)
    }

    /// Load `version` from the store and make it current.
    pub fn update_model(&self, version: &str) -> Result<(), ModelLoadError> {
        self.registry.load_version(version)?;
        self.after_swap();
        Ok(())
    }

    /// Install an already loaded artifact as current.
    pub fn set_current(&self, version: &str, artifact: ModelArtifact) {
        self.registry.set_current(version, artifact);
        self.after_swap();
    }

    fn after_swap(&self) {
        self.metrics.mark_updated(Utc::now());
        counters().model_swaps_total.inc();
    }

    pub fn versions(&self) -> VersionListing { self.registry.list_versions() }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot { self.metrics.snapshot() }

    pub fn recorder(&self) -> &MetricsRecorder { &self.recorder }
}
