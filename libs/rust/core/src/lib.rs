//! Core of the counselling-response prediction service: model registry, scoring,
//! running metrics, plus the config/tracing/health plumbing shared by the service binary.

pub mod artifact;
pub mod config;
pub mod error;
pub mod model_registry;
pub mod prediction_metrics;
pub mod scoring;
pub mod service;
pub mod telemetry;

pub use artifact::{ArtifactStore, Classifier, FsArtifactStore, LinearTextModel, ModelArtifact};
pub use config::{load_config, load_config_from, ServiceConfig};
pub use error::{ModelLoadError, PredictError, RegistryError, ScoringError};
pub use model_registry::{ModelRegistry, ResolvedModel, VersionListing};
pub use prediction_metrics::{MetricsAggregator, MetricsRecorder, MetricsSnapshot};
pub use scoring::{interpretation, margin, score_distribution, score_text, Score, POSITIVE_CLASS};
pub use service::{ModelService, Prediction};
pub use telemetry::{clear_ready, counters, init_tracing, mark_ready, start_health_server};
