//! Error taxonomy for model lookup, loading and scoring.
//!
//! Registry and scorer operations return these as values; only the HTTP boundary
//! turns them into status codes.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Model version {version} not found. Available versions: {available:?}")]
    UnknownVersion { version: String, available: Vec<String> },
    #[error("No models loaded")]
    NoCurrentVersion,
    #[error("No models available in {}", dir.display())]
    NoModelsAvailable { dir: PathBuf },
}

#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("model file not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("failed to read {}: {source}", path.display())]
    Io { path: PathBuf, #[source] source: std::io::Error },
    #[error("failed to parse {}: {source}", path.display())]
    Parse { path: PathBuf, #[source] source: serde_json::Error },
    #[error("invalid model artifact {}: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },
}

#[derive(Debug, Error, PartialEq)]
pub enum ScoringError {
    #[error("model produced {0} class probabilities, need at least 2")]
    Degenerate(usize),
    #[error("model produced a non-finite probability distribution")]
    NonFinite,
}

/// Failure of a `/predict` request: either the lookup or the scoring step.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error(transparent)]
    Lookup(#[from] RegistryError),
    #[error(transparent)]
    Scoring(#[from] ScoringError),
}
