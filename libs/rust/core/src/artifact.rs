//! Model artifacts and the filesystem store they are loaded from.
//!
//! An artifact is anything implementing [`Classifier`]; the registry never looks inside it.
//! The on-disk format is a JSON linear text classifier, named `<prefix>_<version>.<ext>`.

use crate::error::{ModelLoadError, ScoringError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Scores free text into a probability distribution over a fixed class ordering.
pub trait Classifier: Send + Sync + Debug {
    fn predict_proba(&self, text: &str) -> Result<Vec<f64>, ScoringError>;
}

/// Shared, immutable handle to a loaded model.
pub type ModelArtifact = Arc<dyn Classifier>;

fn default_lowercase() -> bool { true }

/// Bag-of-tokens linear model: per-class intercepts plus per-token class weights, softmaxed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearTextModel {
    pub classes: Vec<String>,
    pub intercept: Vec<f64>,
    #[serde(default)]
    pub coefficients: HashMap<String, Vec<f64>>,
    #[serde(default = "default_lowercase")]
    pub lowercase: bool,
}

impl LinearTextModel {
    fn validate(&self) -> Result<(), String> {
        let n = self.classes.len();
        if self.intercept.len() != n {
            return Err(format!("intercept has {} entries for {} classes", self.intercept.len(), n));
        }
        if let Some((tok, row)) = self.coefficients.iter().find(|(_, row)| row.len() != n) {
            return Err(format!("coefficient row for {tok:?} has {} entries for {} classes", row.len(), n));
        }
        Ok(())
    }

    fn tokens<'a>(&self, text: &'a str) -> impl Iterator<Item = String> + 'a {
        let lowercase = self.lowercase;
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(move |t| if lowercase { t.to_lowercase() } else { t.to_string() })
    }
}

impl Classifier for LinearTextModel {
    fn predict_proba(&self, text: &str) -> Result<Vec<f64>, ScoringError> {
        if self.classes.len() < 2 { return Err(ScoringError::Degenerate(self.classes.len())); }
        let mut logits = self.intercept.clone();
        for tok in self.tokens(text) {
            if let Some(weights) = self.coefficients.get(&tok) {
                for (l, w) in logits.iter_mut().zip(weights) { *l += w; }
            }
        }
        softmax(&mut logits);
        if logits.iter().any(|p| !p.is_finite()) { return Err(ScoringError::NonFinite); }
        Ok(logits)
    }
}

fn softmax(v: &mut [f64]) {
    if v.is_empty() { return; }
    let max = v.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mut sum = 0.0;
    for x in v.iter_mut() { *x = (*x - max).exp(); sum += *x; }
    if sum > 0.0 { for x in v.iter_mut() { *x /= sum; } }
}

/// Where artifacts live. The registry only needs to enumerate and load them.
pub trait ArtifactStore: Send + Sync {
    /// `(version, path)` pairs in a stable order. A missing directory yields an empty list.
    fn list(&self) -> Result<Vec<(String, PathBuf)>, ModelLoadError>;
    fn path_for(&self, version: &str) -> PathBuf;
    fn load(&self, path: &Path) -> Result<ModelArtifact, ModelLoadError>;
    fn location(&self) -> PathBuf;
}

#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    dir: PathBuf,
    prefix: String,
    extension: String,
}

impl FsArtifactStore {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, extension: impl Into<String>) -> Self {
        Self { dir: dir.into(), prefix: prefix.into(), extension: extension.into() }
    }

    /// Version encoded in a file name: last `_`-separated segment of the stem.
    pub fn version_of(&self, path: &Path) -> Option<String> {
        if path.extension().and_then(|e| e.to_str()) != Some(self.extension.as_str()) { return None; }
        let stem = path.file_stem()?.to_str()?;
        if !stem.starts_with(&format!("{}_", self.prefix)) { return None; }
        stem.rsplit('_').next().filter(|v| !v.is_empty()).map(str::to_string)
    }
}

impl ArtifactStore for FsArtifactStore {
    fn list(&self) -> Result<Vec<(String, PathBuf)>, ModelLoadError> {
        if !self.dir.is_dir() {
            warn!(dir = %self.dir.display(), "models directory not found");
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(&self.dir).map_err(|source| ModelLoadError::Io { path: self.dir.clone(), source })?;
        let mut found = Vec::new();
        for entry in entries {
            let path = entry.map_err(|source| ModelLoadError::Io { path: self.dir.clone(), source })?.path();
            if !path.is_file() { continue; }
            match self.version_of(&path) {
                Some(v) => found.push((v, path)),
                None => debug!(path = %path.display(), "skipping non-model file"),
            }
        }
        found.sort_by(|a, b| a.1.cmp(&b.1));
        Ok(found)
    }

    fn path_for(&self, version: &str) -> PathBuf {
        self.dir.join(format!("{}_{}.{}", self.prefix, version, self.extension))
    }

    fn load(&self, path: &Path) -> Result<ModelArtifact, ModelLoadError> {
        if !path.is_file() { return Err(ModelLoadError::NotFound { path: path.to_path_buf() }); }
        let text = std::fs::read_to_string(path).map_err(|source| ModelLoadError::Io { path: path.to_path_buf(), source })?;
        let model: LinearTextModel = serde_json::from_str(&text).map_err(|source| ModelLoadError::Parse { path: path.to_path_buf(), source })?;
        model.validate().map_err(|reason| ModelLoadError::Invalid { path: path.to_path_buf(), reason })?;
        Ok(Arc::new(model))
    }

    fn location(&self) -> PathBuf { self.dir.clone() }
}
