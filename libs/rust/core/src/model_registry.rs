//! Registry of loaded model artifacts keyed by version, with a movable "current" pointer.
//!
//! Mapping and current pointer live behind one lock so a swap is observed all-or-nothing.

use crate::artifact::{ArtifactStore, ModelArtifact};
use crate::error::{ModelLoadError, RegistryError};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct VersionListing {
    pub current_version: Option<String>,
    pub available_versions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedModel {
    pub version: String,
    pub artifact: ModelArtifact,
}

#[derive(Default)]
struct RegistryState {
    models: HashMap<String, ModelArtifact>,
    current: Option<String>,
}

impl RegistryState {
    fn available(&self) -> Vec<String> {
        let mut v: Vec<String> = self.models.keys().cloned().collect();
        v.sort();
        v
    }
}

pub struct ModelRegistry {
    store: Arc<dyn ArtifactStore>,
    state: RwLock<RegistryState>,
}

impl ModelRegistry {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store, state: RwLock::new(RegistryState::default()) }
    }

    /// Scan the store and insert every artifact found. The first loaded version becomes
    /// current if none is set. Any unreadable artifact aborts the scan without touching state.
    pub fn load_all(&self) -> Result<usize, ModelLoadError> {
        let mut loaded = Vec::new();
        for (version, path) in self.store.list()? {
            info!(path = %path.display(), "loading model");
            let artifact = self.store.load(&path)?;
            loaded.push((version, artifact));
        }
        let count = loaded.len();
        let mut st = self.state.write();
        for (version, artifact) in loaded {
            if st.models.insert(version.clone(), artifact).is_some() {
                warn!(%version, "duplicate model version, later file wins");
            }
            if st.current.is_none() { st.current = Some(version.clone()); }
            info!(%version, "loaded model version");
        }
        Ok(count)
    }

    /// Startup gate: an empty registry must not serve.
    pub fn ensure_loaded(&self) -> Result<(), RegistryError> {
        if self.state.read().models.is_empty() {
            return Err(RegistryError::NoModelsAvailable { dir: self.store.location() });
        }
        Ok(())
    }

    /// Point `current` at an already loaded version. Returns false if it is not present.
    pub fn prefer(&self, version: &str) -> bool {
        let mut st = self.state.write();
        if !st.models.contains_key(version) { return false; }
        st.current = Some(version.to_string());
        true
    }

    pub fn resolve(&self, requested: Option<&str>) -> Result<ResolvedModel, RegistryError> {
        let st = self.state.read();
        let explicit = requested.filter(|v| !v.is_empty());
        let version = match explicit {
            Some(v) => v.to_string(),
            None => st.current.clone().ok_or(RegistryError::NoCurrentVersion)?,
        };
        match st.models.get(&version) {
            Some(artifact) => Ok(ResolvedModel { version, artifact: artifact.clone() }),
            None if explicit.is_some() => Err(RegistryError::UnknownVersion { version, available: st.available() }),
            None => Err(RegistryError::NoCurrentVersion),
        }
    }

    /// Insert (or overwrite) `version` and make it current in one critical section.
    pub fn set_current(&self, version: &str, artifact: ModelArtifact) {
        let mut st = self.state.write();
        st.models.insert(version.to_string(), artifact);
        st.current = Some(version.to_string());
    }

    /// Load `version` from its conventional path and make it current. State is untouched on failure.
    pub fn load_version(&self, version: &str) -> Result<(), ModelLoadError> {
        let path = self.store.path_for(version);
        if version.is_empty() || !version.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.') || version.contains("..") {
            return Err(ModelLoadError::Invalid { path, reason: format!("malformed version {version:?}") });
        }
        let artifact = self.store.load(&path)?;
        self.set_current(version, artifact);
        info!(%version, path = %path.display(), "model version activated");
        Ok(())
    }

    pub fn list_versions(&self) -> VersionListing {
        let st = self.state.read();
        VersionListing { current_version: st.current.clone(), available_versions: st.available() }
    }

    pub fn current_version(&self) -> Option<String> { self.state.read().current.clone() }
}
