//! Layered service configuration: defaults, optional file, then `COUNSEL__*` environment.

use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub service_name: String,
    pub host: String,
    pub port: u16,
    pub health_port: u16,
    pub model_dir: PathBuf,
    pub model_prefix: String,
    pub model_extension: String,
    /// Preferred current version at startup, if it is among the loaded ones.
    pub default_model_version: Option<String>,
    /// Confidence below this is logged and counted as low-confidence.
    pub performance_threshold: f64,
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service_name: "counsel-api".into(),
            host: "0.0.0.0".into(),
            port: 8000,
            health_port: 9090,
            model_dir: PathBuf::from("models"),
            model_prefix: "counselor_response_classifier".into(),
            model_extension: "json".into(),
            default_model_version: None,
            performance_threshold: 0.75,
            log_level: "info".into(),
        }
    }
}

/// Load from `COUNSEL_CONFIG_FILE` (if set) and the environment.
pub fn load_config(service: &str) -> Result<ServiceConfig> {
    let file = std::env::var("COUNSEL_CONFIG_FILE").ok().map(PathBuf::from);
    load_config_from(service, file.as_deref())
}

pub fn load_config_from(service: &str, file: Option<&Path>) -> Result<ServiceConfig> {
    let d = ServiceConfig::default();
    let mut builder = config::Config::builder()
        .set_default("service_name", service)?
        .set_default("host", d.host)?
        .set_default("port", d.port as i64)?
        .set_default("health_port", d.health_port as i64)?
        .set_default("model_dir", d.model_dir.to_string_lossy().to_string())?
        .set_default("model_prefix", d.model_prefix)?
        .set_default("model_extension", d.model_extension)?
        .set_default("performance_threshold", d.performance_threshold)?
        .set_default("log_level", d.log_level)?;
    if let Some(f) = file {
        builder = builder.add_source(config::File::from(f).required(false));
    }
    builder = builder.add_source(config::Environment::with_prefix("COUNSEL").separator("__"));
    let cfg: ServiceConfig = builder.build()?.try_deserialize()?;
    Ok(cfg)
}
