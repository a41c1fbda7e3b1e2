//! Server configuration

use anyhow::Result;
use risk_lib::artifacts::DEFAULT_MAX_MODEL_BYTES;
use serde::Deserialize;
use std::path::PathBuf;

/// Environment variable prefix, e.g. `RISK_API_PORT`
const ENV_PREFIX: &str = "RISK";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// HTTP port for the prediction, health and metrics endpoints
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Directory holding model artifacts and their scalers
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,

    /// SQLite prediction log
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Artifact to load at startup; the store's default selection otherwise
    #[serde(default)]
    pub default_model: Option<String>,

    #[serde(default = "default_max_model_bytes")]
    pub max_model_bytes: u64,
}

fn default_api_port() -> u16 {
    8000
}

fn default_models_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_database_path() -> PathBuf {
    PathBuf::from("accident_risk.db")
}

fn default_max_model_bytes() -> u64 {
    DEFAULT_MAX_MODEL_BYTES
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            models_dir: default_models_dir(),
            database_path: default_database_path(),
            default_model: None,
            max_model_bytes: default_max_model_bytes(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        Self::from_builder(
            config::Config::builder()
                .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true)),
        )
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self> {
        Ok(builder.build()?.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_builder(config::Config::builder()).unwrap();
        assert_eq!(config.api_port, 8000);
        assert_eq!(config.models_dir, PathBuf::from("models"));
        assert_eq!(config.default_model, None);
        assert_eq!(config.max_model_bytes, DEFAULT_MAX_MODEL_BYTES);
    }

    #[test]
    fn test_overrides() {
        let builder = config::Config::builder()
            .set_override("api_port", 9001)
            .unwrap()
            .set_override("default_model", "best_lightgbm_model.onnx")
            .unwrap();
        let config = ServerConfig::from_builder(builder).unwrap();
        assert_eq!(config.api_port, 9001);
        assert_eq!(
            config.default_model.as_deref(),
            Some("best_lightgbm_model.onnx")
        );
    }
}
