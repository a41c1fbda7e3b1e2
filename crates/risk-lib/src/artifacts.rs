//! Model artifact store
//!
//! A flat directory of trained models. `.onnx` graphs run through tract,
//! `.json` files hold linear coefficients. A model may have a fitted scaler
//! next to it (`<stem>_scaler.json`) and a metadata sidecar
//! (`<stem>.meta.json`) naming its family explicitly.

use crate::error::{Result, RiskError};
use crate::models::{ModelFamily, RawInput};
use crate::predictor::{LinearModel, Model, OnnxModel, Scaler, SessionContext, StandardScaler};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default maximum artifact size in bytes
pub const DEFAULT_MAX_MODEL_BYTES: u64 = 64 * 1024 * 1024;

const SCALER_SUFFIX: &str = "_scaler.json";
const META_SUFFIX: &str = ".meta.json";

#[derive(Debug, Deserialize)]
struct ArtifactMeta {
    family: ModelFamily,
}

/// A loaded model ready to be placed in a session
pub struct LoadedArtifact {
    pub name: String,
    pub family: ModelFamily,
    /// SHA-256 of the artifact bytes, hex encoded
    pub checksum: String,
    pub model: Arc<dyn Model>,
    pub scaler: Option<Arc<dyn Scaler>>,
}

impl LoadedArtifact {
    pub fn into_session(self) -> SessionContext {
        let ctx = SessionContext::new(self.name, self.family, self.model).with_version(self.checksum);
        match self.scaler {
            Some(scaler) => ctx.with_scaler(scaler),
            None => ctx,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
    max_model_bytes: u64,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_model_bytes: DEFAULT_MAX_MODEL_BYTES,
        }
    }

    pub fn with_max_model_bytes(mut self, max_model_bytes: u64) -> Self {
        self.max_model_bytes = max_model_bytes;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Model artifacts in the directory, sorted by name
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            RiskError::Configuration(format!(
                "models directory {} is not readable: {}",
                self.dir.display(),
                e
            ))
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if is_model_artifact(&name) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Preselected model: first lightgbm, else last xgboost, else the first listed
    pub fn default_selection(names: &[String]) -> Option<&str> {
        let lower = |name: &&String| name.to_lowercase();
        names
            .iter()
            .find(|name| lower(name).contains("lightgbm"))
            .or_else(|| names.iter().rev().find(|name| lower(name).contains("xgboost")))
            .or_else(|| names.first())
            .map(String::as_str)
    }

    /// Load an artifact by file name, with its scaler if one sits next to it
    pub fn load(&self, filename: &str) -> Result<LoadedArtifact> {
        if filename.is_empty() || Path::new(filename).file_name() != Some(OsStr::new(filename)) {
            return Err(RiskError::Configuration(format!(
                "'{}' is not a plain artifact file name",
                filename
            )));
        }
        if !is_model_artifact(filename) {
            return Err(RiskError::Configuration(format!(
                "'{}' is not a model artifact",
                filename
            )));
        }

        let path = self.dir.join(filename);
        let size = fs::metadata(&path)
            .map_err(|e| RiskError::Configuration(format!("model '{}' not found: {}", filename, e)))?
            .len();
        if size > self.max_model_bytes {
            return Err(RiskError::Configuration(format!(
                "model '{}' is {} bytes, maximum is {}",
                filename, size, self.max_model_bytes
            )));
        }

        let bytes = fs::read(&path)?;
        let checksum = compute_checksum(&bytes);
        let stem = artifact_stem(filename);
        let family = self.resolve_family(filename, stem)?;

        let model: Arc<dyn Model> = match extension(filename).as_deref() {
            Some("onnx") => {
                let n_features = family
                    .expected_features_count()
                    .unwrap_or(RawInput::FIELD_COUNT);
                Arc::new(OnnxModel::from_bytes(&bytes, n_features)?)
            }
            Some("json") => Arc::new(LinearModel::from_json(&bytes).map_err(|e| {
                RiskError::Configuration(format!("model '{}' is not a linear model: {}", filename, e))
            })?),
            _ => {
                return Err(RiskError::Configuration(format!(
                    "unsupported artifact format '{}'",
                    filename
                )))
            }
        };

        let scaler = self.load_scaler(stem, family);

        info!(
            model = %filename,
            family = %family,
            checksum = %checksum,
            size = size,
            scaler = scaler.is_some(),
            "Model artifact loaded"
        );

        Ok(LoadedArtifact {
            name: filename.to_string(),
            family,
            checksum,
            model,
            scaler,
        })
    }

    /// Sidecar metadata wins over filename sniffing
    fn resolve_family(&self, filename: &str, stem: &str) -> Result<ModelFamily> {
        let meta_path = self.dir.join(format!("{}{}", stem, META_SUFFIX));
        if !meta_path.is_file() {
            return Ok(ModelFamily::from_filename(filename));
        }
        let meta: ArtifactMeta = serde_json::from_slice(&fs::read(&meta_path)?).map_err(|e| {
            RiskError::Configuration(format!(
                "invalid metadata {}: {}",
                meta_path.display(),
                e
            ))
        })?;
        debug!(model = %filename, family = %meta.family, "Family taken from metadata sidecar");
        Ok(meta.family)
    }

    /// A scaler that cannot be read is skipped; the model still loads
    fn load_scaler(&self, stem: &str, family: ModelFamily) -> Option<Arc<dyn Scaler>> {
        let path = self.dir.join(format!("{}{}", stem, SCALER_SUFFIX));
        if !path.is_file() {
            return None;
        }

        let scaler = match fs::read(&path)
            .map_err(RiskError::from)
            .and_then(|bytes| StandardScaler::from_json(&bytes))
        {
            Ok(scaler) => scaler,
            Err(e) => {
                warn!(scaler = %path.display(), error = %e, "Ignoring unreadable scaler");
                return None;
            }
        };

        if let (Some(fitted), Some(expected)) =
            (scaler.n_features(), family.expected_features_count())
        {
            if fitted != expected {
                warn!(
                    scaler = %path.display(),
                    family = %family,
                    fitted = fitted,
                    expected = expected,
                    "Scaler was fitted on a different feature count; predictions will fall back to unscaled features"
                );
            }
        }
        Some(Arc::new(scaler))
    }
}

fn is_model_artifact(name: &str) -> bool {
    let lower = name.to_lowercase();
    if lower.contains("scaler") || lower.ends_with(META_SUFFIX) {
        return false;
    }
    matches!(extension(&lower).as_deref(), Some("onnx") | Some("json"))
}

fn extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
}

fn artifact_stem(filename: &str) -> &str {
    filename
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(filename)
}

/// Compute SHA256 checksum of artifact bytes
fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeatureVector;
    use tempfile::TempDir;

    const LINEAR: &str = r#"{"feature_names": ["curvature"], "coefficients": [0.5], "intercept": 0.1}"#;

    fn store_with(files: &[(&str, &str)]) -> (TempDir, ModelStore) {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            fs::write(dir.path().join(name), content).unwrap();
        }
        let store = ModelStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn test_compute_checksum() {
        assert_eq!(
            compute_checksum(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_list_filters_and_sorts() {
        let (dir, store) = store_with(&[
            ("best_xgboost_model.onnx", "x"),
            ("best_ridge_model.json", LINEAR),
            ("best_ridge_model_scaler.json", "{}"),
            ("best_ridge_model.meta.json", r#"{"family": "ridge"}"#),
            ("notes.txt", "ignore me"),
        ]);
        fs::create_dir(dir.path().join("archive.onnx")).unwrap();

        assert_eq!(
            store.list().unwrap(),
            vec!["best_ridge_model.json", "best_xgboost_model.onnx"]
        );
    }

    #[test]
    fn test_list_missing_directory() {
        let store = ModelStore::new("/nonexistent/models");
        assert!(matches!(store.list(), Err(RiskError::Configuration(_))));
    }

    #[test]
    fn test_default_selection() {
        let names = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        let with_lgbm = names(&["a_xgboost.onnx", "b_lightgbm.onnx", "c_lightgbm.onnx"]);
        assert_eq!(ModelStore::default_selection(&with_lgbm), Some("b_lightgbm.onnx"));

        let xgb_only = names(&["a_xgboost.onnx", "b_ridge.json", "c_xgboost.onnx"]);
        assert_eq!(ModelStore::default_selection(&xgb_only), Some("c_xgboost.onnx"));

        let neither = names(&["b_ridge.json", "c_lasso.json"]);
        assert_eq!(ModelStore::default_selection(&neither), Some("b_ridge.json"));

        assert_eq!(ModelStore::default_selection(&[]), None);
    }

    #[test]
    fn test_load_linear_model_with_scaler() {
        let (_dir, store) = store_with(&[
            ("best_ridge_model.json", LINEAR),
            (
                "best_ridge_model_scaler.json",
                r#"{"mean": [0,0,0,0,0,0,0,0,0,0], "scale": [1,1,1,1,1,1,1,1,1,1]}"#,
            ),
        ]);
        let artifact = store.load("best_ridge_model.json").unwrap();

        assert_eq!(artifact.family, ModelFamily::Ridge);
        assert_eq!(artifact.checksum, compute_checksum(LINEAR.as_bytes()));
        assert_eq!(artifact.scaler.as_ref().and_then(|s| s.n_features()), Some(10));

        let features = FeatureVector::from_columns(vec![crate::models::Column::new(
            "curvature",
            crate::models::FeatureValue::Number(0.4),
            crate::models::Dtype::Float64,
        )]);
        let score = artifact.model.predict(&features).unwrap()[0];
        assert!((score - 0.3).abs() < 1e-12);

        let session = artifact.into_session();
        assert_eq!(session.model_name(), "best_ridge_model.json");
        assert!(session.scaler().is_some());
    }

    #[test]
    fn test_sidecar_overrides_filename() {
        let (_dir, store) = store_with(&[
            ("lasso_vs_ridge.json", LINEAR),
            ("lasso_vs_ridge.meta.json", r#"{"family": "ridge"}"#),
        ]);
        assert_eq!(store.load("lasso_vs_ridge.json").unwrap().family, ModelFamily::Ridge);
    }

    #[test]
    fn test_invalid_sidecar_is_configuration_error() {
        let (_dir, store) = store_with(&[
            ("model.json", LINEAR),
            ("model.meta.json", r#"{"family": "svm"}"#),
        ]);
        assert!(matches!(store.load("model.json"), Err(RiskError::Configuration(_))));
    }

    #[test]
    fn test_unreadable_scaler_is_skipped() {
        let (_dir, store) = store_with(&[
            ("best_lasso_model.json", LINEAR),
            ("best_lasso_model_scaler.json", "not json"),
        ]);
        let artifact = store.load("best_lasso_model.json").unwrap();
        assert!(artifact.scaler.is_none());
    }

    #[test]
    fn test_size_guard() {
        let (_dir, store) = store_with(&[("best_ridge_model.json", LINEAR)]);
        let store = store.with_max_model_bytes(8);
        assert!(matches!(
            store.load("best_ridge_model.json"),
            Err(RiskError::Configuration(_))
        ));
    }

    #[test]
    fn test_rejects_paths_and_non_artifacts() {
        let (_dir, store) = store_with(&[("best_ridge_model_scaler.json", "{}")]);
        for name in ["../etc/passwd.json", "", "best_ridge_model_scaler.json", "missing.onnx"] {
            assert!(
                matches!(store.load(name), Err(RiskError::Configuration(_))),
                "{} should be rejected",
                name
            );
        }
    }

    #[test]
    fn test_corrupt_onnx_is_configuration_error() {
        let (_dir, store) = store_with(&[("best_lightgbm_model.onnx", "garbage")]);
        assert!(matches!(
            store.load("best_lightgbm_model.onnx"),
            Err(RiskError::Configuration(_))
        ));
    }
}
