//! Model backends
//!
//! `OnnxModel` runs exported tree ensembles and regressors through tract.
//! `LinearModel` evaluates a JSON-serialized linear regressor directly.

use super::Model;
use crate::error::{Result, RiskError};
use crate::models::FeatureVector;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tract_onnx::prelude::*;
use tracing::{debug, warn};

/// Maximum inference latency before warning
const MAX_INFERENCE_MS: u128 = 5;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// ONNX-based model using tract for lightweight inference
pub struct OnnxModel {
    plan: TractModel,
    n_features: usize,
}

impl OnnxModel {
    /// Load and optimize an ONNX model taking a `[1, n_features]` f32 input
    pub fn from_bytes(model_bytes: &[u8], n_features: usize) -> Result<Self> {
        let plan = Self::load_plan(model_bytes, n_features)
            .map_err(|e| RiskError::Configuration(format!("{:#}", e)))?;
        Ok(Self { plan, n_features })
    }

    fn load_plan(model_bytes: &[u8], n_features: usize) -> anyhow::Result<TractModel> {
        let model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_bytes))
            .context("Failed to parse ONNX model")?
            .with_input_fact(0, f32::fact([1, n_features]).into())
            .context("Failed to set input shape")?
            .into_optimized()
            .context("Failed to optimize model")?
            .into_runnable()
            .context("Failed to create runnable model")?;
        Ok(model)
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    fn run(&self, features: &FeatureVector) -> anyhow::Result<TVec<TValue>> {
        let row = features.to_f32_row()?;
        if row.len() != self.n_features {
            anyhow::bail!(
                "Model expects {} features, got {}",
                self.n_features,
                row.len()
            );
        }

        let start = Instant::now();
        let input: Tensor = tract_ndarray::Array2::from_shape_vec((1, self.n_features), row)?.into();
        let outputs = self.plan.run(tvec!(input.into()))?;

        let elapsed = start.elapsed();
        if elapsed.as_millis() > MAX_INFERENCE_MS {
            warn!(elapsed_ms = elapsed.as_millis(), "Inference exceeded {}ms target", MAX_INFERENCE_MS);
        } else {
            debug!(elapsed_us = elapsed.as_micros(), "Inference completed");
        }
        Ok(outputs)
    }

    fn output_rows(&self, features: &FeatureVector, index: usize) -> anyhow::Result<Vec<Vec<f64>>> {
        let outputs = self.run(features)?;
        let output = outputs
            .get(index)
            .with_context(|| format!("Model has no output {}", index))?;
        let view = output.to_array_view::<f32>()?;
        let width = if view.ndim() > 1 {
            view.shape()[view.ndim() - 1].max(1)
        } else {
            view.len().max(1)
        };
        let values: Vec<f64> = view.iter().map(|v| *v as f64).collect();
        Ok(values.chunks(width).map(|row| row.to_vec()).collect())
    }
}

impl Model for OnnxModel {
    fn predict(&self, features: &FeatureVector) -> Result<Vec<f64>> {
        let rows = self
            .output_rows(features, 0)
            .map_err(|e| RiskError::Inference(format!("{:#}", e)))?;
        Ok(rows.into_iter().flatten().collect())
    }

    /// Classifier exports carry probabilities as their second output
    fn predict_proba(&self, features: &FeatureVector) -> Result<Vec<Vec<f64>>> {
        self.output_rows(features, 1)
            .map_err(|e| RiskError::Inference(format!("{:#}", e)))
    }
}

/// Linear regressor serialized as JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    /// When present, coefficients bind to features by name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_names: Option<Vec<String>>,
    pub coefficients: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
}

impl LinearModel {
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let model: Self = serde_json::from_slice(bytes)?;
        if let Some(names) = &model.feature_names {
            if names.len() != model.coefficients.len() {
                return Err(RiskError::Configuration(format!(
                    "linear model has {} feature names but {} coefficients",
                    names.len(),
                    model.coefficients.len()
                )));
            }
        }
        Ok(model)
    }

    fn inputs(&self, features: &FeatureVector) -> Result<Vec<f64>> {
        match &self.feature_names {
            Some(names) => names
                .iter()
                .map(|name| {
                    features.number(name).ok_or_else(|| {
                        RiskError::Inference(format!("feature '{}' missing or not numeric", name))
                    })
                })
                .collect(),
            None => {
                let row = features.to_f64_row()?;
                if row.len() != self.coefficients.len() {
                    return Err(RiskError::Inference(format!(
                        "model expects {} features, got {}",
                        self.coefficients.len(),
                        row.len()
                    )));
                }
                Ok(row)
            }
        }
    }
}

impl Model for LinearModel {
    fn predict(&self, features: &FeatureVector) -> Result<Vec<f64>> {
        let inputs = self.inputs(features)?;
        let score = self
            .coefficients
            .iter()
            .zip(&inputs)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.intercept;
        Ok(vec![score])
    }

    /// A linear model's score is its own margin
    fn predict_margin(&self, features: &FeatureVector) -> Result<Vec<f64>> {
        self.predict(features)
    }
}
