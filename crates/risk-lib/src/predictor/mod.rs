//! Risk prediction engine

pub mod features;
mod inference;
mod orchestrator;
mod output;
pub mod scaler;
pub mod schema;
mod session;

pub use features::{recipe, synthesize, FeatureRule, LANES_DIVISOR, SPEED_DIVISOR};
pub use inference::{LinearModel, OnnxModel};
pub use orchestrator::{InferenceStrategy, PredictionOutcome, PredictionOrchestrator};
pub use output::{clamp_score, logistic};
pub use scaler::{apply_scaler, StandardScaler};
pub use schema::{enforce, XGBOOST_FEATURE_ORDER};
pub use session::SessionContext;

use crate::error::{Result, RiskError};
use crate::models::FeatureVector;

/// Trait for trained model implementations
pub trait Model: Send + Sync {
    /// Direct score prediction; one value per row
    fn predict(&self, features: &FeatureVector) -> Result<Vec<f64>>;

    /// Class probabilities, one row of class columns per input row
    fn predict_proba(&self, _features: &FeatureVector) -> Result<Vec<Vec<f64>>> {
        Err(RiskError::Inference(
            "probability output not supported by this model".to_string(),
        ))
    }

    /// Untransformed margin output, one value per row
    fn predict_margin(&self, _features: &FeatureVector) -> Result<Vec<f64>> {
        Err(RiskError::Inference(
            "margin output not supported by this model".to_string(),
        ))
    }
}

/// Fitted numeric transform applied before inference
pub trait Scaler: Send + Sync {
    fn transform(&self, values: &[f64]) -> Result<Vec<f64>>;

    /// Number of features the scaler was fitted on, when known
    fn n_features(&self) -> Option<usize>;
}
