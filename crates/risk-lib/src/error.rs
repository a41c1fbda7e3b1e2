//! Error taxonomy for the prediction pipeline
//!
//! Only `Configuration` and an exhausted `Inference` terminate a request.
//! `SchemaMismatch`, `Transform` and `Persistence` are carried as warnings
//! next to a successful result.

/// Result type for risk-lib operations
pub type Result<T> = std::result::Result<T, RiskError>;

#[derive(Debug, thiserror::Error)]
pub enum RiskError {
    /// No usable model artifact, or an artifact that cannot be loaded
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Feature count mismatch for {family}: expected {expected}, got {actual}")]
    SchemaMismatch {
        family: String,
        expected: usize,
        actual: usize,
    },

    /// Scaler could not be applied to the live vector
    #[error("Scaler transform failed: {0}")]
    Transform(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Prediction log write failed: {0}")]
    Persistence(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Feature '{0}' is not numeric")]
    NonNumeric(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RiskError {
    /// True for the error kinds that never abort a prediction
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RiskError::SchemaMismatch { .. } | RiskError::Transform(_) | RiskError::Persistence(_)
        )
    }
}

impl From<rusqlite::Error> for RiskError {
    fn from(e: rusqlite::Error) -> Self {
        RiskError::Persistence(e.to_string())
    }
}
