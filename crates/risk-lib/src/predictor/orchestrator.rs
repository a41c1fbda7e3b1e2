//! Prediction orchestration
//!
//! Drives synthesize -> enforce -> scale -> infer for one raw input, then
//! clamps, classifies and logs the result. Only a missing model or an
//! exhausted inference chain ends a request without a score.

use super::features::synthesize;
use super::output::{clamp_score, logistic};
use super::scaler::apply_scaler;
use super::schema::enforce;
use super::session::SessionContext;
use super::Model;
use crate::error::{Result, RiskError};
use crate::logstore::{NewPrediction, PredictionLog, FALLBACK_MODEL_CONFIG_ID};
use crate::models::{FeatureVector, ModelFamily, PredictionResult, RawInput, RiskTier};
use crate::observability::{RiskMetrics, StructuredLogger};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Which inference call produced the score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferenceStrategy {
    Direct,
    Probability,
    Margin,
}

impl InferenceStrategy {
    /// Order tried for families with a fallback chain
    const CHAIN: &'static [InferenceStrategy] = &[
        InferenceStrategy::Direct,
        InferenceStrategy::Probability,
        InferenceStrategy::Margin,
    ];
    const DIRECT_ONLY: &'static [InferenceStrategy] = &[InferenceStrategy::Direct];

    pub fn as_str(self) -> &'static str {
        match self {
            InferenceStrategy::Direct => "direct",
            InferenceStrategy::Probability => "probability",
            InferenceStrategy::Margin => "margin",
        }
    }

    fn chain_for(family: ModelFamily) -> &'static [InferenceStrategy] {
        match family {
            ModelFamily::Xgboost => Self::CHAIN,
            _ => Self::DIRECT_ONLY,
        }
    }

    fn score(self, model: &dyn Model, vector: &FeatureVector) -> Result<f64> {
        let score = match self {
            InferenceStrategy::Direct => first(model.predict(vector)?, "prediction")?,
            InferenceStrategy::Probability => {
                let row = model
                    .predict_proba(vector)?
                    .into_iter()
                    .next()
                    .ok_or_else(|| RiskError::Inference("empty probability output".into()))?;
                // Column 1 is the positive class whenever there is more than one
                let column = if row.len() > 1 { 1 } else { 0 };
                row.get(column).copied().ok_or_else(|| {
                    RiskError::Inference("probability row has no columns".into())
                })?
            }
            InferenceStrategy::Margin => {
                logistic(first(model.predict_margin(vector)?, "margin")?)
            }
        };
        if !score.is_finite() {
            return Err(RiskError::Inference(format!("non-finite score: {}", score)));
        }
        Ok(score)
    }
}

impl fmt::Display for InferenceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn first(values: Vec<f64>, what: &str) -> Result<f64> {
    values
        .into_iter()
        .next()
        .ok_or_else(|| RiskError::Inference(format!("empty {} output", what)))
}

/// A served prediction with everything that went wrong on the way
#[derive(Debug)]
pub struct PredictionOutcome {
    pub result: PredictionResult,
    pub family: ModelFamily,
    pub model: String,
    pub session_id: String,
    pub strategy: InferenceStrategy,
    pub warnings: Vec<RiskError>,
}

impl PredictionOutcome {
    pub fn warning_messages(&self) -> Vec<String> {
        self.warnings.iter().map(ToString::to_string).collect()
    }
}

#[derive(Clone)]
pub struct PredictionOrchestrator {
    log: Option<Arc<dyn PredictionLog>>,
    metrics: RiskMetrics,
    logger: StructuredLogger,
}

impl Default for PredictionOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl PredictionOrchestrator {
    pub fn new() -> Self {
        Self {
            log: None,
            metrics: RiskMetrics::new(),
            logger: StructuredLogger::new(env!("CARGO_PKG_NAME")),
        }
    }

    /// Persist every served prediction to this log
    pub fn with_log(mut self, log: Arc<dyn PredictionLog>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Predict the accident risk of one validated input.
    ///
    /// Fails with `Configuration` when no model is loaded and with
    /// `Inference` when every strategy available to the family failed.
    pub fn predict(
        &self,
        session: Option<&SessionContext>,
        raw: &RawInput,
    ) -> Result<PredictionOutcome> {
        let start = Instant::now();
        let outcome = self.run(session, raw);
        match &outcome {
            Ok(outcome) => {
                self.metrics.inc_predictions(outcome.result.risk_tier);
                for warning in &outcome.warnings {
                    self.metrics.record_warning(outcome.family, warning);
                }
            }
            Err(_) => self.metrics.inc_prediction_errors(),
        }
        self.metrics
            .observe_prediction_latency(start.elapsed().as_secs_f64());
        outcome
    }

    fn run(&self, session: Option<&SessionContext>, raw: &RawInput) -> Result<PredictionOutcome> {
        let session = session.ok_or_else(|| {
            RiskError::Configuration("no model artifact is loaded".to_string())
        })?;
        let family = session.family();

        let synthesized = synthesize(raw, family);
        let enforced = enforce(synthesized, family);
        let mut warnings = enforced.warnings;

        let scaled = apply_scaler(enforced.vector, session.scaler(), family);
        warnings.extend(scaled.warning);

        let (raw_score, strategy) =
            self.infer(session.model(), &scaled.vector, family, &mut warnings)?;
        let clamped_score = clamp_score(raw_score);
        let result = PredictionResult {
            raw_score,
            clamped_score,
            risk_tier: RiskTier::from_score(clamped_score),
        };

        if let Err(e) = self.persist(session, raw, &result) {
            self.logger.log_persistence_failure(session.session_id(), &e);
            warnings.push(if e.is_recoverable() {
                e
            } else {
                RiskError::Persistence(e.to_string())
            });
        }

        self.logger.log_prediction(
            session.session_id(),
            session.model_name(),
            family,
            strategy.as_str(),
            raw_score,
            clamped_score,
            result.risk_tier,
            warnings.len(),
        );

        Ok(PredictionOutcome {
            result,
            family,
            model: session.model_name().to_string(),
            session_id: session.session_id().to_string(),
            strategy,
            warnings,
        })
    }

    /// Walk the family's strategy chain; recovered failures become warnings
    fn infer(
        &self,
        model: &dyn Model,
        vector: &FeatureVector,
        family: ModelFamily,
        warnings: &mut Vec<RiskError>,
    ) -> Result<(f64, InferenceStrategy)> {
        let chain = InferenceStrategy::chain_for(family);
        let mut failures: Vec<String> = Vec::new();

        for (i, strategy) in chain.iter().copied().enumerate() {
            match strategy.score(model, vector) {
                Ok(score) => {
                    debug!(family = %family, strategy = %strategy, score = score, "Inference succeeded");
                    warnings.extend(failures.into_iter().map(RiskError::Inference));
                    return Ok((score, strategy));
                }
                Err(e) => {
                    let error = match e {
                        RiskError::Inference(msg) => msg,
                        other => other.to_string(),
                    };
                    if i + 1 < chain.len() {
                        warn!(
                            family = %family,
                            strategy = %strategy,
                            error = %error,
                            "Inference failed, trying next strategy"
                        );
                        self.metrics.inc_inference_fallback(strategy.as_str());
                    }
                    failures.push(format!("{}: {}", strategy, error));
                }
            }
        }

        Err(RiskError::Inference(failures.join("; ")))
    }

    fn persist(
        &self,
        session: &SessionContext,
        raw: &RawInput,
        result: &PredictionResult,
    ) -> Result<()> {
        let Some(log) = &self.log else {
            return Ok(());
        };
        let model_config_id = log.active_model_id()?.unwrap_or(FALLBACK_MODEL_CONFIG_ID);
        log.insert_prediction(&NewPrediction {
            model_config_id,
            input_features: serde_json::to_string(raw)?,
            predicted_risk: result.clamped_score,
            risk_level: result.risk_tier,
            session_id: session.session_id().to_string(),
        })?;
        Ok(())
    }
}
