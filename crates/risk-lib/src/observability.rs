//! Observability infrastructure for the prediction service
//!
//! Provides:
//! - Prometheus metrics (prediction latency, outcomes, degraded-path counters, model info)
//! - Structured JSON logging with tracing

use crate::error::RiskError;
use crate::models::{ModelFamily, RiskTier};
use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_counter_vec,
    GaugeVec, Histogram, IntCounter, IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<RiskMetricsInner> = OnceLock::new();

struct RiskMetricsInner {
    prediction_latency_seconds: Histogram,
    predictions: IntCounterVec,
    prediction_errors: IntCounter,
    schema_mismatches: IntCounterVec,
    scaler_fallbacks: IntCounterVec,
    inference_fallbacks: IntCounterVec,
    persistence_failures: IntCounter,
    model_info: GaugeVec,
}

impl RiskMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram!(
                "accident_risk_prediction_latency_seconds",
                "End-to-end time of one prediction request",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            predictions: register_int_counter_vec!(
                "accident_risk_predictions_total",
                "Predictions produced, by risk tier",
                &["tier"]
            )
            .expect("Failed to register predictions_total"),

            prediction_errors: register_int_counter!(
                "accident_risk_prediction_errors_total",
                "Prediction requests that ended in an error"
            )
            .expect("Failed to register prediction_errors_total"),

            schema_mismatches: register_int_counter_vec!(
                "accident_risk_schema_mismatches_total",
                "Feature vectors whose width differed from the declared count",
                &["family"]
            )
            .expect("Failed to register schema_mismatches_total"),

            scaler_fallbacks: register_int_counter_vec!(
                "accident_risk_scaler_fallbacks_total",
                "Predictions that proceeded with unscaled features",
                &["family"]
            )
            .expect("Failed to register scaler_fallbacks_total"),

            inference_fallbacks: register_int_counter_vec!(
                "accident_risk_inference_fallbacks_total",
                "Inference attempts that failed and fell through to the next strategy",
                &["strategy"]
            )
            .expect("Failed to register inference_fallbacks_total"),

            persistence_failures: register_int_counter!(
                "accident_risk_persistence_failures_total",
                "Prediction log writes that failed"
            )
            .expect("Failed to register persistence_failures_total"),

            model_info: register_gauge_vec!(
                "accident_risk_model_info",
                "Information about the currently loaded model",
                &["model", "family", "version"]
            )
            .expect("Failed to register model_info"),
        }
    }
}

/// Lightweight handle to the global metrics instance.
/// Clones share the same underlying metrics.
#[derive(Clone)]
pub struct RiskMetrics {
    _private: (),
}

impl Default for RiskMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RiskMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(RiskMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &RiskMetricsInner {
        GLOBAL_METRICS.get_or_init(RiskMetricsInner::new)
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner().prediction_latency_seconds.observe(duration_secs);
    }

    pub fn inc_predictions(&self, tier: RiskTier) {
        self.inner()
            .predictions
            .with_label_values(&[tier.as_str()])
            .inc();
    }

    pub fn inc_prediction_errors(&self) {
        self.inner().prediction_errors.inc();
    }

    /// Count a non-fatal warning under the matching degraded-path counter
    pub fn record_warning(&self, family: ModelFamily, warning: &RiskError) {
        let inner = self.inner();
        match warning {
            RiskError::SchemaMismatch { .. } => inner
                .schema_mismatches
                .with_label_values(&[family.as_str()])
                .inc(),
            RiskError::Transform(_) => inner
                .scaler_fallbacks
                .with_label_values(&[family.as_str()])
                .inc(),
            RiskError::Persistence(_) => inner.persistence_failures.inc(),
            _ => {}
        }
    }

    pub fn inc_inference_fallback(&self, strategy: &str) {
        self.inner()
            .inference_fallbacks
            .with_label_values(&[strategy])
            .inc();
    }

    /// Replace the loaded-model info series
    pub fn set_model_info(&self, model: &str, family: ModelFamily, version: &str) {
        self.inner().model_info.reset();
        self.inner()
            .model_info
            .with_label_values(&[model, family.as_str(), version])
            .set(1.0);
    }
}

/// Structured logger for service events
#[derive(Clone)]
pub struct StructuredLogger {
    service: String,
}

impl StructuredLogger {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn log_startup(&self, version: &str, model: Option<&str>) {
        info!(
            event = "service_started",
            service = %self.service,
            version = %version,
            model = ?model,
            "Risk prediction service started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            service = %self.service,
            reason = %reason,
            "Risk prediction service shutting down"
        );
    }

    pub fn log_model_loaded(&self, model: &str, family: ModelFamily, version: &str, scaled: bool) {
        info!(
            event = "model_loaded",
            service = %self.service,
            model = %model,
            family = %family,
            model_version = %version,
            scaler = scaled,
            "Model artifact loaded"
        );
    }

    #[allow(clippy::too_many_arguments)]
    pub fn log_prediction(
        &self,
        session_id: &str,
        model: &str,
        family: ModelFamily,
        strategy: &str,
        raw_score: f64,
        clamped_score: f64,
        tier: RiskTier,
        warnings: usize,
    ) {
        info!(
            event = "prediction_generated",
            service = %self.service,
            session_id = %session_id,
            model = %model,
            family = %family,
            strategy = %strategy,
            raw_score = raw_score,
            clamped_score = clamped_score,
            risk_tier = %tier,
            warnings = warnings,
            "Generated accident risk prediction"
        );
    }

    pub fn log_persistence_failure(&self, session_id: &str, error: &RiskError) {
        warn!(
            event = "prediction_log_failed",
            service = %self.service,
            session_id = %session_id,
            error = %error,
            "Prediction was served but could not be logged"
        );
    }
}
