//! HTTP API for predictions, model management, health checks and metrics

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use risk_lib::{
    health::{components, ComponentStatus, HealthRegistry},
    logstore::{FeatureMetadata, PerformanceRow, PredictionRecord, SystemCounts},
    predictor::InferenceStrategy,
    ModelFamily, ModelStore, PredictionLog, PredictionOrchestrator, RawInput, RiskError,
    RiskMetrics, RiskTier, SessionContext, StructuredLogger,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};

const DEFAULT_HISTORY_LIMIT: usize = 10;
const MAX_HISTORY_LIMIT: usize = 1000;

/// Shared application state
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: RiskMetrics,
    pub logger: StructuredLogger,
    store: ModelStore,
    log: Arc<dyn PredictionLog>,
    orchestrator: PredictionOrchestrator,
    session: RwLock<Option<Arc<SessionContext>>>,
}

impl AppState {
    pub fn new(
        health_registry: HealthRegistry,
        store: ModelStore,
        log: Arc<dyn PredictionLog>,
        logger: StructuredLogger,
    ) -> Self {
        let orchestrator = PredictionOrchestrator::new()
            .with_log(log.clone())
            .with_logger(logger.clone());
        Self {
            health_registry,
            metrics: RiskMetrics::new(),
            logger,
            store,
            log,
            orchestrator,
            session: RwLock::new(None),
        }
    }

    pub async fn session(&self) -> Option<Arc<SessionContext>> {
        self.session.read().await.clone()
    }

    /// Load an artifact into a fresh session, replacing the current one
    pub async fn load_model(&self, filename: &str) -> Result<Arc<SessionContext>, RiskError> {
        let store = self.store.clone();
        let name = filename.to_string();
        let artifact = tokio::task::spawn_blocking(move || store.load(&name))
            .await
            .map_err(|e| RiskError::Configuration(format!("model loading task failed: {}", e)))??;

        let scaled = artifact.scaler.is_some();
        let session = Arc::new(artifact.into_session());

        self.metrics
            .set_model_info(session.model_name(), session.family(), session.model_version());
        self.logger.log_model_loaded(
            session.model_name(),
            session.family(),
            session.model_version(),
            scaled,
        );
        self.health_registry.set_healthy(components::MODEL_STORE).await;
        self.health_registry.set_healthy(components::PREDICTOR).await;

        *self.session.write().await = Some(session.clone());
        Ok(session)
    }
}

/// Error body with the status the failure maps to
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(err: RiskError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: err.to_string(),
        }
    }
}

impl From<RiskError> for ApiError {
    fn from(err: RiskError) -> Self {
        let status = match &err {
            RiskError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RiskError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoadedModel {
    pub name: String,
    pub family: ModelFamily,
    pub version: String,
    pub scaler: bool,
    pub session_id: String,
}

impl From<&SessionContext> for LoadedModel {
    fn from(session: &SessionContext) -> Self {
        Self {
            name: session.model_name().to_string(),
            family: session.family(),
            version: session.model_version().to_string(),
            scaler: session.scaler().is_some(),
            session_id: session.session_id().to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub models: Vec<String>,
    pub default: Option<String>,
    pub loaded: Option<LoadedModel>,
}

#[derive(Debug, Deserialize)]
pub struct LoadRequest {
    pub filename: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub raw_score: f64,
    pub clamped_score: f64,
    pub risk_tier: RiskTier,
    pub family: ModelFamily,
    pub model: String,
    pub session_id: String,
    pub strategy: InferenceStrategy,
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub counts: SystemCounts,
    pub available_models: usize,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// Health check response - returns 200 if operational, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

async fn list_models(State(state): State<Arc<AppState>>) -> Result<Json<ModelsResponse>, ApiError> {
    let models = state.store.list()?;
    let default = ModelStore::default_selection(&models).map(str::to_string);
    let loaded = state.session().await.map(|s| LoadedModel::from(s.as_ref()));
    Ok(Json(ModelsResponse {
        models,
        default,
        loaded,
    }))
}

async fn load_model(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoadRequest>,
) -> Result<Json<LoadedModel>, ApiError> {
    let session = state
        .load_model(&request.filename)
        .await
        .map_err(ApiError::bad_request)?;
    Ok(Json(LoadedModel::from(session.as_ref())))
}

async fn predict(
    State(state): State<Arc<AppState>>,
    Json(raw): Json<RawInput>,
) -> Result<Json<PredictResponse>, ApiError> {
    raw.validate()?;

    let session = state.session().await;
    let orchestrator = state.orchestrator.clone();
    let outcome =
        tokio::task::spawn_blocking(move || orchestrator.predict(session.as_deref(), &raw))
            .await
            .map_err(|e| RiskError::Inference(format!("prediction task failed: {}", e)))??;
    let warnings = outcome.warning_messages();

    Ok(Json(PredictResponse {
        raw_score: outcome.result.raw_score,
        clamped_score: outcome.result.clamped_score,
        risk_tier: outcome.result.risk_tier,
        family: outcome.family,
        model: outcome.model,
        session_id: outcome.session_id,
        strategy: outcome.strategy,
        warnings,
    }))
}

async fn stats(State(state): State<Arc<AppState>>) -> Result<Json<StatsResponse>, ApiError> {
    let counts = state.log.counts()?;
    let available_models = state.store.list().map(|m| m.len()).unwrap_or(0);
    Ok(Json(StatsResponse {
        counts,
        available_models,
    }))
}

async fn performance(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<PerformanceRow>>, ApiError> {
    Ok(Json(state.log.active_performance()?))
}

async fn predictions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<PredictionRecord>>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT);
    Ok(Json(state.log.recent_predictions(limit)?))
}

async fn features(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<FeatureMetadata>>, ApiError> {
    Ok(Json(state.log.feature_metadata()?))
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/v1/models", get(list_models))
        .route("/api/v1/models/load", post(load_model))
        .route("/api/v1/predict", post(predict))
        .route("/api/v1/stats", get(stats))
        .route("/api/v1/performance", get(performance))
        .route("/api/v1/predictions", get(predictions))
        .route("/api/v1/features", get(features))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
