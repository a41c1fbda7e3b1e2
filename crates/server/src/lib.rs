//! Accident risk prediction server
//!
//! Holds one explicit session context with the loaded model and serves the
//! prediction flow, model management and log queries over HTTP.

pub mod api;
pub mod config;

use api::AppState;
use config::ServerConfig;
use risk_lib::{
    health::{components, HealthRegistry},
    ModelStore, PredictionLog, SqliteLogStore, StructuredLogger,
};
use std::sync::Arc;
use tracing::{info, warn};

pub const SERVICE_NAME: &str = "risk-server";

/// Open the stores and load the startup model.
///
/// A missing or unloadable model leaves the predictor unhealthy but the
/// service still comes up; an unopenable database falls back to an
/// in-memory log.
pub async fn build_state(config: &ServerConfig) -> anyhow::Result<Arc<AppState>> {
    let health_registry = HealthRegistry::new();
    health_registry.register(components::MODEL_STORE).await;
    health_registry.register(components::PREDICTOR).await;
    health_registry.register(components::LOG_STORE).await;

    let log: Arc<dyn PredictionLog> = match SqliteLogStore::open(&config.database_path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!(
                path = %config.database_path.display(),
                error = %e,
                "Prediction log unavailable, keeping predictions in memory"
            );
            health_registry
                .set_degraded(components::LOG_STORE, format!("in-memory log: {}", e))
                .await;
            Arc::new(SqliteLogStore::in_memory()?)
        }
    };

    let store = ModelStore::new(&config.models_dir).with_max_model_bytes(config.max_model_bytes);
    let state = Arc::new(AppState::new(
        health_registry.clone(),
        store.clone(),
        log,
        StructuredLogger::new(SERVICE_NAME),
    ));

    let startup_model = match store.list() {
        Ok(models) => config
            .default_model
            .clone()
            .or_else(|| ModelStore::default_selection(&models).map(str::to_string)),
        Err(e) => {
            health_registry
                .set_unhealthy(components::MODEL_STORE, e.to_string())
                .await;
            None
        }
    };

    match startup_model {
        Some(filename) => {
            if let Err(e) = state.load_model(&filename).await {
                warn!(model = %filename, error = %e, "Startup model could not be loaded");
                health_registry
                    .set_unhealthy(components::PREDICTOR, e.to_string())
                    .await;
            }
        }
        None => {
            warn!(dir = %store.dir().display(), "No model artifact available");
            health_registry
                .set_unhealthy(components::PREDICTOR, "no model artifact found")
                .await;
        }
    }

    health_registry.set_ready(true).await;
    info!(
        model = ?state.session().await.map(|s| s.model_name().to_string()),
        "Service state initialised"
    );
    Ok(state)
}
