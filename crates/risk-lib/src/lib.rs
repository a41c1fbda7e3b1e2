//! Library for accident-risk prediction
//!
//! This crate provides the core functionality for:
//! - Per-model-family feature synthesis and schema enforcement
//! - Tolerant feature scaling and model inference with fallbacks
//! - Model artifact discovery and loading
//! - Prediction logging to a relational store
//! - Health checks and observability

pub mod artifacts;
pub mod error;
pub mod health;
pub mod logstore;
pub mod models;
pub mod observability;
pub mod predictor;

pub use artifacts::{LoadedArtifact, ModelStore};
pub use error::{Result, RiskError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use logstore::{PredictionLog, SqliteLogStore};
pub use models::*;
pub use observability::{RiskMetrics, StructuredLogger};
pub use predictor::{PredictionOrchestrator, PredictionOutcome, SessionContext};
