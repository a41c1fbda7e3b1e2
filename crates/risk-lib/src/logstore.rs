//! Prediction log and metadata store
//!
//! Append-only prediction rows plus read access to the static model
//! metadata and performance tables. Each statement auto-commits; rows are
//! independent, so no transaction discipline is needed.

use crate::error::{Result, RiskError};
use crate::models::RiskTier;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Config id logged when no model config is marked active
pub const FALLBACK_MODEL_CONFIG_ID: i64 = 1;

/// Prediction row to be appended
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPrediction {
    pub model_config_id: i64,
    /// Raw input serialized as JSON text
    pub input_features: String,
    pub predicted_risk: f64,
    pub risk_level: RiskTier,
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub id: i64,
    pub model_config_id: i64,
    pub input_features: String,
    pub predicted_risk: f64,
    pub risk_level: RiskTier,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemCounts {
    pub training_records: i64,
    pub model_configs: i64,
    pub predictions: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRow {
    pub model_name: String,
    pub dataset_type: String,
    pub mse: Option<f64>,
    pub r2_score: Option<f64>,
    pub mae: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMetadata {
    pub feature_name: String,
    pub feature_type: String,
    pub description: Option<String>,
}

/// Relational collaborator used for prediction logging and static metadata
pub trait PredictionLog: Send + Sync {
    fn active_model_id(&self) -> Result<Option<i64>>;

    /// Append one prediction row, returning its id
    fn insert_prediction(&self, prediction: &NewPrediction) -> Result<i64>;

    /// Most recent predictions first
    fn recent_predictions(&self, limit: usize) -> Result<Vec<PredictionRecord>>;

    fn counts(&self) -> Result<SystemCounts>;

    /// Performance rows of active model configs
    fn active_performance(&self) -> Result<Vec<PerformanceRow>>;

    fn feature_metadata(&self) -> Result<Vec<FeatureMetadata>>;
}

/// SQLite-backed prediction log
pub struct SqliteLogStore {
    conn: Mutex<Connection>,
}

impl SqliteLogStore {
    /// Open (or create) the store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// In-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RiskError::Persistence(format!("Lock poisoned: {}", e)))
    }

    fn init_schema(&self) -> Result<()> {
        self.conn()?.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS model_configs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                model_name TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS model_performance (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                model_config_id INTEGER NOT NULL REFERENCES model_configs(id),
                dataset_type TEXT NOT NULL,
                mse REAL,
                r2_score REAL,
                mae REAL
            );

            CREATE TABLE IF NOT EXISTS web_predictions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                model_config_id INTEGER NOT NULL,
                input_features TEXT NOT NULL,
                predicted_risk REAL NOT NULL,
                risk_level TEXT NOT NULL,
                session_id TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_web_predictions_created
                ON web_predictions(created_at DESC);

            CREATE TABLE IF NOT EXISTS training_data (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                input_features TEXT NOT NULL,
                accident_risk REAL NOT NULL
            );

            CREATE TABLE IF NOT EXISTS feature_metadata (
                feature_name TEXT PRIMARY KEY,
                feature_type TEXT NOT NULL,
                description TEXT
            );
            ",
        )?;
        Ok(())
    }

    /// Register a model config row, returning its id
    pub fn register_model_config(&self, model_name: &str, is_active: bool) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO model_configs (model_name, is_active) VALUES (?1, ?2)",
            params![model_name, is_active],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn record_performance(
        &self,
        model_config_id: i64,
        dataset_type: &str,
        mse: f64,
        r2_score: f64,
        mae: f64,
    ) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO model_performance (model_config_id, dataset_type, mse, r2_score, mae)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![model_config_id, dataset_type, mse, r2_score, mae],
        )?;
        Ok(())
    }

    pub fn upsert_feature_metadata(&self, metadata: &FeatureMetadata) -> Result<()> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO feature_metadata (feature_name, feature_type, description)
             VALUES (?1, ?2, ?3)",
            params![
                metadata.feature_name,
                metadata.feature_type,
                metadata.description
            ],
        )?;
        Ok(())
    }

    pub fn add_training_record(&self, input_features: &str, accident_risk: f64) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO training_data (input_features, accident_risk) VALUES (?1, ?2)",
            params![input_features, accident_risk],
        )?;
        Ok(())
    }
}

impl PredictionLog for SqliteLogStore {
    fn active_model_id(&self) -> Result<Option<i64>> {
        let id = self
            .conn()?
            .query_row(
                "SELECT id FROM model_configs WHERE is_active = 1 ORDER BY id LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn insert_prediction(&self, prediction: &NewPrediction) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO web_predictions
             (model_config_id, input_features, predicted_risk, risk_level, session_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                prediction.model_config_id,
                prediction.input_features,
                prediction.predicted_risk,
                prediction.risk_level.as_str(),
                prediction.session_id,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn recent_predictions(&self, limit: usize) -> Result<Vec<PredictionRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, model_config_id, input_features, predicted_risk, risk_level, session_id, created_at
             FROM web_predictions ORDER BY id DESC LIMIT ?1",
        )?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(
                |(id, model_config_id, input_features, predicted_risk, level, session_id, created)| {
                    let created_at = DateTime::parse_from_rfc3339(&created)
                        .map_err(|e| RiskError::Persistence(format!("bad timestamp: {}", e)))?
                        .with_timezone(&Utc);
                    Ok(PredictionRecord {
                        id,
                        model_config_id,
                        input_features,
                        predicted_risk,
                        risk_level: level.parse()?,
                        session_id,
                        created_at,
                    })
                },
            )
            .collect()
    }

    fn counts(&self) -> Result<SystemCounts> {
        let conn = self.conn()?;
        let count = |table: &str| -> Result<i64> {
            Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get(0)
            })?)
        };
        Ok(SystemCounts {
            training_records: count("training_data")?,
            model_configs: count("model_configs")?,
            predictions: count("web_predictions")?,
        })
    }

    fn active_performance(&self) -> Result<Vec<PerformanceRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT mc.model_name, mp.dataset_type, mp.mse, mp.r2_score, mp.mae
             FROM model_performance mp
             JOIN model_configs mc ON mp.model_config_id = mc.id
             WHERE mc.is_active = 1
             ORDER BY mp.id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(PerformanceRow {
                    model_name: row.get(0)?,
                    dataset_type: row.get(1)?,
                    mse: row.get(2)?,
                    r2_score: row.get(3)?,
                    mae: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn feature_metadata(&self) -> Result<Vec<FeatureMetadata>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT feature_name, feature_type, description FROM feature_metadata
             ORDER BY feature_name",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(FeatureMetadata {
                    feature_name: row.get(0)?,
                    feature_type: row.get(1)?,
                    description: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(tier: RiskTier, risk: f64) -> NewPrediction {
        NewPrediction {
            model_config_id: FALLBACK_MODEL_CONFIG_ID,
            input_features: r#"{"road_type":"urban"}"#.to_string(),
            predicted_risk: risk,
            risk_level: tier,
            session_id: "a1b2c3d4".to_string(),
        }
    }

    #[test]
    fn test_empty_store() {
        let store = SqliteLogStore::in_memory().unwrap();
        assert_eq!(store.active_model_id().unwrap(), None);
        assert_eq!(store.counts().unwrap(), SystemCounts::default());
        assert!(store.recent_predictions(10).unwrap().is_empty());
        assert!(store.active_performance().unwrap().is_empty());
        assert!(store.feature_metadata().unwrap().is_empty());
    }

    #[test]
    fn test_insert_and_read_back() {
        let store = SqliteLogStore::in_memory().unwrap();
        let first = store.insert_prediction(&sample(RiskTier::Low, 0.1)).unwrap();
        let second = store.insert_prediction(&sample(RiskTier::High, 0.9)).unwrap();
        assert!(second > first);

        let recent = store.recent_predictions(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, second);
        assert_eq!(recent[0].risk_level, RiskTier::High);
        assert_eq!(recent[1].predicted_risk, 0.1);
        assert_eq!(recent[1].session_id, "a1b2c3d4");

        assert_eq!(store.recent_predictions(1).unwrap().len(), 1);
        assert_eq!(store.counts().unwrap().predictions, 2);
    }

    #[test]
    fn test_active_model_and_performance() {
        let store = SqliteLogStore::in_memory().unwrap();
        let inactive = store.register_model_config("ridge", false).unwrap();
        let active = store.register_model_config("lightgbm", true).unwrap();
        store.record_performance(inactive, "test", 0.02, 0.8, 0.1).unwrap();
        store.record_performance(active, "train", 0.01, 0.9, 0.05).unwrap();
        store.record_performance(active, "test", 0.015, 0.88, 0.06).unwrap();

        assert_eq!(store.active_model_id().unwrap(), Some(active));

        let rows = store.active_performance().unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.model_name == "lightgbm"));
        assert_eq!(rows[0].dataset_type, "train");
        assert_eq!(rows[1].r2_score, Some(0.88));

        let counts = store.counts().unwrap();
        assert_eq!(counts.model_configs, 2);
    }

    #[test]
    fn test_feature_metadata_and_training_counts() {
        let store = SqliteLogStore::in_memory().unwrap();
        store
            .upsert_feature_metadata(&FeatureMetadata {
                feature_name: "weather".into(),
                feature_type: "categorical".into(),
                description: Some("clear, rainy or foggy".into()),
            })
            .unwrap();
        store
            .upsert_feature_metadata(&FeatureMetadata {
                feature_name: "curvature".into(),
                feature_type: "numeric".into(),
                description: None,
            })
            .unwrap();
        store.add_training_record("{}", 0.3).unwrap();

        let metadata = store.feature_metadata().unwrap();
        assert_eq!(metadata.len(), 2);
        assert_eq!(metadata[0].feature_name, "curvature");
        assert_eq!(store.counts().unwrap().training_records, 1);
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("risk.db");
        {
            let store = SqliteLogStore::open(&path).unwrap();
            store.insert_prediction(&sample(RiskTier::Medium, 0.5)).unwrap();
        }
        let store = SqliteLogStore::open(&path).unwrap();
        assert_eq!(store.counts().unwrap().predictions, 1);
    }
}
