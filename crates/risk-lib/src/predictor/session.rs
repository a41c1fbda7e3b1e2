//! Explicit per-session model state
//!
//! Everything a prediction needs from the loaded artifact travels in one
//! context value instead of ambient globals. Replacing the model means
//! building a new context.

use super::{Model, Scaler};
use crate::models::ModelFamily;
use std::fmt;
use std::sync::Arc;

/// Length of the short session identifier
const SESSION_ID_LEN: usize = 8;

#[derive(Clone)]
pub struct SessionContext {
    session_id: String,
    model_name: String,
    family: ModelFamily,
    model_version: String,
    model: Arc<dyn Model>,
    scaler: Option<Arc<dyn Scaler>>,
}

impl SessionContext {
    /// New context with a fresh session id
    pub fn new(model_name: impl Into<String>, family: ModelFamily, model: Arc<dyn Model>) -> Self {
        Self {
            session_id: new_session_id(),
            model_name: model_name.into(),
            family,
            model_version: String::new(),
            model,
            scaler: None,
        }
    }

    pub fn with_scaler(mut self, scaler: Arc<dyn Scaler>) -> Self {
        self.scaler = Some(scaler);
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.model_version = version.into();
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn family(&self) -> ModelFamily {
        self.family
    }

    /// Artifact checksum, empty when unknown
    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    pub fn model(&self) -> &dyn Model {
        self.model.as_ref()
    }

    pub fn scaler(&self) -> Option<&dyn Scaler> {
        self.scaler.as_deref()
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("session_id", &self.session_id)
            .field("model_name", &self.model_name)
            .field("family", &self.family)
            .field("model_version", &self.model_version)
            .field("scaler", &self.scaler.is_some())
            .finish()
    }
}

fn new_session_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(SESSION_ID_LEN);
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::{LinearModel, StandardScaler};

    fn linear() -> Arc<dyn Model> {
        Arc::new(LinearModel {
            feature_names: None,
            coefficients: vec![],
            intercept: 0.5,
        })
    }

    #[test]
    fn test_session_ids_are_short_and_distinct() {
        let a = SessionContext::new("a.json", ModelFamily::Ridge, linear());
        let b = SessionContext::new("a.json", ModelFamily::Ridge, linear());
        assert_eq!(a.session_id().len(), SESSION_ID_LEN);
        assert_ne!(a.session_id(), b.session_id());
    }

    #[test]
    fn test_builder_fields() {
        let scaler = StandardScaler::new(vec![0.0], vec![1.0]).unwrap();
        let ctx = SessionContext::new("best_ridge_model.json", ModelFamily::Ridge, linear())
            .with_scaler(Arc::new(scaler))
            .with_version("deadbeef")
            .with_session_id("s1");

        assert_eq!(ctx.session_id(), "s1");
        assert_eq!(ctx.model_name(), "best_ridge_model.json");
        assert_eq!(ctx.family(), ModelFamily::Ridge);
        assert_eq!(ctx.model_version(), "deadbeef");
        assert_eq!(ctx.scaler().and_then(|s| s.n_features()), Some(1));
    }
}
