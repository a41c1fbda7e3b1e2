//! Schema enforcement
//!
//! Orders, selects and casts synthesized features into the exact shape a
//! model family consumes, and checks the feature count.

use crate::error::RiskError;
use crate::models::{Column, Dtype, FeatureValue, FeatureVector, ModelFamily};
use tracing::warn;

/// Column order the xgboost booster was trained with. It binds by position.
pub const XGBOOST_FEATURE_ORDER: &[&str] = &[
    "curvature_speed",
    "curvature_night",
    "lighting",
    "speed_limit_enc",
    "weather",
    "curvature",
    "num_reported_accidents",
];

/// Columns LightGBM treats as categorical splits
pub const LIGHTGBM_CATEGORICAL: &[&str] = &["weather", "lighting", "time_of_day", "road_type"];

/// Per-family enforcement rules
#[derive(Debug, Clone, Copy)]
pub struct SchemaPolicy {
    /// Fixed output order; `None` keeps the synthesized order
    pub order: Option<&'static [&'static str]>,
    pub categorical: &'static [&'static str],
    /// Coerce every column to a number and cast to this dtype
    pub cast: Option<Dtype>,
}

impl SchemaPolicy {
    pub fn for_family(family: ModelFamily) -> Self {
        match family {
            ModelFamily::Xgboost => Self {
                order: Some(XGBOOST_FEATURE_ORDER),
                categorical: &[],
                cast: Some(Dtype::Float32),
            },
            ModelFamily::Lightgbm => Self {
                order: None,
                categorical: LIGHTGBM_CATEGORICAL,
                cast: None,
            },
            _ => Self {
                order: None,
                categorical: &[],
                cast: None,
            },
        }
    }
}

/// Enforced vector plus any non-fatal schema warnings
#[derive(Debug)]
pub struct Enforced {
    pub vector: FeatureVector,
    pub warnings: Vec<RiskError>,
}

pub fn enforce(features: FeatureVector, family: ModelFamily) -> Enforced {
    let policy = SchemaPolicy::for_family(family);

    let mut columns = match policy.order {
        Some(order) => select_in_order(features, order),
        None => features.into_columns(),
    };

    for column in columns.iter_mut() {
        if policy.categorical.contains(&column.name.as_str()) {
            column.dtype = Dtype::Category;
        }
    }

    if let Some(dtype) = policy.cast {
        columns = columns
            .into_iter()
            .map(|c| {
                let value = coerce_numeric(&c.value).unwrap_or(0.0);
                Column::new(c.name, FeatureValue::Number(value), dtype)
            })
            .collect();
    }

    let vector = FeatureVector::from_columns(columns);
    let warnings = check_feature_count(&vector, family).into_iter().collect();
    Enforced { vector, warnings }
}

/// Non-fatal count check against the family's declared feature count
pub fn check_feature_count(vector: &FeatureVector, family: ModelFamily) -> Option<RiskError> {
    let expected = family.expected_features_count()?;
    if vector.len() == expected {
        return None;
    }
    warn!(
        family = %family,
        expected = expected,
        actual = vector.len(),
        "Feature count mismatch, attempting prediction anyway"
    );
    Some(RiskError::SchemaMismatch {
        family: family.to_string(),
        expected,
        actual: vector.len(),
    })
}

/// Missing columns come back as text placeholders so the numeric cast fills them
fn select_in_order(features: FeatureVector, order: &[&str]) -> Vec<Column> {
    let mut available = features.into_columns();
    order
        .iter()
        .map(|name| match available.iter().position(|c| c.name == *name) {
            Some(idx) => available.swap_remove(idx),
            None => Column::new(*name, FeatureValue::Text(String::new()), Dtype::Text),
        })
        .collect()
}

/// Numeric view of a value; unparseable or non-finite text is missing
fn coerce_numeric(value: &FeatureValue) -> Option<f64> {
    match value {
        FeatureValue::Number(v) if v.is_finite() => Some(*v),
        FeatureValue::Number(_) => None,
        FeatureValue::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
    }
}
