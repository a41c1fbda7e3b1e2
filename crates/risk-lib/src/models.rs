//! Core data models for accident-risk prediction

use crate::error::{Result, RiskError};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

macro_rules! categorical {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Integer code used by label-encoded model families
            pub fn code(self) -> u8 {
                self as u8
            }

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = RiskError;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($label => Ok($name::$variant),)+
                    other => Err(RiskError::InvalidInput(format!(
                        "unknown {} '{}'",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

categorical!(
    /// Road classification
    RoadType { Urban => "urban", Rural => "rural", Highway => "highway" }
);
categorical!(
    /// Ambient lighting at the time of travel
    Lighting { Daylight => "daylight", Dim => "dim", Night => "night" }
);
categorical!(
    Weather { Clear => "clear", Rainy => "rainy", Foggy => "foggy" }
);
categorical!(
    TimeOfDay { Morning => "morning", Afternoon => "afternoon", Evening => "evening" }
);

/// One submission of road and environment parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawInput {
    pub road_type: RoadType,
    pub num_lanes: u8,
    pub curvature: f64,
    pub speed_limit: u16,
    pub lighting: Lighting,
    pub weather: Weather,
    pub road_signs_present: bool,
    pub public_road: bool,
    pub time_of_day: TimeOfDay,
    pub holiday: bool,
    pub school_season: bool,
    pub num_reported_accidents: u8,
}

impl Default for RawInput {
    fn default() -> Self {
        Self {
            road_type: RoadType::Urban,
            num_lanes: 2,
            curvature: 0.5,
            speed_limit: 60,
            lighting: Lighting::Daylight,
            weather: Weather::Clear,
            road_signs_present: true,
            public_road: true,
            time_of_day: TimeOfDay::Afternoon,
            holiday: false,
            school_season: false,
            num_reported_accidents: 1,
        }
    }
}

impl RawInput {
    pub const FIELD_COUNT: usize = 12;

    /// Check every field against its input domain
    pub fn validate(&self) -> Result<()> {
        if !(1..=8).contains(&self.num_lanes) {
            return Err(RiskError::InvalidInput(format!(
                "num_lanes must be in [1, 8], got {}",
                self.num_lanes
            )));
        }
        if !self.curvature.is_finite() || !(0.0..=1.0).contains(&self.curvature) {
            return Err(RiskError::InvalidInput(format!(
                "curvature must be in [0.0, 1.0], got {}",
                self.curvature
            )));
        }
        let steps = self.curvature * 10.0;
        if (steps - steps.round()).abs() > 1e-9 {
            return Err(RiskError::InvalidInput(format!(
                "curvature must be a multiple of 0.1, got {}",
                self.curvature
            )));
        }
        if !(20..=120).contains(&self.speed_limit) {
            return Err(RiskError::InvalidInput(format!(
                "speed_limit must be in [20, 120], got {}",
                self.speed_limit
            )));
        }
        if self.num_reported_accidents > 10 {
            return Err(RiskError::InvalidInput(format!(
                "num_reported_accidents must be in [0, 10], got {}",
                self.num_reported_accidents
            )));
        }
        Ok(())
    }

    pub fn is_night(&self) -> bool {
        self.lighting == Lighting::Night
    }
}

/// Class of trained estimator an artifact belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    LinearRegression,
    Lasso,
    Ridge,
    RandomForest,
    Xgboost,
    Lightgbm,
    Unknown,
}

impl ModelFamily {
    /// Families in filename-matching priority order
    pub const KNOWN: &'static [ModelFamily] = &[
        ModelFamily::LinearRegression,
        ModelFamily::Lasso,
        ModelFamily::Ridge,
        ModelFamily::RandomForest,
        ModelFamily::Xgboost,
        ModelFamily::Lightgbm,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ModelFamily::LinearRegression => "linear_regression",
            ModelFamily::Lasso => "lasso",
            ModelFamily::Ridge => "ridge",
            ModelFamily::RandomForest => "random_forest",
            ModelFamily::Xgboost => "xgboost",
            ModelFamily::Lightgbm => "lightgbm",
            ModelFamily::Unknown => "unknown",
        }
    }

    /// Derive the family from an artifact filename; first substring match wins
    pub fn from_filename(filename: &str) -> Self {
        let lower = filename.to_lowercase();
        Self::KNOWN
            .iter()
            .copied()
            .find(|family| lower.contains(family.as_str()))
            .unwrap_or(ModelFamily::Unknown)
    }

    /// Number of features the trained model consumes, if declared
    pub fn expected_features_count(self) -> Option<usize> {
        match self {
            ModelFamily::LinearRegression => Some(18),
            ModelFamily::Lasso | ModelFamily::Ridge => Some(10),
            ModelFamily::RandomForest | ModelFamily::Xgboost => Some(7),
            ModelFamily::Lightgbm => Some(14),
            ModelFamily::Unknown => None,
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelFamily {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self> {
        Self::KNOWN
            .iter()
            .copied()
            .chain(std::iter::once(ModelFamily::Unknown))
            .find(|family| family.as_str() == s)
            .ok_or_else(|| RiskError::Configuration(format!("unknown model family '{}'", s)))
    }
}

/// Column type tag carried alongside each feature value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    Int64,
    Float64,
    Float32,
    Category,
    Text,
}

impl Dtype {
    pub fn is_numeric(self) -> bool {
        matches!(self, Dtype::Int64 | Dtype::Float64 | Dtype::Float32)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Text(String),
}

impl FeatureValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FeatureValue::Number(v) => Some(*v),
            FeatureValue::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub value: FeatureValue,
    pub dtype: Dtype,
}

impl Column {
    pub fn new(name: impl Into<String>, value: FeatureValue, dtype: Dtype) -> Self {
        let mut column = Self {
            name: name.into(),
            value,
            dtype,
        };
        column.round_to_dtype();
        column
    }

    /// Replace the value, keeping the name and the dtype's precision
    pub fn set_number(&mut self, value: f64) {
        self.value = FeatureValue::Number(value);
        self.round_to_dtype();
    }

    fn round_to_dtype(&mut self) {
        if let (Dtype::Float32, FeatureValue::Number(v)) = (self.dtype, &self.value) {
            self.value = FeatureValue::Number(*v as f32 as f64);
        }
    }
}

/// Ordered, named feature values consumed by one trained model
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureVector {
    columns: Vec<Column>,
}

impl FeatureVector {
    pub fn from_columns(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn columns_mut(&mut self) -> &mut [Column] {
        &mut self.columns
    }

    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|c| c.value.as_f64())
    }

    /// Every value as f64, in column order
    pub fn to_f64_row(&self) -> Result<Vec<f64>> {
        self.columns
            .iter()
            .map(|c| {
                c.value
                    .as_f64()
                    .ok_or_else(|| RiskError::NonNumeric(c.name.clone()))
            })
            .collect()
    }

    pub fn to_f32_row(&self) -> Result<Vec<f32>> {
        Ok(self.to_f64_row()?.into_iter().map(|v| v as f32).collect())
    }
}

impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for column in &self.columns {
            map.serialize_entry(&column.name, &column.value)?;
        }
        map.end()
    }
}

/// Three-level bucketing of a risk score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub const LOW_UPPER_BOUND: f64 = 0.3;
    pub const MEDIUM_UPPER_BOUND: f64 = 0.7;

    /// Classify a score; lower bounds are inclusive
    pub fn from_score(score: f64) -> Self {
        if score < Self::LOW_UPPER_BOUND {
            RiskTier::Low
        } else if score < Self::MEDIUM_UPPER_BOUND {
            RiskTier::Medium
        } else {
            RiskTier::High
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
        }
    }
}

impl FromStr for RiskTier {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "low" => Ok(RiskTier::Low),
            "medium" => Ok(RiskTier::Medium),
            "high" => Ok(RiskTier::High),
            other => Err(RiskError::InvalidInput(format!("unknown risk tier '{}'", other))),
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub raw_score: f64,
    pub clamped_score: f64,
    pub risk_tier: RiskTier,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_from_filename() {
        assert_eq!(
            ModelFamily::from_filename("best_LightGBM_model.onnx"),
            ModelFamily::Lightgbm
        );
        assert_eq!(
            ModelFamily::from_filename("xgboost_v2.onnx"),
            ModelFamily::Xgboost
        );
        assert_eq!(
            ModelFamily::from_filename("ridge_model.json"),
            ModelFamily::Ridge
        );
        assert_eq!(ModelFamily::from_filename("mystery.onnx"), ModelFamily::Unknown);
    }

    #[test]
    fn test_family_first_match_wins() {
        // Both substrings present; linear_regression is checked before lasso
        assert_eq!(
            ModelFamily::from_filename("lasso_vs_linear_regression.json"),
            ModelFamily::LinearRegression
        );
    }

    #[test]
    fn test_family_parse_round_trip() {
        for family in ModelFamily::KNOWN {
            assert_eq!(family.as_str().parse::<ModelFamily>().unwrap(), *family);
        }
        assert!("svm".parse::<ModelFamily>().is_err());
    }

    #[test]
    fn test_expected_counts() {
        assert_eq!(ModelFamily::LinearRegression.expected_features_count(), Some(18));
        assert_eq!(ModelFamily::Lasso.expected_features_count(), Some(10));
        assert_eq!(ModelFamily::Ridge.expected_features_count(), Some(10));
        assert_eq!(ModelFamily::RandomForest.expected_features_count(), Some(7));
        assert_eq!(ModelFamily::Xgboost.expected_features_count(), Some(7));
        assert_eq!(ModelFamily::Lightgbm.expected_features_count(), Some(14));
        assert_eq!(ModelFamily::Unknown.expected_features_count(), None);
    }

    #[test]
    fn test_category_codes() {
        assert_eq!(Lighting::Daylight.code(), 0);
        assert_eq!(Lighting::Dim.code(), 1);
        assert_eq!(Lighting::Night.code(), 2);
        assert_eq!(RoadType::Highway.code(), 2);
        assert_eq!(TimeOfDay::Morning.code(), 0);
        assert_eq!(Weather::Rainy.code(), 1);
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(RiskTier::from_score(0.29999), RiskTier::Low);
        assert_eq!(RiskTier::from_score(0.3), RiskTier::Medium);
        assert_eq!(RiskTier::from_score(0.69999), RiskTier::Medium);
        assert_eq!(RiskTier::from_score(0.7), RiskTier::High);
    }

    #[test]
    fn test_default_input_is_valid() {
        assert!(RawInput::default().validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_out_of_domain() {
        let mut raw = RawInput::default();
        raw.num_lanes = 9;
        assert!(matches!(raw.validate(), Err(RiskError::InvalidInput(_))));

        let mut raw = RawInput::default();
        raw.curvature = 0.55;
        assert!(raw.validate().is_err());

        let mut raw = RawInput::default();
        raw.curvature = f64::NAN;
        assert!(raw.validate().is_err());

        let mut raw = RawInput::default();
        raw.speed_limit = 19;
        assert!(raw.validate().is_err());

        let mut raw = RawInput::default();
        raw.num_reported_accidents = 11;
        assert!(raw.validate().is_err());
    }

    #[test]
    fn test_curvature_grid_tolerates_float_noise() {
        let mut raw = RawInput::default();
        raw.curvature = 0.1 + 0.2; // 0.30000000000000004
        assert!(raw.validate().is_ok());
    }

    #[test]
    fn test_raw_input_json_shape() {
        let json = serde_json::json!({
            "road_type": "highway",
            "num_lanes": 4,
            "curvature": 0.8,
            "speed_limit": 100,
            "lighting": "night",
            "weather": "foggy",
            "road_signs_present": true,
            "public_road": true,
            "time_of_day": "evening",
            "holiday": false,
            "school_season": false,
            "num_reported_accidents": 5
        });
        let raw: RawInput = serde_json::from_value(json).unwrap();
        assert_eq!(raw.road_type, RoadType::Highway);
        assert_eq!(raw.lighting, Lighting::Night);
        assert!(raw.is_night());
    }

    #[test]
    fn test_float32_column_rounds() {
        let mut column = Column::new("x", FeatureValue::Number(0.1), Dtype::Float32);
        assert_eq!(column.value, FeatureValue::Number(0.1f32 as f64));
        column.set_number(1.0 / 3.0);
        assert_eq!(column.value, FeatureValue::Number((1.0f64 / 3.0) as f32 as f64));
    }

    #[test]
    fn test_feature_vector_serializes_in_order() {
        let vector = FeatureVector::from_columns(vec![
            Column::new("b", FeatureValue::Number(2.0), Dtype::Float64),
            Column::new("a", FeatureValue::Text("x".into()), Dtype::Text),
        ]);
        let json = serde_json::to_string(&vector).unwrap();
        assert_eq!(json, r#"{"b":2.0,"a":"x"}"#);
    }

    #[test]
    fn test_non_numeric_row_is_error() {
        let vector = FeatureVector::from_columns(vec![Column::new(
            "road_type",
            FeatureValue::Text("urban".into()),
            Dtype::Text,
        )]);
        assert!(matches!(vector.to_f64_row(), Err(RiskError::NonNumeric(_))));
    }
}
