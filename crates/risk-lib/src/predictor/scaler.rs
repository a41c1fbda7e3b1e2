//! Feature scaling adapter
//!
//! Fitted scalers may have been trained on a feature subset that only
//! partially matches the live vector. A failed transform keeps the unscaled
//! vector and reports a `Transform` warning; the request carries on.

use super::Scaler;
use crate::error::{Result, RiskError};
use crate::models::{Dtype, FeatureVector, ModelFamily};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Scaled vector plus the reason scaling was skipped, if it was
#[derive(Debug)]
pub struct Scaled {
    pub vector: FeatureVector,
    pub warning: Option<RiskError>,
}

impl Scaled {
    fn unchanged(vector: FeatureVector) -> Self {
        Self {
            vector,
            warning: None,
        }
    }
}

/// Apply a fitted scaler if one is available.
///
/// Lasso and ridge scale only numeric-typed columns, by position. Other
/// families send the whole vector through the scaler and keep column names.
pub fn apply_scaler(
    vector: FeatureVector,
    scaler: Option<&dyn Scaler>,
    family: ModelFamily,
) -> Scaled {
    let Some(scaler) = scaler else {
        return Scaled::unchanged(vector);
    };

    let attempt = match family {
        ModelFamily::Lasso | ModelFamily::Ridge => scale_numeric_subset(&vector, scaler),
        _ => scale_whole(&vector, scaler),
    };

    match attempt {
        Ok(scaled) => Scaled::unchanged(scaled),
        Err(e) => {
            warn!(
                family = %family,
                error = %e,
                "Scaler could not be applied, using unscaled features"
            );
            let warning = match e {
                RiskError::Transform(_) => e,
                other => RiskError::Transform(other.to_string()),
            };
            Scaled {
                vector,
                warning: Some(warning),
            }
        }
    }
}

fn scale_numeric_subset(vector: &FeatureVector, scaler: &dyn Scaler) -> Result<FeatureVector> {
    let positions: Vec<usize> = vector
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, c)| c.dtype.is_numeric())
        .map(|(i, _)| i)
        .collect();

    let subset = positions
        .iter()
        .map(|&i| {
            let column = &vector.columns()[i];
            column
                .value
                .as_f64()
                .ok_or_else(|| RiskError::NonNumeric(column.name.clone()))
        })
        .collect::<Result<Vec<f64>>>()?;

    let transformed = checked_transform(scaler, &subset)?;

    let mut scaled = vector.clone();
    for (&i, value) in positions.iter().zip(transformed) {
        write_scaled(&mut scaled.columns_mut()[i], value);
    }
    Ok(scaled)
}

fn scale_whole(vector: &FeatureVector, scaler: &dyn Scaler) -> Result<FeatureVector> {
    let row = vector.to_f64_row()?;
    let transformed = checked_transform(scaler, &row)?;

    let mut scaled = vector.clone();
    for (column, value) in scaled.columns_mut().iter_mut().zip(transformed) {
        write_scaled(column, value);
    }
    Ok(scaled)
}

fn checked_transform(scaler: &dyn Scaler, row: &[f64]) -> Result<Vec<f64>> {
    let transformed = scaler.transform(row)?;
    if transformed.len() != row.len() {
        return Err(RiskError::Transform(format!(
            "scaler returned {} values for {} inputs",
            transformed.len(),
            row.len()
        )));
    }
    Ok(transformed)
}

/// Scaled integers become floats; float32 and category columns keep their tag
fn write_scaled(column: &mut crate::models::Column, value: f64) {
    if column.dtype == Dtype::Int64 {
        column.dtype = Dtype::Float64;
    }
    column.set_number(value);
}

/// Fitted standardisation: `(x - mean) / scale`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_names: Option<Vec<String>>,
}

impl StandardScaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self> {
        let scaler = Self {
            mean,
            scale,
            feature_names: None,
        };
        scaler.check()?;
        Ok(scaler)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let scaler: Self = serde_json::from_slice(bytes)?;
        scaler.check()?;
        Ok(scaler)
    }

    fn check(&self) -> Result<()> {
        if self.mean.len() != self.scale.len() {
            return Err(RiskError::Configuration(format!(
                "scaler has {} means but {} scales",
                self.mean.len(),
                self.scale.len()
            )));
        }
        Ok(())
    }
}

impl Scaler for StandardScaler {
    fn transform(&self, values: &[f64]) -> Result<Vec<f64>> {
        if values.len() != self.mean.len() {
            return Err(RiskError::Transform(format!(
                "scaler was fitted on {} features, got {}",
                self.mean.len(),
                values.len()
            )));
        }
        Ok(values
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (mean, scale))| {
                // Constant features were fitted with scale 0
                let scale = if *scale == 0.0 { 1.0 } else { *scale };
                (x - mean) / scale
            })
            .collect())
    }

    fn n_features(&self) -> Option<usize> {
        Some(self.mean.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Column, FeatureValue, RawInput};
    use crate::predictor::features::synthesize;
    use crate::predictor::schema::enforce;

    struct FailingScaler;

    impl Scaler for FailingScaler {
        fn transform(&self, _values: &[f64]) -> Result<Vec<f64>> {
            Err(RiskError::Transform("feature names mismatch".into()))
        }

        fn n_features(&self) -> Option<usize> {
            None
        }
    }

    /// Returns one value fewer than it was given
    struct ShortScaler;

    impl Scaler for ShortScaler {
        fn transform(&self, values: &[f64]) -> Result<Vec<f64>> {
            Ok(values[1..].to_vec())
        }

        fn n_features(&self) -> Option<usize> {
            None
        }
    }

    fn enforced(family: ModelFamily) -> FeatureVector {
        enforce(synthesize(&RawInput::default(), family), family).vector
    }

    #[test]
    fn test_no_scaler_is_passthrough() {
        let vector = enforced(ModelFamily::Ridge);
        let scaled = apply_scaler(vector.clone(), None, ModelFamily::Ridge);
        assert_eq!(scaled.vector, vector);
        assert!(scaled.warning.is_none());
    }

    #[test]
    fn test_ridge_scaler_failure_returns_unscaled() {
        let vector = enforced(ModelFamily::Ridge);
        let scaled = apply_scaler(vector.clone(), Some(&FailingScaler), ModelFamily::Ridge);
        assert_eq!(scaled.vector, vector);
        assert!(matches!(scaled.warning, Some(RiskError::Transform(_))));
    }

    #[test]
    fn test_shape_mismatch_returns_unscaled() {
        let vector = enforced(ModelFamily::Lasso);
        let scaler = StandardScaler::new(vec![0.0; 3], vec![1.0; 3]).unwrap();
        let scaled = apply_scaler(vector.clone(), Some(&scaler), ModelFamily::Lasso);
        assert_eq!(scaled.vector, vector);
        assert!(scaled.warning.is_some());

        let scaled = apply_scaler(vector.clone(), Some(&ShortScaler), ModelFamily::Lasso);
        assert_eq!(scaled.vector, vector);
        assert!(scaled.warning.is_some());
    }

    #[test]
    fn test_ridge_scales_numeric_columns_by_position() {
        let vector = enforced(ModelFamily::Ridge);
        let scaler = StandardScaler::new(vec![1.0; 10], vec![2.0; 10]).unwrap();
        let scaled = apply_scaler(vector.clone(), Some(&scaler), ModelFamily::Ridge);
        assert!(scaled.warning.is_none());
        assert_eq!(scaled.vector.names(), vector.names());
        // public_road is 1 -> (1 - 1) / 2
        assert_eq!(scaled.vector.number("public_road"), Some(0.0));
        assert_eq!(scaled.vector.get("public_road").unwrap().dtype, Dtype::Float64);
        // weather_rainy is 0 -> (0 - 1) / 2
        assert_eq!(scaled.vector.number("weather_rainy"), Some(-0.5));
    }

    #[test]
    fn test_numeric_subset_skips_non_numeric_columns() {
        let vector = FeatureVector::from_columns(vec![
            Column::new("a", FeatureValue::Number(4.0), Dtype::Float64),
            Column::new("label", FeatureValue::Text("x".into()), Dtype::Text),
            Column::new("b", FeatureValue::Number(6.0), Dtype::Int64),
        ]);
        let scaler = StandardScaler::new(vec![2.0, 2.0], vec![2.0, 4.0]).unwrap();
        let scaled = apply_scaler(vector, Some(&scaler), ModelFamily::Lasso);
        assert!(scaled.warning.is_none());
        assert_eq!(scaled.vector.number("a"), Some(1.0));
        assert_eq!(scaled.vector.number("b"), Some(1.0));
        assert_eq!(
            scaled.vector.get("label").unwrap().value,
            FeatureValue::Text("x".into())
        );
    }

    #[test]
    fn test_whole_vector_scaling_keeps_names() {
        let vector = enforced(ModelFamily::RandomForest);
        let scaler = StandardScaler::new(vec![0.0; 7], vec![0.5; 7]).unwrap();
        let scaled = apply_scaler(vector.clone(), Some(&scaler), ModelFamily::RandomForest);
        assert!(scaled.warning.is_none());
        assert_eq!(scaled.vector.names(), vector.names());
        assert_eq!(scaled.vector.number("curvature"), Some(1.0));
    }

    #[test]
    fn test_whole_vector_scaling_keeps_float32_precision() {
        let vector = enforced(ModelFamily::Xgboost);
        let scaler = StandardScaler::new(vec![0.0; 7], vec![3.0; 7]).unwrap();
        let scaled = apply_scaler(vector, Some(&scaler), ModelFamily::Xgboost);
        for column in scaled.vector.columns() {
            assert_eq!(column.dtype, Dtype::Float32);
            let v = column.value.as_f64().unwrap();
            assert_eq!(v, v as f32 as f64);
        }
    }

    #[test]
    fn test_unknown_family_text_columns_fail_softly() {
        let vector = enforced(ModelFamily::Unknown);
        let scaler = StandardScaler::new(vec![0.0; 12], vec![1.0; 12]).unwrap();
        let scaled = apply_scaler(vector.clone(), Some(&scaler), ModelFamily::Unknown);
        assert_eq!(scaled.vector, vector);
        assert!(matches!(scaled.warning, Some(RiskError::Transform(_))));
    }

    #[test]
    fn test_zero_scale_is_treated_as_one() {
        let scaler = StandardScaler::new(vec![1.0, 1.0], vec![0.0, 2.0]).unwrap();
        assert_eq!(scaler.transform(&[3.0, 3.0]).unwrap(), vec![2.0, 1.0]);
    }

    #[test]
    fn test_scaler_json() {
        let scaler =
            StandardScaler::from_json(br#"{"mean": [1.0, 2.0], "scale": [1.0, 1.0]}"#).unwrap();
        assert_eq!(scaler.n_features(), Some(2));
        assert!(StandardScaler::from_json(br#"{"mean": [1.0], "scale": []}"#).is_err());
    }
}
