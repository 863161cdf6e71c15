//! Feature scaling implementations

use crate::error::{MlError, Result};
use crate::utils::column_as_f64;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Type of scaler to use
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScalerType {
    /// Standard scaling (z-score normalization): (x - mean) / std
    Standard,
    /// Divide by the standard deviation without centering; keeps sparse
    /// one-hot columns sparse
    ScaleOnly,
}

/// Parameters for a fitted scaler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ScalerParams {
    center: f64,
    scale: f64,
}

/// Feature scaler. Uses the population standard deviation; a zero deviation
/// scales by 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    scaler_type: ScalerType,
    params: BTreeMap<String, ScalerParams>,
    is_fitted: bool,
}

impl Scaler {
    pub fn new(scaler_type: ScalerType) -> Self {
        Self {
            scaler_type,
            params: BTreeMap::new(),
            is_fitted: false,
        }
    }

    /// Fit the scaler to the data. Columns must be free of missing values.
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        let mut params = BTreeMap::new();
        for &name in columns {
            let values = dense_column(df, name)?;
            params.insert(name.to_string(), self.compute_params(&values));
        }
        self.params = params;
        self.is_fitted = true;
        Ok(self)
    }

    /// Replace every fitted column with its scaled values
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(MlError::ModelNotFitted);
        }

        let mut result = df.clone();
        for (name, params) in &self.params {
            let scaled: Vec<f64> = dense_column(df, name)?
                .into_iter()
                .map(|v| (v - params.center) / params.scale)
                .collect();
            result.with_column(Series::new(name.as_str().into(), scaled))?;
        }
        Ok(result)
    }

    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    /// Fitted (center, scale) of a column
    pub fn params(&self, column: &str) -> Option<(f64, f64)> {
        self.params.get(column).map(|p| (p.center, p.scale))
    }

    fn compute_params(&self, values: &[f64]) -> ScalerParams {
        let n = values.len().max(1) as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt();
        let scale = if std == 0.0 || !std.is_finite() { 1.0 } else { std };
        match self.scaler_type {
            ScalerType::Standard => ScalerParams { center: mean, scale },
            ScalerType::ScaleOnly => ScalerParams { center: 0.0, scale },
        }
    }
}

fn dense_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    column_as_f64(df, name)?
        .into_iter()
        .map(|v| {
            v.ok_or_else(|| {
                MlError::PreprocessingError(format!("column '{name}' has missing values; impute first"))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_scaler() {
        let df = df! { "x" => [1.0, 2.0, 3.0, 4.0] }.unwrap();
        let mut scaler = Scaler::new(ScalerType::Standard);
        let out = scaler.fit_transform(&df, &["x"]).unwrap();
        let (center, scale) = scaler.params("x").unwrap();
        assert_eq!(center, 2.5);
        assert!((scale - 1.25f64.sqrt()).abs() < 1e-12);
        let values: Vec<f64> = column_as_f64(&out, "x").unwrap().into_iter().flatten().collect();
        assert!(values.iter().sum::<f64>().abs() < 1e-12);
    }

    #[test]
    fn test_scale_only_keeps_zeros() {
        let df = df! { "onehot" => [0.0, 1.0, 0.0, 1.0] }.unwrap();
        let mut scaler = Scaler::new(ScalerType::ScaleOnly);
        let out = scaler.fit_transform(&df, &["onehot"]).unwrap();
        assert_eq!(
            column_as_f64(&out, "onehot").unwrap(),
            vec![Some(0.0), Some(2.0), Some(0.0), Some(2.0)]
        );
    }

    #[test]
    fn test_constant_column_scale_is_one() {
        let df = df! { "c" => [5.0, 5.0] }.unwrap();
        let mut scaler = Scaler::new(ScalerType::Standard);
        scaler.fit(&df, &["c"]).unwrap();
        assert_eq!(scaler.params("c"), Some((5.0, 1.0)));
    }

    #[test]
    fn test_missing_values_rejected() {
        let df = df! { "x" => [Some(1.0), None] }.unwrap();
        assert!(Scaler::new(ScalerType::Standard).fit(&df, &["x"]).is_err());
    }
}
