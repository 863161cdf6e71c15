//! Data preprocessing pipeline

use crate::error::{MlError, Result};
use crate::utils::column_as_f64;
use super::{
    config::PreprocessingConfig,
    encoder::OneHotEncoder,
    imputer::Imputer,
    scaler::{Scaler, ScalerType},
};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

/// Column transformer with two branches:
///
/// - numeric: impute, then standard scale
/// - categorical: impute, one-hot encode, then scale without centering
///
/// Output columns are the numeric columns followed by the one-hot columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPreprocessor {
    config: PreprocessingConfig,
    numeric_imputer: Imputer,
    numeric_scaler: Scaler,
    categorical_imputer: Imputer,
    encoder: OneHotEncoder,
    categorical_scaler: Scaler,
    feature_names: Vec<String>,
    is_fitted: bool,
}

impl Default for DataPreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl DataPreprocessor {
    /// Create a new preprocessor with default configuration
    pub fn new() -> Self {
        Self::with_config(PreprocessingConfig::default())
    }

    pub fn with_config(config: PreprocessingConfig) -> Self {
        Self {
            numeric_imputer: Imputer::new(config.numeric_impute_strategy.clone()),
            numeric_scaler: Scaler::new(ScalerType::Standard),
            categorical_imputer: Imputer::new(config.categorical_impute_strategy.clone()),
            encoder: OneHotEncoder::new(),
            categorical_scaler: Scaler::new(ScalerType::ScaleOnly),
            feature_names: Vec::new(),
            is_fitted: false,
            config,
        }
    }

    pub fn config(&self) -> &PreprocessingConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Names of the output columns, in matrix order
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        let start = Instant::now();
        if self.config.numeric_columns.is_empty() && self.config.categorical_columns.is_empty() {
            return Err(MlError::PreprocessingError("no columns configured".to_string()));
        }
        let numeric: Vec<&str> = self.config.numeric_columns.iter().map(String::as_str).collect();
        let categorical: Vec<&str> =
            self.config.categorical_columns.iter().map(String::as_str).collect();

        let mut feature_names: Vec<String> = Vec::new();

        if !numeric.is_empty() {
            let imputed = self.numeric_imputer.fit_transform(df, &numeric)?;
            self.numeric_scaler.fit(&imputed, &numeric)?;
            feature_names.extend(self.config.numeric_columns.iter().cloned());
        }

        if !categorical.is_empty() {
            let imputed = self.categorical_imputer.fit_transform(df, &categorical)?;
            let encoded = self.encoder.fit_transform(&imputed, &categorical)?;
            let onehot = self.encoder.feature_names();
            let onehot_refs: Vec<&str> = onehot.iter().map(String::as_str).collect();
            self.categorical_scaler.fit(&encoded, &onehot_refs)?;
            feature_names.extend(onehot);
        }

        self.feature_names = feature_names;
        self.is_fitted = true;
        debug!(
            rows = df.height(),
            features = self.feature_names.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "preprocessor fitted"
        );
        Ok(self)
    }

    /// Transform a frame into the feature matrix
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(MlError::ModelNotFitted);
        }

        let mut result = df.clone();
        if !self.config.numeric_columns.is_empty() {
            result = self.numeric_imputer.transform(&result)?;
            result = self.numeric_scaler.transform(&result)?;
        }
        if !self.config.categorical_columns.is_empty() {
            result = self.categorical_imputer.transform(&result)?;
            result = self.encoder.transform(&result)?;
            result = self.categorical_scaler.transform(&result)?;
        }

        let columns: Vec<Vec<f64>> = self
            .feature_names
            .iter()
            .map(|name| {
                column_as_f64(&result, name)?
                    .into_iter()
                    .map(|v| {
                        v.ok_or_else(|| {
                            MlError::PreprocessingError(format!("missing value in output '{name}'"))
                        })
                    })
                    .collect::<Result<Vec<f64>>>()
            })
            .collect::<Result<_>>()?;

        let n_rows = df.height();
        Ok(Array2::from_shape_fn((n_rows, columns.len()), |(i, j)| columns[j][i]))
    }

    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<Array2<f64>> {
        self.fit(df)?;
        self.transform(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> DataFrame {
        df! {
            "gender" => [Some("female"), Some("male"), None, Some("female")],
            "lunch" => ["standard", "free/reduced", "standard", "standard"],
            "reading_score" => [Some(70.0), None, Some(90.0), Some(80.0)],
        }
        .unwrap()
    }

    fn preprocessor() -> DataPreprocessor {
        DataPreprocessor::with_config(
            PreprocessingConfig::new()
                .with_numeric_columns(["reading_score"])
                .with_categorical_columns(["gender", "lunch"]),
        )
    }

    #[test]
    fn test_output_layout() {
        let mut pre = preprocessor();
        let out = pre.fit_transform(&frame()).unwrap();
        assert_eq!(
            pre.feature_names(),
            &["reading_score", "gender_female", "gender_male", "lunch_free/reduced", "lunch_standard"]
        );
        assert_eq!(out.dim(), (4, 5));
        // median of 70, 80, 90 fills the gap, which then scales to zero
        assert!(out[[1, 0]].abs() < 1e-12);
        // missing gender takes the mode
        assert!(out[[2, 1]] > 0.0);
        assert_eq!(out[[2, 2]], 0.0);
    }

    #[test]
    fn test_unknown_category_fails() {
        let mut pre = preprocessor();
        pre.fit(&frame()).unwrap();
        let row = df! {
            "gender" => ["other"],
            "lunch" => ["standard"],
            "reading_score" => [75.0],
        }
        .unwrap();
        assert!(matches!(pre.transform(&row), Err(MlError::PreprocessingError(_))));
    }

    #[test]
    fn test_missing_column_fails() {
        let mut pre = preprocessor();
        pre.fit(&frame()).unwrap();
        let row = df! { "gender" => ["male"] }.unwrap();
        assert!(pre.transform(&row).is_err());
    }

    #[test]
    fn test_serde_round_trip_preserves_transform() {
        let mut pre = preprocessor();
        let expected = pre.fit_transform(&frame()).unwrap();
        let bytes = bincode::serialize(&pre).unwrap();
        let restored: DataPreprocessor = bincode::deserialize(&bytes).unwrap();
        assert_eq!(restored.transform(&frame()).unwrap(), expected);
    }
}
