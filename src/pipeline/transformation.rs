//! Feature transformation of the train/test splits

use std::path::{Path, PathBuf};

use ndarray::{concatenate, Array1, Array2, Axis};
use polars::prelude::DataFrame;
use tracing::{error, info};

use crate::artifacts::save_object;
use crate::error::{MlError, PipelineResult, Result, Stage, StageExt};
use crate::preprocessing::{DataPreprocessor, PreprocessingConfig};
use crate::utils::{column_as_f64, normalize_column_names, DataLoader};

#[derive(Debug, Clone)]
pub struct DataTransformationConfig {
    pub preprocessor_obj_file_path: PathBuf,
    /// Column predicted by the models; appended as the last matrix column
    pub target_column: String,
    pub preprocessing: PreprocessingConfig,
}

impl Default for DataTransformationConfig {
    fn default() -> Self {
        Self {
            preprocessor_obj_file_path: PathBuf::from("artifacts").join("preprocessor.pkl"),
            target_column: "math_score".to_string(),
            preprocessing: PreprocessingConfig::default(),
        }
    }
}

impl DataTransformationConfig {
    pub fn with_preprocessor_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.preprocessor_obj_file_path = path.into();
        self
    }
}

/// Feature matrices with the target as last column
#[derive(Debug, Clone)]
pub struct TransformedData {
    pub train: Array2<f64>,
    pub test: Array2<f64>,
    pub preprocessor_path: PathBuf,
}

pub struct DataTransformation {
    config: DataTransformationConfig,
}

impl Default for DataTransformation {
    fn default() -> Self {
        Self::new(DataTransformationConfig::default())
    }
}

impl DataTransformation {
    pub fn new(config: DataTransformationConfig) -> Self {
        Self { config }
    }

    /// Fit the preprocessor on the training split, transform both splits
    /// and persist the fitted preprocessor.
    pub fn initiate_data_transformation(
        &self,
        train_path: impl AsRef<Path>,
        test_path: impl AsRef<Path>,
    ) -> PipelineResult<TransformedData> {
        let (train, test, preprocessor) = self
            .transform_splits(train_path.as_ref(), test_path.as_ref())
            .inspect_err(|e| error!(error = %e, "data transformation failed"))
            .stage(Stage::Transformation)?;

        save_object(&self.config.preprocessor_obj_file_path, &preprocessor).stage(Stage::Persistence)?;
        info!(path = %self.config.preprocessor_obj_file_path.display(), "Saved preprocessing object");

        Ok(TransformedData {
            train,
            test,
            preprocessor_path: self.config.preprocessor_obj_file_path.clone(),
        })
    }

    fn transform_splits(
        &self,
        train_path: &Path,
        test_path: &Path,
    ) -> Result<(Array2<f64>, Array2<f64>, DataPreprocessor)> {
        let loader = DataLoader::new();
        let mut train_df = loader.load_csv(train_path)?;
        let mut test_df = loader.load_csv(test_path)?;
        normalize_column_names(&mut train_df)?;
        normalize_column_names(&mut test_df)?;
        info!("Read train and test data completed");

        let mut preprocessor = DataPreprocessor::with_config(self.config.preprocessing.clone());
        info!("Applying preprocessing object on training dataframe and testing dataframe");
        let train_features = preprocessor.fit_transform(&train_df)?;
        let test_features = preprocessor.transform(&test_df)?;

        let train = append_target(train_features, self.target(&train_df)?)?;
        let test = append_target(test_features, self.target(&test_df)?)?;
        info!(
            train_shape = ?train.dim(),
            test_shape = ?test.dim(),
            features = preprocessor.feature_names().len(),
            "transformation finished"
        );
        Ok((train, test, preprocessor))
    }

    fn target(&self, df: &DataFrame) -> Result<Array1<f64>> {
        let name = &self.config.target_column;
        column_as_f64(df, name)?
            .into_iter()
            .map(|v| v.ok_or_else(|| MlError::DataError(format!("target column '{name}' has missing values"))))
            .collect()
    }
}

fn append_target(features: Array2<f64>, target: Array1<f64>) -> Result<Array2<f64>> {
    let target = target.insert_axis(Axis(1));
    Ok(concatenate(Axis(1), &[features.view(), target.view()])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_append_target() {
        let out = append_target(array![[1.0, 2.0], [3.0, 4.0]], array![9.0, 8.0]).unwrap();
        assert_eq!(out, array![[1.0, 2.0, 9.0], [3.0, 4.0, 8.0]]);
        assert!(append_target(array![[1.0]], array![1.0, 2.0]).is_err());
    }
}
