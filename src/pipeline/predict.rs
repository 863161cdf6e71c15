//! Inference with the persisted preprocessor and model

use std::path::{Path, PathBuf};

use ndarray::Array1;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::artifacts::load_object;
use crate::error::{PipelineResult, Result, Stage, StageExt};
use crate::preprocessing::DataPreprocessor;
use crate::training::{Estimator, Regressor};
use crate::utils::{normalize_column_names, DataLoader, DataSaver};

#[derive(Debug, Clone)]
pub struct PredictionConfig {
    pub model_path: PathBuf,
    pub preprocessor_path: PathBuf,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("artifacts").join("model.pkl"),
            preprocessor_path: PathBuf::from("artifacts").join("preprocessor.pkl"),
        }
    }
}

impl PredictionConfig {
    pub fn new(model_path: impl Into<PathBuf>, preprocessor_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            preprocessor_path: preprocessor_path.into(),
        }
    }
}

/// Loaded artifacts, read-only once constructed
#[derive(Debug, Clone)]
pub struct PredictPipeline {
    preprocessor: DataPreprocessor,
    model: Estimator,
}

impl PredictPipeline {
    pub fn new(preprocessor: DataPreprocessor, model: Estimator) -> Self {
        Self { preprocessor, model }
    }

    pub fn load(config: &PredictionConfig) -> PipelineResult<Self> {
        let model: Estimator = load_object(&config.model_path).stage(Stage::Persistence)?;
        let preprocessor: DataPreprocessor =
            load_object(&config.preprocessor_path).stage(Stage::Persistence)?;
        info!(
            model = model.kind(),
            model_path = %config.model_path.display(),
            "prediction pipeline loaded"
        );
        Ok(Self::new(preprocessor, model))
    }

    pub fn model(&self) -> &Estimator {
        &self.model
    }

    pub fn preprocessor(&self) -> &DataPreprocessor {
        &self.preprocessor
    }

    /// Predict one value per row of `features`. Headers are normalized first,
    /// so raw dataset headers are accepted too.
    pub fn predict(&self, features: &DataFrame) -> PipelineResult<Array1<f64>> {
        let mut frame = features.clone();
        normalize_column_names(&mut frame).stage(Stage::Serving)?;
        let x = self.preprocessor.transform(&frame).stage(Stage::Serving)?;
        let predictions = self.model.predict(&x).stage(Stage::Serving)?;
        debug!(rows = predictions.len(), "prediction finished");
        Ok(predictions)
    }

    /// Predict every row of a CSV file; optionally write the rows back with a
    /// `prediction` column appended.
    pub fn predict_csv(&self, input: &Path, output: Option<&Path>) -> PipelineResult<Array1<f64>> {
        let mut df = DataLoader::new().load_csv(input).stage(Stage::Serving)?;
        let predictions = self.predict(&df)?;
        if let Some(output) = output {
            df.with_column(Series::new("prediction".into(), predictions.to_vec()))
                .stage(Stage::Serving)?;
            DataSaver::save_csv(&mut df, output).stage(Stage::Persistence)?;
            info!(path = %output.display(), rows = predictions.len(), "wrote predictions");
        }
        Ok(predictions)
    }
}

/// One student's attributes, as entered in the form or the JSON API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomData {
    pub gender: Option<String>,
    pub race_ethnicity: Option<String>,
    pub parental_level_of_education: Option<String>,
    pub lunch: Option<String>,
    pub test_preparation_course: Option<String>,
    #[serde(default)]
    pub reading_score: i64,
    #[serde(default)]
    pub writing_score: i64,
}

impl CustomData {
    /// Single-row frame with the preprocessor's column names. Missing
    /// categorical values stay null and are imputed downstream.
    pub fn get_data_as_data_frame(&self) -> Result<DataFrame> {
        let df = df! {
            "gender" => [self.gender.as_deref()],
            "race_ethnicity" => [self.race_ethnicity.as_deref()],
            "parental_level_of_education" => [self.parental_level_of_education.as_deref()],
            "lunch" => [self.lunch.as_deref()],
            "test_preparation_course" => [self.test_preparation_course.as_deref()],
            "reading_score" => [self.reading_score],
            "writing_score" => [self.writing_score],
        }?;
        Ok(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{column_as_f64, column_as_strings};

    #[test]
    fn test_custom_data_frame() {
        let data = CustomData {
            gender: Some("female".to_string()),
            race_ethnicity: None,
            parental_level_of_education: Some("master's degree".to_string()),
            lunch: Some("standard".to_string()),
            test_preparation_course: Some("none".to_string()),
            reading_score: 72,
            writing_score: 74,
        };
        let df = data.get_data_as_data_frame().unwrap();
        assert_eq!(df.height(), 1);
        assert_eq!(df.width(), 7);
        assert_eq!(column_as_strings(&df, "race_ethnicity").unwrap(), vec![None]);
        assert_eq!(column_as_f64(&df, "writing_score").unwrap(), vec![Some(74.0)]);
    }

    #[test]
    fn test_custom_data_json_defaults() {
        let data: CustomData = serde_json::from_str(r#"{"gender": "male"}"#).unwrap();
        assert_eq!(data.gender.as_deref(), Some("male"));
        assert_eq!(data.reading_score, 0);
        assert!(data.lunch.is_none());
    }

    #[test]
    fn test_load_missing_artifacts() {
        let config = PredictionConfig::new("/nonexistent/model.pkl", "/nonexistent/pre.pkl");
        let err = PredictPipeline::load(&config).unwrap_err();
        assert_eq!(err.stage, Stage::Persistence);
    }
}
