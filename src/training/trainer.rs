//! Model selection and persistence

use std::path::PathBuf;

use ndarray::{s, Array1, Array2};
use serde::Serialize;
use tracing::{error, info, warn};

use super::estimator::{default_candidates, Candidate};
use super::evaluator::{evaluate_models, EvaluationReport};
use super::models::{r2_score, Regressor};
use crate::artifacts::save_object;
use crate::config::load_model_params;
use crate::error::{MlError, PipelineError, PipelineResult, Result, Stage, StageExt};

/// Paths and quality gate of a training run
#[derive(Debug, Clone)]
pub struct ModelTrainerConfig {
    pub trained_model_file_path: PathBuf,
    pub model_params_path: PathBuf,
    /// Best test R² required before anything is persisted
    pub min_score: f64,
}

impl Default for ModelTrainerConfig {
    fn default() -> Self {
        Self {
            trained_model_file_path: PathBuf::from("artifacts").join("model.pkl"),
            model_params_path: PathBuf::from("config").join("model_params.yaml"),
            min_score: 0.6,
        }
    }
}

impl ModelTrainerConfig {
    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.trained_model_file_path = path.into();
        self
    }

    pub fn with_params_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_params_path = path.into();
        self
    }

    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }
}

/// Outcome of a successful training run
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub best_model_name: String,
    /// Test R² of the winner as reported by the evaluation
    pub best_score: f64,
    /// Test R² recomputed from the persisted model
    pub final_score: f64,
    pub report: EvaluationReport,
    pub model_path: PathBuf,
}

pub struct ModelTrainer {
    config: ModelTrainerConfig,
}

impl ModelTrainer {
    pub fn new(config: ModelTrainerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ModelTrainerConfig {
        &self.config
    }

    /// Train the standard candidate set. Both arrays carry the target in
    /// their last column.
    pub fn initiate_model_trainer(
        &self,
        train_array: &Array2<f64>,
        test_array: &Array2<f64>,
    ) -> PipelineResult<TrainingSummary> {
        self.train_candidates(train_array, test_array, default_candidates())
    }

    /// Evaluate `candidates`, gate on the best score, and persist the winner
    pub fn train_candidates<R>(
        &self,
        train_array: &Array2<f64>,
        test_array: &Array2<f64>,
        candidates: Vec<Candidate<R>>,
    ) -> PipelineResult<TrainingSummary>
    where
        R: Regressor + Clone + Serialize,
    {
        info!("Split training and test input data");
        let (x_train, y_train) = split_features_target(train_array).stage(Stage::Evaluation)?;
        let (x_test, y_test) = split_features_target(test_array).stage(Stage::Evaluation)?;

        let params = load_model_params(&self.config.model_params_path)
            .inspect_err(|e| error!(path = %self.config.model_params_path.display(), error = %e, "cannot load model parameters"))
            .stage(Stage::Evaluation)?;

        let (report, mut fitted) =
            evaluate_models(&x_train, &y_train, &x_test, &y_test, candidates, &params)?;

        for entry in report.leaderboard() {
            info!(model = %entry.name, test_r2 = entry.test_score, train_r2 = entry.train_score, "leaderboard");
        }

        let best = report
            .best()
            .ok_or_else(|| {
                PipelineError::new(
                    Stage::Evaluation,
                    MlError::TrainingError("no model produced a finite score".to_string()),
                )
            })?
            .clone();

        if best.test_score < self.config.min_score {
            warn!(
                model = %best.name,
                best_r2 = best.test_score,
                threshold = self.config.min_score,
                "best model is below the quality threshold; nothing persisted"
            );
            return Err(PipelineError::new(
                Stage::Evaluation,
                MlError::BelowThreshold {
                    best: best.test_score,
                    threshold: self.config.min_score,
                },
            ));
        }
        info!(model = %best.name, test_r2 = best.test_score, "Best found model on both training and testing dataset");

        let model = fitted.remove(&best.name).ok_or_else(|| {
            PipelineError::new(
                Stage::Evaluation,
                MlError::TrainingError(format!("fitted model '{}' is missing", best.name)),
            )
        })?;

        save_object(&self.config.trained_model_file_path, &model).stage(Stage::Persistence)?;

        let predicted = model.predict(&x_test).stage(Stage::Evaluation)?;
        let final_score = r2_score(&y_test, &predicted).stage(Stage::Evaluation)?;

        Ok(TrainingSummary {
            best_model_name: best.name,
            best_score: best.test_score,
            final_score,
            report,
            model_path: self.config.trained_model_file_path.clone(),
        })
    }
}

/// All columns but the last as features, the last as target
pub fn split_features_target(data: &Array2<f64>) -> Result<(Array2<f64>, Array1<f64>)> {
    let n_cols = data.ncols();
    if n_cols < 2 {
        return Err(MlError::ShapeError {
            expected: "at least one feature column and a target column".to_string(),
            actual: format!("{n_cols} columns"),
        });
    }
    let x = data.slice(s![.., ..n_cols - 1]).to_owned();
    let y = data.column(n_cols - 1).to_owned();
    Ok((x, y))
}
