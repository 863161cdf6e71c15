//! mlproject - student score regression pipeline
//!
//! Predicts a student's math score from demographic attributes and the
//! reading and writing scores:
//! - Ingestion of the raw CSV and a seeded train/test split
//! - Column preprocessing (imputation, scaling, one-hot encoding)
//! - Evaluation of a fixed set of regressors with grid search
//! - Persistence of the best model and the fitted preprocessor
//! - Batch prediction and a web form for single predictions
//!
//! # Modules
//!
//! ## Pipeline
//! - [`pipeline`] - Ingestion, transformation and prediction stages
//! - [`preprocessing`] - Imputation, scaling, encoding
//! - [`training`] - Regressors, grid search, evaluation and the trainer
//!
//! ## Infrastructure
//! - [`artifacts`] - Binary persistence of fitted objects
//! - [`config`] - Hyperparameter grid loading
//! - [`logging`] - Console and file logging setup
//! - [`utils`] - CSV loading and column helpers
//!
//! ## Services
//! - [`server`] - HTTP server with the prediction form and JSON API
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Pipeline
pub mod pipeline;
pub mod preprocessing;
pub mod training;

// Infrastructure
pub mod artifacts;
pub mod config;
pub mod logging;
pub mod utils;

// Services
pub mod server;
pub mod cli;

pub use error::{MlError, PipelineError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{MlError, PipelineError, PipelineResult, Result, Stage, StageExt};

    // Pipeline stages
    pub use crate::pipeline::{
        CustomData, DataIngestion, DataIngestionConfig, DataTransformation, DataTransformationConfig,
        PredictPipeline, PredictionConfig,
    };

    // Preprocessing
    pub use crate::preprocessing::{DataPreprocessor, PreprocessingConfig};

    // Training
    pub use crate::training::{
        Candidate, Estimator, EvaluationReport, GridSearchCv, ModelTrainer, ModelTrainerConfig,
        Regressor, TrainingSummary,
    };

    // Configuration and persistence
    pub use crate::artifacts::{load_object, save_object};
    pub use crate::config::{load_model_params, ModelParams, ParamGrid, ParamValue};
}
