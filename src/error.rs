//! Error types for the pipeline
//!
//! `MlError` is the cause taxonomy used by every component. At component
//! boundaries a cause is tagged with the [`Stage`] it failed in, producing a
//! [`PipelineError`] that also remembers where it was raised.

use std::fmt;
use std::panic::Location;

use thiserror::Error;

/// Result type alias for component-level operations
pub type Result<T> = std::result::Result<T, MlError>;

/// Result type alias for stage-tagged pipeline operations
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Underlying cause of a failure
#[derive(Error, Debug)]
pub enum MlError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Preprocessing error: {0}")]
    PreprocessingError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("No best model found: best R2 score {best:.4} is below {threshold}")]
    BelowThreshold { best: f64, threshold: f64 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl MlError {
    pub(crate) fn invalid_param(name: &str, value: impl fmt::Display, reason: &str) -> Self {
        MlError::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<polars::error::PolarsError> for MlError {
    fn from(err: polars::error::PolarsError) -> Self {
        MlError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for MlError {
    fn from(err: serde_json::Error) -> Self {
        MlError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for MlError {
    fn from(err: serde_yaml::Error) -> Self {
        MlError::ConfigError(err.to_string())
    }
}

impl From<bincode::Error> for MlError {
    fn from(err: bincode::Error) -> Self {
        MlError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for MlError {
    fn from(err: ndarray::ShapeError) -> Self {
        MlError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

/// Pipeline stage a failure is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Ingestion,
    Transformation,
    Evaluation,
    Persistence,
    Serving,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Ingestion => "ingestion",
            Stage::Transformation => "transformation",
            Stage::Evaluation => "evaluation",
            Stage::Persistence => "persistence",
            Stage::Serving => "serving",
        };
        f.write_str(name)
    }
}

/// A cause tagged with the stage and source location it surfaced at
#[derive(Error, Debug)]
#[error("{stage} failed at {}:{}: {cause}", .location.file(), .location.line())]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub cause: MlError,
    pub location: &'static Location<'static>,
}

impl PipelineError {
    #[track_caller]
    pub fn new(stage: Stage, cause: impl Into<MlError>) -> Self {
        Self {
            stage,
            cause: cause.into(),
            location: Location::caller(),
        }
    }
}

/// Tag a component result with the stage it belongs to.
pub trait StageExt<T> {
    fn stage(self, stage: Stage) -> PipelineResult<T>;
}

impl<T, E: Into<MlError>> StageExt<T> for std::result::Result<T, E> {
    #[track_caller]
    fn stage(self, stage: Stage) -> PipelineResult<T> {
        match self {
            Ok(value) => Ok(value),
            Err(err) => Err(PipelineError::new(stage, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MlError::DataError("test error".to_string());
        assert_eq!(err.to_string(), "Data error: test error");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: MlError = io_err.into();
        assert!(matches!(err, MlError::IoError(_)));
    }

    #[test]
    fn test_stage_tagging_records_caller() {
        let res: Result<()> = Err(MlError::ModelNotFitted);
        let err = res.stage(Stage::Persistence).unwrap_err();
        assert_eq!(err.stage, Stage::Persistence);
        assert!(matches!(err.cause, MlError::ModelNotFitted));
        assert!(err.location.file().ends_with("error.rs"));
        let text = err.to_string();
        assert!(text.starts_with("persistence failed at"));
        assert!(text.ends_with("Model not fitted"));
    }

    #[test]
    fn test_below_threshold_message() {
        let err = MlError::BelowThreshold { best: 0.42, threshold: 0.6 };
        assert_eq!(
            err.to_string(),
            "No best model found: best R2 score 0.4200 is below 0.6"
        );
    }
}
