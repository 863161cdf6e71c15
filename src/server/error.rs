//! Error types for the server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::error::{PipelineError, Stage};

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ServerError::Pipeline(e) if e.stage == Stage::Persistence => {
                tracing::error!(error = %e, "Prediction artifacts unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Model artifacts are not available. Run the training pipeline first.".to_string(),
                )
            }
            // Serving failures come from the submitted record
            ServerError::Pipeline(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.cause.to_string()),
        };

        let body = Json(json!({
            "error": true,
            "message": message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
