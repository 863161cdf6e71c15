//! Application state management

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::error::{PipelineError, PipelineResult, Stage};
use crate::pipeline::PredictPipeline;

use super::ServerConfig;

/// Application state shared across handlers
pub struct AppState {
    pub config: ServerConfig,
    pipeline: RwLock<Option<Arc<PredictPipeline>>>,
}

impl AppState {
    /// State whose pipeline is loaded from disk on the first prediction
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            pipeline: RwLock::new(None),
        }
    }

    /// State with an already loaded pipeline
    pub fn with_pipeline(config: ServerConfig, pipeline: PredictPipeline) -> Self {
        Self {
            config,
            pipeline: RwLock::new(Some(Arc::new(pipeline))),
        }
    }

    pub async fn model_loaded(&self) -> bool {
        self.pipeline.read().await.is_some()
    }

    /// Shared pipeline, loading the artifacts on first use. A failed load
    /// is not cached, so a later request retries once artifacts exist.
    pub async fn pipeline(&self) -> PipelineResult<Arc<PredictPipeline>> {
        if let Some(pipeline) = self.pipeline.read().await.as_ref() {
            return Ok(Arc::clone(pipeline));
        }

        let mut slot = self.pipeline.write().await;
        if let Some(pipeline) = slot.as_ref() {
            return Ok(Arc::clone(pipeline));
        }
        let config = self.config.prediction_config();
        let loaded = tokio::task::spawn_blocking(move || PredictPipeline::load(&config))
            .await
            .map_err(join_error)??;
        let pipeline = Arc::new(loaded);
        info!(model = pipeline.model().kind(), "Prediction pipeline ready");
        *slot = Some(Arc::clone(&pipeline));
        Ok(pipeline)
    }
}

/// A blocking task that panicked or was cancelled
pub(super) fn join_error(e: tokio::task::JoinError) -> PipelineError {
    PipelineError::new(Stage::Serving, std::io::Error::other(e))
}
