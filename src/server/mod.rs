//! Prediction web server
//!
//! Serves the landing page, the HTML prediction form and a small JSON API
//! on top of the persisted preprocessor and model.

mod api;
mod error;
mod handlers;
mod pages;
mod state;

pub use api::create_router;
pub use error::ServerError;
pub use handlers::PredictForm;
pub use state::AppState;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::pipeline::PredictionConfig;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub model_path: PathBuf,
    pub preprocessor_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let artifacts = PredictionConfig::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5001),
            model_path: std::env::var("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(artifacts.model_path),
            preprocessor_path: std::env::var("PREPROCESSOR_PATH")
                .map(PathBuf::from)
                .unwrap_or(artifacts.preprocessor_path),
        }
    }
}

impl ServerConfig {
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn prediction_config(&self) -> PredictionConfig {
        PredictionConfig::new(&self.model_path, &self.preprocessor_path)
    }
}

/// Start the server with the given configuration
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let start_time = chrono::Utc::now();
    if !config.model_path.exists() || !config.preprocessor_path.exists() {
        warn!(
            model_path = %config.model_path.display(),
            preprocessor_path = %config.preprocessor_path.display(),
            "Artifacts not found yet, predictions will fail until training has run"
        );
    }

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let state = Arc::new(AppState::new(config.clone()));
    let app = create_router(state);

    info!(
        address = %addr,
        started_at = %start_time.to_rfc3339(),
        "Prediction server starting"
    );
    info!(url = %format!("http://{}/predictdata", addr), "Prediction form available");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, pid = std::process::id(), "Server listening and ready to accept connections");

    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for ctrl+c");
            std::future::pending::<()>().await;
        }
        let stop_time = chrono::Utc::now();
        let uptime = stop_time.signed_duration_since(start_time);
        info!(
            stopped_at = %stop_time.to_rfc3339(),
            uptime_secs = uptime.num_seconds(),
            "Shutdown signal received, stopping server gracefully"
        );
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction_config_follows_paths() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 5001,
            model_path: PathBuf::from("a/model.pkl"),
            preprocessor_path: PathBuf::from("a/pre.pkl"),
        }
        .with_port(8000);
        assert_eq!(config.port, 8000);
        let prediction = config.prediction_config();
        assert_eq!(prediction.model_path, PathBuf::from("a/model.pkl"));
        assert_eq!(prediction.preprocessor_path, PathBuf::from("a/pre.pkl"));
    }
}
