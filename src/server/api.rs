//! Route definitions

use std::sync::Arc;
use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

use super::{handlers, state::AppState};

async fn handle_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": true,
            "message": "Not found. Visit / for the web UI or /health to check server status.",
        })),
    )
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new().route("/predict", post(handlers::api_predict));

    Router::new()
        .route("/", get(handlers::serve_index))
        .route(
            "/predictdata",
            get(handlers::predict_form).post(handlers::predict_datapoint),
        )
        .route("/health", get(handlers::health_check))
        .nest("/api", api_routes)
        .fallback(handle_404)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
