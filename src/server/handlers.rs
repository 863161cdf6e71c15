//! HTTP request handlers

use std::sync::Arc;
use axum::{
    extract::{rejection::JsonRejection, FromRequest, Multipart, Request, State},
    http::header,
    response::Html,
    Form, Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::error::{MlError, PipelineResult, Stage, StageExt};
use crate::pipeline::CustomData;

use super::error::{Result, ServerError};
use super::pages;
use super::state::{join_error, AppState};

// ============================================================================
// UI Handlers
// ============================================================================

pub async fn serve_index() -> Html<String> {
    Html(pages::index())
}

pub async fn predict_form() -> Html<String> {
    Html(pages::predict_form(None))
}

/// Raw form fields. Every field is optional so a partial submission still
/// reaches the handler and gets rendered as an error message.
#[derive(Debug, Default, Deserialize)]
pub struct PredictForm {
    pub gender: Option<String>,
    pub race_ethnicity: Option<String>,
    pub parental_level_of_education: Option<String>,
    pub lunch: Option<String>,
    pub test_preparation_course: Option<String>,
    pub reading_score: Option<String>,
    pub writing_score: Option<String>,
}

impl PredictForm {
    /// Scores that are missing or not integers become 0
    /// Set a field by its form name. Unknown names are ignored.
    fn set_field(&mut self, name: &str, value: String) {
        let slot = match name {
            "gender" => &mut self.gender,
            "race_ethnicity" => &mut self.race_ethnicity,
            "parental_level_of_education" => &mut self.parental_level_of_education,
            "lunch" => &mut self.lunch,
            "test_preparation_course" => &mut self.test_preparation_course,
            "reading_score" => &mut self.reading_score,
            "writing_score" => &mut self.writing_score,
            _ => return,
        };
        *slot = Some(value);
    }

    pub fn into_custom_data(self) -> CustomData {
        CustomData {
            gender: self.gender,
            race_ethnicity: self.race_ethnicity,
            parental_level_of_education: self.parental_level_of_education,
            lunch: self.lunch,
            test_preparation_course: self.test_preparation_course,
            reading_score: parse_score(self.reading_score.as_deref()),
            writing_score: parse_score(self.writing_score.as_deref()),
        }
    }
}

fn parse_score(raw: Option<&str>) -> i64 {
    raw.and_then(|s| s.trim().parse().ok()).unwrap_or(0)
}

/// Read the submitted fields from an urlencoded or multipart body
async fn read_form(request: Request) -> std::result::Result<PredictForm, String> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    if !is_multipart {
        let Form(form) = Form::<PredictForm>::from_request(request, &())
            .await
            .map_err(|e| e.to_string())?;
        return Ok(form);
    }

    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| e.to_string())?;
    let mut form = PredictForm::default();
    while let Some(field) = multipart.next_field().await.map_err(|e| e.to_string())? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let value = field.text().await.map_err(|e| e.to_string())?;
        form.set_field(&name, value);
    }
    Ok(form)
}

/// Form submission. Failures are shown on the page, never as an HTTP error.
pub async fn predict_datapoint(State(state): State<Arc<AppState>>, request: Request) -> Html<String> {
    let form = match read_form(request).await {
        Ok(form) => form,
        Err(e) => {
            error!(error = %e, "Unreadable form submission");
            return Html(pages::predict_form(Some(&format!("Error during prediction: {e}"))));
        }
    };
    let data = form.into_custom_data();
    let message = match predict_one(&state, data).await {
        Ok(prediction) => {
            let rounded = round2(prediction);
            info!(prediction = rounded, "Form prediction served");
            rounded.to_string()
        }
        Err(e) => {
            error!(error = %e, "Form prediction failed");
            format!("Error during prediction: {}", e.cause)
        }
    };
    Html(pages::predict_form(Some(&message)))
}

// ============================================================================
// API Handlers
// ============================================================================

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "model_loaded": state.model_loaded().await,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// JSON prediction for one record
pub async fn api_predict(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<CustomData>, JsonRejection>,
) -> Result<Json<serde_json::Value>> {
    let Json(data) = payload.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    let prediction = predict_one(&state, data).await?;
    Ok(Json(json!({ "prediction": prediction })))
}

async fn predict_one(state: &AppState, data: CustomData) -> PipelineResult<f64> {
    let pipeline = state.pipeline().await?;
    tokio::task::spawn_blocking(move || {
        let frame = data.get_data_as_data_frame().stage(Stage::Serving)?;
        let predictions = pipeline.predict(&frame)?;
        predictions
            .first()
            .copied()
            .ok_or_else(|| MlError::InvalidInput("model returned no prediction".to_string()))
            .stage(Stage::Serving)
    })
    .await
    .map_err(join_error)?
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_score() {
        assert_eq!(parse_score(Some("72")), 72);
        assert_eq!(parse_score(Some(" 64 ")), 64);
        assert_eq!(parse_score(Some("abc")), 0);
        assert_eq!(parse_score(Some("")), 0);
        assert_eq!(parse_score(None), 0);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(72.456), 72.46);
        assert_eq!(round2(-1.004), -1.0);
    }

    #[test]
    fn test_form_into_custom_data() {
        let form = PredictForm {
            gender: Some("male".to_string()),
            reading_score: Some("abc".to_string()),
            writing_score: Some("81".to_string()),
            ..Default::default()
        };
        let data = form.into_custom_data();
        assert_eq!(data.gender.as_deref(), Some("male"));
        assert_eq!(data.reading_score, 0);
        assert_eq!(data.writing_score, 81);
        assert!(data.lunch.is_none());
    }

    #[test]
    fn test_form_set_field() {
        let mut form = PredictForm::default();
        form.set_field("lunch", "standard".to_string());
        form.set_field("writing_score", "74".to_string());
        form.set_field("unknown", "x".to_string());
        assert_eq!(form.lunch.as_deref(), Some("standard"));
        assert_eq!(form.writing_score.as_deref(), Some("74"));
        assert!(form.gender.is_none());
    }
}
