use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub status: String,
}

/// POST /api/submit-feedback
pub async fn handle_submit_feedback(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<FeedbackResponse>, AppError> {
    let Json(body) = body.map_err(|e| AppError::Validation(e.body_text()))?;
    let entry = match body {
        Value::Object(map) => map,
        _ => return Err(AppError::Validation("Feedback must be a JSON object".into())),
    };

    let log = state.feedback.clone();
    tokio::task::spawn_blocking(move || log.append(&entry))
        .await
        .map_err(|e| AppError::Internal(e.into()))?
        .map_err(|e| AppError::Storage(format!("Could not save feedback: {e}")))?;

    Ok(Json(FeedbackResponse {
        status: "Feedback saved".to_string(),
    }))
}
