use super::types::{ErrorResponse, PredictRequest, PredictResponse};
use crate::classifier::SentimentModel;
use axum::{
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
};
use std::sync::Arc;
use tracing::{debug, error, warn};

#[derive(Clone)]
pub struct AppState {
    pub model: Arc<dyn SentimentModel>,
}

impl AppState {
    pub fn new(model: Arc<dyn SentimentModel>) -> Self {
        Self { model }
    }
}

type ErrorReply = (StatusCode, Json<ErrorResponse>);

pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>, ErrorReply> {
    let Json(request) = payload.map_err(|rejection| {
        warn!("Rejected predict request: {}", rejection.body_text());
        (
            rejection.status(),
            Json(ErrorResponse {
                error: rejection.body_text(),
            }),
        )
    })?;

    debug!("Received predict request ({} chars)", request.text.chars().count());

    let model = Arc::clone(&state.model);
    let text = request.text.clone();
    let sentiment = tokio::task::spawn_blocking(move || model.classify(&text))
        .await
        .map_err(|e| {
            error!("Inference task failed: {}", e);
            internal_error(format!("Inference task failed: {}", e))
        })?
        .map_err(|e| {
            error!("Failed to classify text: {}", e);
            internal_error(format!("Processing error: {}", e))
        })?;

    debug!("Predicted sentiment: {}", sentiment);

    Ok(Json(PredictResponse {
        text: request.text,
        sentiment,
    }))
}

fn internal_error(message: String) -> ErrorReply {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse { error: message }),
    )
}
