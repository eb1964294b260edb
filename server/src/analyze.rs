use axum::extract::{Json, State, rejection::JsonRejection};
use serde::Deserialize;

use crate::{
    AppState,
    auth::Authorized,
    error::AppError,
    media_ingestion::validation::is_valid_image_id,
    processing::AnalysisResult,
    storage::StorageError,
};

#[derive(Debug, Deserialize)]
pub struct AnalysisRequest {
    pub image_id: String,
}

pub async fn analyze_image(
    State(state): State<AppState>,
    _auth: Authorized,
    payload: Result<Json<AnalysisRequest>, JsonRejection>,
) -> Result<Json<AnalysisResult>, AppError> {
    let Json(request) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

    tracing::info!("Received analysis request for image_id: {}", request.image_id);

    if !is_valid_image_id(&request.image_id) {
        tracing::warn!("Invalid image_id format: {}", request.image_id);
        return Err(AppError::InvalidImageId);
    }

    let result = state
        .analyzer
        .analyze(&request.image_id, state.now())
        .await
        .map_err(|e| {
            if let StorageError::NotFound(id) = &e {
                tracing::warn!("Image not found: {}", id);
            }
            AppError::from(e)
        })?;

    tracing::info!("Successfully analyzed image: {}", request.image_id);
    Ok(Json(result))
}
