use axum::{
    extract::{Multipart, State, multipart::MultipartError},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::validation::{ValidationError, check_extension, validate_upload};
use crate::{AppState, auth::Authorized, error::AppError};

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub image_id: String,
    pub filename: String,
    pub size: usize,
    pub uploaded_at: DateTime<Utc>,
}

pub async fn handle_image_upload(
    State(state): State<AppState>,
    _auth: Authorized,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let max_file_size = state.config.max_file_size;
    let multipart_error = |err: MultipartError| {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::Validation(ValidationError::FileTooLarge { max: max_file_size })
        } else {
            AppError::BadRequest(format!("Failed to read multipart: {}", err.body_text()))
        }
    };

    let mut file_data = None;
    let mut file_name = String::new();
    let mut content_type = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        file_name = field.file_name().unwrap_or("").to_string();
        content_type = field.content_type().map(str::to_string);

        // Reject by name before reading a body that may exceed the transport limit.
        check_extension(&file_name)
            .inspect_err(|e| tracing::warn!("Validation error for {}: {}", file_name, e))?;

        file_data = Some(field.bytes().await.map_err(multipart_error)?);
        break;
    }

    let file_bytes = file_data.ok_or_else(|| AppError::BadRequest("No file provided".to_string()))?;

    tracing::info!("Received upload request for file: {}", file_name);

    let kind = validate_upload(
        &file_name,
        content_type.as_deref(),
        &file_bytes,
        max_file_size,
    )
    .inspect_err(|e| tracing::warn!("Validation error for {}: {}", file_name, e))?;

    let record = state
        .store
        .store(&file_bytes, &file_name, kind, state.now())
        .await
        .map_err(|e| {
            AppError::Internal(
                anyhow::Error::new(e).context(format!("Failed to store upload {}", file_name)),
            )
        })?;

    tracing::info!(
        "Successfully uploaded image with ID: {} ({}, {} bytes)",
        record.image_id,
        kind,
        record.size
    );

    Ok(Json(UploadResponse {
        image_id: record.image_id,
        filename: record.filename,
        size: record.size,
        uploaded_at: record.uploaded_at,
    }))
}
