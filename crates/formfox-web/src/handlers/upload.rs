use std::sync::Arc;

use axum::Json;
use axum::extract::{Multipart, State};

use crate::error::ApiError;
use crate::models::UploadResponse;
use crate::state::AppState;
use crate::upload;

/// Accept a multipart PDF upload and park it in temp storage. The returned
/// temp id feeds the extraction endpoint.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let file = upload::read_pdf_part(&mut multipart, state.max_upload_bytes)
        .await
        .map_err(ApiError::bad_request)?;

    let temp_id = upload::save_upload(&state.upload_dir, &file).map_err(|e| {
        tracing::error!(error = %e, "failed to store upload");
        ApiError::internal("Der Upload konnte nicht gespeichert werden.")
    })?;

    tracing::info!(temp_id = %temp_id, bytes = file.data.len(), "stored upload");
    Ok(Json(UploadResponse {
        success: true,
        temp_id,
        original_name: file.filename,
    }))
}
