//! File API endpoints: upload, listing, blob delivery and extraction.

use axum::{
    Json,
    extract::{Multipart, Path, State, multipart::MultipartError, rejection::JsonRejection},
    http::{StatusCode, header},
    response::IntoResponse,
};
use std::sync::Arc;

use crate::blob::PDF_CONTENT_TYPE;
use crate::db::{FileRecord, Invoice};
use crate::error::{I18nError, ServiceError, StorageError};
use crate::service::ExtractRequest;

use super::AppState;

/// Upload a PDF from the multipart field `file`
pub async fn upload_file_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<FileRecord>, I18nError> {
    let max = state.service.config.limits.max_upload_size_bytes;
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| state.i18n_error(multipart_error(e, max)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("invoice.pdf").to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| state.i18n_error(multipart_error(e, max)))?;
        upload = Some((file_name, content_type, data));
    }

    let (file_name, content_type, data) =
        upload.ok_or_else(|| state.i18n_error(ServiceError::NoFileProvided))?;

    let record = state
        .service
        .upload_file(&file_name, content_type.as_deref(), data)
        .await
        .map_err(|e| state.i18n_error(e))?;
    Ok(Json(record))
}

/// List uploaded files, newest first
pub async fn list_files_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<FileRecord>>, I18nError> {
    let files = state.service.list_files().map_err(|e| state.i18n_error(e))?;
    Ok(Json(files))
}

/// Serve a stored PDF
pub async fn get_blob_handler(
    State(state): State<Arc<AppState>>,
    Path(pathname): Path<String>,
) -> Result<impl IntoResponse, I18nError> {
    let data = state
        .service
        .read_blob(&pathname)
        .await
        .map_err(|e| state.i18n_error(e))?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, PDF_CONTENT_TYPE),
            (header::CONTENT_DISPOSITION, "inline"),
        ],
        data,
    ))
}

/// Run extraction for `{fileUrl, fileName?, model}`
pub async fn extract_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ExtractRequest>, JsonRejection>,
) -> Result<Json<Invoice>, I18nError> {
    let Json(request) = payload.map_err(|e| state.i18n_error(invalid_body(e)))?;

    let invoice = state
        .service
        .extract_invoice(request)
        .await
        .map_err(|e| state.i18n_error(e))?;
    Ok(Json(invoice))
}

fn multipart_error(error: MultipartError, max: u64) -> ServiceError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        StorageError::FileTooLarge { max }.into()
    } else {
        ServiceError::InvalidRequest {
            message: error.body_text(),
        }
    }
}

pub(super) fn invalid_body(rejection: JsonRejection) -> ServiceError {
    ServiceError::InvalidRequest {
        message: rejection.body_text(),
    }
}
