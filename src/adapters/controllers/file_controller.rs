use std::{
    io,
    sync::{Arc, OnceLock},
};

use axum::{
    body::Body,
    extract::{multipart::MultipartError, rejection::PathRejection, Multipart, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
    Json,
};
use futures_util::TryStreamExt;
use tokio::fs;
use tokio_util::io::{ReaderStream, StreamReader};
use tracing::{info, warn};

use crate::{
    adapters::{dto::file_dto::FileResponse, state::AppState},
    application::error::ApplicationError,
    domain::models::file::StoredFile,
    services::StorageError,
};

const FILE_FIELD: &str = "file";

pub struct FileController;

impl FileController {
    /// POST /upload
    /// Multipart body with a `file` field; its filename becomes the original name.
    pub async fn upload_file(
        State(app_state): State<AppState>,
        headers: HeaderMap,
        mut multipart: Multipart,
    ) -> Result<Json<FileResponse>, ApplicationError> {
        while let Some(field) = multipart.next_field().await.map_err(|e| {
            warn!("Invalid multipart data: {}", e);
            body_error(e.status())
        })? {
            if field.name() != Some(FILE_FIELD) {
                continue;
            }

            let original_name = field
                .file_name()
                .map(str::to_string)
                .ok_or_else(|| {
                    warn!("Upload field '{}' has no filename", FILE_FIELD);
                    ApplicationError::BadRequest("Missing file name".to_string())
                })?;

            // The store only sees io::Error; remember why the body failed.
            let body_failure = Arc::new(OnceLock::new());
            let seen = body_failure.clone();
            let reader = StreamReader::new(field.map_err(move |e: MultipartError| {
                let _ = seen.set(e.status());
                io::Error::other(e)
            }));
            tokio::pin!(reader);

            let stored = app_state
                .storage_service
                .store(&original_name, &mut reader)
                .await
                .map_err(|e| match body_failure.get() {
                    Some(status) => body_error(*status),
                    None => e,
                })?;

            info!("File uploaded successfully: {}", stored.disk_name());
            let base_url = app_state.base_url(&headers);
            return Ok(Json(FileResponse::new(&stored, &base_url)));
        }

        warn!("Missing required '{}' field in upload", FILE_FIELD);
        Err(ApplicationError::BadRequest(
            "Missing required field 'file'".to_string(),
        ))
    }

    /// GET /file/{id}/{name}
    pub async fn download_file(
        State(app_state): State<AppState>,
        path: Result<Path<(String, String)>, PathRejection>,
    ) -> Result<Response, ApplicationError> {
        let file = stored_file_from_path(path)?;
        let file_path = app_state.storage_service.retrieve(&file).await?;

        // The file may vanish between lookup and open.
        let handle = fs::File::open(&file_path)
            .await
            .map_err(StorageError::from)?;
        let size = handle.metadata().await.map_err(StorageError::from)?.len();
        let mime_type = mime_guess::from_path(&file.original_name).first_or_octet_stream();

        info!("Serving {} ({} bytes)", file.disk_name(), size);

        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, mime_type.as_ref())
            .header(header::CONTENT_LENGTH, size)
            .body(Body::from_stream(ReaderStream::new(handle)))
            .map_err(|e| ApplicationError::InternalError(e.to_string()))
    }

    /// DELETE /file/{id}/{name}
    pub async fn delete_file(
        State(app_state): State<AppState>,
        path: Result<Path<(String, String)>, PathRejection>,
    ) -> Result<(StatusCode, &'static str), ApplicationError> {
        let file = stored_file_from_path(path)?;
        app_state.storage_service.remove(&file).await?;

        info!("File deleted successfully: {}", file.disk_name());
        Ok((StatusCode::OK, "File deleted successfully"))
    }

    /// GET /files
    pub async fn list_files(
        State(app_state): State<AppState>,
        headers: HeaderMap,
    ) -> Result<Json<Vec<FileResponse>>, ApplicationError> {
        let files = app_state.storage_service.list().await?;
        let base_url = app_state.base_url(&headers);

        info!("Files listed successfully: {} entries", files.len());
        Ok(Json(
            files
                .iter()
                .map(|file| FileResponse::new(file, &base_url))
                .collect(),
        ))
    }
}

fn stored_file_from_path(
    path: Result<Path<(String, String)>, PathRejection>,
) -> Result<StoredFile, ApplicationError> {
    let Path((identifier, original_name)) = path.map_err(|e| {
        warn!("Invalid path parameters: {}", e);
        ApplicationError::BadRequest("Invalid file name".to_string())
    })?;
    Ok(StoredFile::new(identifier, original_name))
}

fn body_error(status: StatusCode) -> ApplicationError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApplicationError::PayloadTooLarge
    } else {
        ApplicationError::BadRequest("Invalid request format".to_string())
    }
}
