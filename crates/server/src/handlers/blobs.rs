//! Blob upload and download handlers.

use crate::auth::BloberKey;
use crate::error::{ApiError, ApiResult};
use crate::handlers::common::{reject_malformed, respond};
use crate::service::{Access, FileUpload};
use crate::state::AppState;
use axum::body::Body;
use axum::extract::multipart::{Field, Multipart, MultipartRejection};
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::response::Response;

/// Multipart field of a single upload.
pub const SINGLE_FILE_FIELD: &str = "file_data";
/// Multipart field repeated once per file of a batch upload.
pub const BATCH_FILE_FIELD: &str = "files[]";
/// Multipart field set to `true` to make the upload private.
pub const PRIVATE_FIELD: &str = "private";

/// Files and flags read from an upload form.
#[derive(Default)]
struct UploadForm {
    files: Vec<FileUpload>,
    is_private: bool,
}

async fn read_file(field: Field<'_>) -> ApiResult<FileUpload> {
    let filename = field.file_name().unwrap_or_default().to_string();
    let data = field.bytes().await.map_err(reject_malformed)?;
    Ok(FileUpload { filename, data })
}

/// Read every field of `multipart`, keeping files named `file_field`.
async fn read_form(mut multipart: Multipart, file_field: &str) -> ApiResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(reject_malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == file_field {
            form.files.push(read_file(field).await?);
        } else if name == PRIVATE_FIELD {
            let value = field.text().await.map_err(reject_malformed)?;
            form.is_private = value.trim() == "true";
        }
    }

    Ok(form)
}

/// POST /{app_name}/upload - Store one file.
pub async fn upload_blob(
    State(state): State<AppState>,
    key: BloberKey,
    Path(app_name): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Response> {
    let caller = state
        .service
        .resolve_caller(key.as_deref(), Access::Any)
        .await?;
    let form = read_form(multipart.map_err(reject_malformed)?, SINGLE_FILE_FIELD).await?;

    let Some(file) = form.files.into_iter().next() else {
        return Err(ApiError::bad_request());
    };

    let blob = state
        .service
        .upload_blob(&caller, &app_name, file, form.is_private)
        .await?;
    Ok(respond(StatusCode::OK, "success", blob))
}

/// POST /{app_name}/uploads - Store several files.
pub async fn upload_blobs(
    State(state): State<AppState>,
    key: BloberKey,
    Path(app_name): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Response> {
    let caller = state
        .service
        .resolve_caller(key.as_deref(), Access::Any)
        .await?;
    let form = read_form(multipart.map_err(reject_malformed)?, BATCH_FILE_FIELD).await?;

    if form.files.is_empty() {
        return Err(ApiError::BadRequest("no file found".to_string()));
    }

    let batch = state
        .service
        .upload_blobs(&caller, &app_name, form.files, form.is_private)
        .await?;
    Ok(respond(StatusCode::OK, "success", batch))
}

/// GET /{namespace}/{hash} and /{namespace}/{hash}/download - Stream a blob.
pub async fn download_blob(
    State(state): State<AppState>,
    key: BloberKey,
    path: Result<Path<(String, String)>, PathRejection>,
) -> ApiResult<Response> {
    let Path((namespace, hash)) = path.map_err(reject_malformed)?;
    if namespace.is_empty() || hash.is_empty() {
        return Err(ApiError::bad_request());
    }

    let download = state
        .service
        .download_blob(key.as_deref(), &namespace, &hash)
        .await?;

    let blob = download.blob;
    let filename = attachment_filename(&blob.filename, &blob.hash);

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, &blob.content_type)
        .header(
            CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        )
        .header(CONTENT_LENGTH, blob.size)
        .body(Body::from_stream(download.stream))
        .map_err(|e| ApiError::Download(format!("failed to build response: {e}")))
}

/// Filename safe to quote in a `Content-Disposition` header.
///
/// Falls back to the blob hash when nothing printable remains.
fn attachment_filename(filename: &str, hash: &str) -> String {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches(['_', ' ', '.']).is_empty() {
        hash.to_string()
    } else {
        cleaned
    }
}
