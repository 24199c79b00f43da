use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tracing::info;
use utoipa::OpenApi;

use launchpad_infra::random_filename;
use launchpad_infra::storage::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_SIZE_MB};

use super::dto::{FileInfo, ListQuery, UploadQuery, UploadResponse};
use crate::context::{AppState, CurrentUser};
use crate::errors::ApiError;

#[derive(OpenApi)]
#[openapi(
    paths(list_files, upload_file, stream_file, download_file, delete_file),
    components(schemas(FileInfo, UploadResponse))
)]
pub struct FilesApi;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_files).post(upload_file))
        .route(
            "/*key",
            get(download_file).put(stream_file).delete(delete_file),
        )
        .layer(DefaultBodyLimit::max(DEFAULT_MAX_SIZE_MB * 1024 * 1024))
}

/// Objects in the bucket, optionally under a path prefix.
#[utoipa::path(
    get,
    path = "/",
    params(ListQuery),
    responses(
        (status = 200, description = "Stored objects", body = Vec<FileInfo>),
        (status = 401, description = "Not authenticated"),
    )
)]
pub async fn list_files(
    _user: CurrentUser,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<FileInfo>>, ApiError> {
    let objects = state
        .storage
        .list(query.prefix.as_deref().unwrap_or(""))
        .await?;
    Ok(Json(objects.into_iter().map(FileInfo::from).collect()))
}

/// Store the request body under a unique name derived from `filename`.
#[utoipa::path(
    post,
    path = "/",
    params(UploadQuery),
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 201, description = "Stored", body = UploadResponse),
        (status = 401, description = "Not authenticated"),
        (status = 413, description = "Larger than the upload limit"),
    )
)]
pub async fn upload_file(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    if query.filename.trim().is_empty() {
        return Err(ApiError::BadRequest("filename must not be empty".to_string()));
    }

    let key = random_filename(&query.filename);
    let size = body.len() as u64;
    state.storage.upload(&key, body, DEFAULT_MAX_SIZE_MB).await?;
    info!(key = %key, size, username = %user.username, "file uploaded");

    Ok((StatusCode::CREATED, Json(UploadResponse { key, size })))
}

/// Stream the request body to `key` as a multipart upload.
#[utoipa::path(
    put,
    path = "/{key}",
    params(("key" = String, Path, description = "Object key")),
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 201, description = "Stored", body = UploadResponse),
        (status = 401, description = "Not authenticated"),
    )
)]
pub async fn stream_file(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(key): Path<String>,
    body: Body,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let written = state
        .storage
        .stream_upload(&key, body.into_data_stream(), DEFAULT_CHUNK_SIZE, None)
        .await?;
    info!(key = %key, size = written, username = %user.username, "file streamed");

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            key,
            size: written as u64,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/{key}",
    params(("key" = String, Path, description = "Object key")),
    responses(
        (status = 200, description = "Object content", body = Vec<u8>, content_type = "application/octet-stream"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "No such object"),
    )
)]
pub async fn download_file(
    _user: CurrentUser,
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    let data = state.storage.download(&key).await?;

    let file_name = key.rsplit('/').next().unwrap_or(&key);
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{file_name}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        data,
    )
        .into_response())
}

#[utoipa::path(
    delete,
    path = "/{key}",
    params(("key" = String, Path, description = "Object key")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 401, description = "Not authenticated"),
    )
)]
pub async fn delete_file(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.storage.delete(&key).await?;
    info!(key = %key, username = %user.username, "file deleted");
    Ok(StatusCode::NO_CONTENT)
}
