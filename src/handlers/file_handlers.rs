//! Upload, download, info and delete handlers.
//! Bodies are streamed in both directions; nothing is buffered whole.

use crate::{
    backends::PutOptions,
    errors::AppError,
    handlers::AppState,
    models::Metadata,
};
use axum::{
    Json,
    body::Body,
    extract::{ConnectInfo, Path, Request, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use futures::StreamExt;
use serde::Serialize;
use std::{io, net::SocketAddr, time::Duration};
use tokio_util::io::StreamReader;
use uuid::Uuid;

pub const EXPIRY_HEADER: &str = "linx-expiry";
pub const DELETE_KEY_HEADER: &str = "linx-delete-key";
pub const ACCESS_KEY_HEADER: &str = "linx-access-key";
pub const ORIGINAL_NAME_HEADER: &str = "linx-original-name";

/// Returned once, after upload. The only place the delete key is echoed.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub key: String,
    pub delete_key: String,
    pub sha256sum: String,
    pub mimetype: String,
    pub size: u64,
    pub expiry: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub archive_files: Vec<String>,
}

/// Public view of an object's metadata.
#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub key: String,
    pub sha256sum: String,
    pub mimetype: String,
    pub size: u64,
    pub expiry: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub original_name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub archive_files: Vec<String>,
}

/// PUT `/upload/{key}` — store the request body under `key`.
pub async fn upload_file(
    State(state): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    Path(key): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, AppError> {
    let expiry = match header_str(&headers, EXPIRY_HEADER) {
        Some(raw) => raw
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| AppError::bad_request("Linx-Expiry must be a number of seconds"))?,
        None => Duration::ZERO,
    };
    let delete_key = header_str(&headers, DELETE_KEY_HEADER)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().simple().to_string());

    let options = PutOptions {
        expiry,
        delete_key,
        access_key: header_str(&headers, ACCESS_KEY_HEADER)
            .unwrap_or_default()
            .to_string(),
        src_ip: remote.ip().to_string(),
        original_name: header_str(&headers, ORIGINAL_NAME_HEADER)
            .unwrap_or_default()
            .to_string(),
    };

    let stream = body
        .into_data_stream()
        .map(|chunk| chunk.map_err(io::Error::other));
    let metadata = state
        .backend
        .put(&key, Box::new(StreamReader::new(stream)), options)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            key,
            delete_key: metadata.delete_key,
            sha256sum: metadata.sha256sum,
            mimetype: metadata.mimetype,
            size: metadata.size,
            expiry: metadata.expiry.to_unix(),
            archive_files: metadata.archive_files,
        }),
    ))
}

/// GET `/info/{key}` — public metadata as JSON.
pub async fn file_info(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> Result<Json<InfoResponse>, AppError> {
    let metadata = state.backend.head(&key).await?;
    check_readable(&metadata, &headers)?;

    Ok(Json(InfoResponse {
        key,
        sha256sum: metadata.sha256sum,
        mimetype: metadata.mimetype,
        size: metadata.size,
        expiry: metadata.expiry.to_unix(),
        original_name: metadata.original_name,
        archive_files: metadata.archive_files,
    }))
}

/// GET `/{key}` — stream the object bytes.
pub async fn serve_file(
    State(state): State<AppState>,
    Path(key): Path<String>,
    request: Request,
) -> Result<Response, AppError> {
    let metadata = state.backend.head(&key).await?;
    check_readable(&metadata, request.headers())?;

    Ok(state.backend.serve_file(&key, request).await?)
}

/// DELETE `/{key}` — requires the matching delete key.
pub async fn delete_file(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let metadata = state.backend.head(&key).await?;
    if header_str(&headers, DELETE_KEY_HEADER) != Some(metadata.delete_key.as_str()) {
        return Err(AppError::new(StatusCode::FORBIDDEN, "invalid delete key"));
    }

    state.backend.delete(&key).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Expired objects read as missing until the sweeper removes them.
fn check_readable(metadata: &Metadata, headers: &HeaderMap) -> Result<(), AppError> {
    if metadata.expiry.is_expired(Utc::now()) {
        return Err(AppError::not_found("File not found."));
    }
    if !metadata.access_key.is_empty()
        && header_str(headers, ACCESS_KEY_HEADER) != Some(metadata.access_key.as_str())
    {
        return Err(AppError::new(StatusCode::UNAUTHORIZED, "access key required"));
    }
    Ok(())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}
