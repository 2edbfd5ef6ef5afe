//! HTTP endpoint handlers for the transfer server.
//!
//! Every client-supplied path goes through the navigator's sandbox before
//! any filesystem call.

#![allow(clippy::missing_errors_doc)]

use axum::{
    body::Body,
    extract::{Path as UrlPath, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use crate::catalog::{epoch_millis, DirectoryEntry, Listing};
use crate::error::Error;
use crate::mime::content_type_for;
use crate::network;
use crate::sandbox::validate_file_name;
use crate::upload::{UploadOutcome, UploadSession, UploadState};

use super::assets;
use super::error::{ApiError, ApiResult};
use super::state::SharedState;

// ============================================================================
// Request and response types
// ============================================================================

/// Optional directory for `/api/files`.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Directory to list instead of the current one
    pub path: Option<String>,
}

/// Target of `/navigate`.
#[derive(Debug, Deserialize)]
pub struct NavigateQuery {
    /// Directory to make current
    pub path: Option<String>,
}

/// Upload parameters.
#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    /// Name to store the body under
    pub filename: Option<String>,
}

/// Navigation result.
#[derive(Debug, Serialize)]
pub struct NavigateResponse {
    success: bool,
    path: String,
}

/// Stored upload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    success: bool,
    filename: String,
    size: u64,
    path: String,
    last_modified: i64,
    /// Set when the upload was abandoned and only part of it was kept
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    partial: bool,
}

/// Deletion result.
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    success: bool,
    filename: String,
}

/// Server status.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    status: &'static str,
    device_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    root: String,
    current_dir: String,
    active_uploads: usize,
}

// ============================================================================
// Page and listing
// ============================================================================

/// GET / - Browser page for the current directory.
pub async fn index(State(state): State<SharedState>) -> Response {
    let current = state.navigator.current().await;
    let root = state.navigator.sandbox().root();
    match assets::render_index(&current, root) {
        Some(html) => Html(html).into_response(),
        None => ApiError::internal("Browser page is missing").into_response(),
    }
}

/// GET /api/files - List the current directory, or `path` if given.
pub async fn list_files(
    State(state): State<SharedState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<DirectoryEntry>>> {
    let listing = match query.path.as_deref() {
        Some(path) if !path.is_empty() => state.navigator.list_path(path).await?,
        _ => state.navigator.list_current().await,
    };

    Ok(Json(surface_listing(&state, listing)))
}

fn surface_listing(state: &SharedState, listing: Listing) -> Vec<DirectoryEntry> {
    if let Some(error) = &listing.error {
        state
            .reporter
            .directory_error(&listing.directory.display().to_string(), error);
    }
    listing.entries
}

/// GET /api/status - Server and session summary.
pub async fn status(State(state): State<SharedState>) -> Json<StatusResponse> {
    let status = state.status.borrow().label();
    Json(StatusResponse {
        status,
        device_name: network::device_name(),
        url: state.url.clone(),
        root: state.navigator.sandbox().root().display().to_string(),
        current_dir: state.navigator.current().await.display().to_string(),
        active_uploads: state.uploads.active_count(),
    })
}

// ============================================================================
// Navigation
// ============================================================================

/// GET /navigate?path= - Change the current directory.
pub async fn navigate(
    State(state): State<SharedState>,
    Query(query): Query<NavigateQuery>,
) -> ApiResult<Json<NavigateResponse>> {
    let path = query
        .path
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing path parameter"))?;

    let target = state.navigator.navigate(&path).await.map_err(|e| match e {
        Error::NotFound(_) | Error::NotADirectory(_) => {
            ApiError::not_found("Directory not found")
        }
        other => other.into(),
    })?;

    Ok(Json(NavigateResponse {
        success: true,
        path: target.display().to_string(),
    }))
}

/// GET /navigate/up - Move to the parent directory.
pub async fn navigate_up(State(state): State<SharedState>) -> ApiResult<Json<NavigateResponse>> {
    let target = state.navigator.navigate_up().await?;
    Ok(Json(NavigateResponse {
        success: true,
        path: target.display().to_string(),
    }))
}

// ============================================================================
// Files
// ============================================================================

/// GET /files/{name} - Download a file from the current directory.
pub async fn download(
    State(state): State<SharedState>,
    UrlPath(name): UrlPath<String>,
) -> ApiResult<Response> {
    let current = state.navigator.current().await;
    let path = state
        .navigator
        .sandbox()
        .resolve_file(&current, &name)
        .map_err(|e| match e {
            Error::NotFound(_) | Error::NotAFile(_) | Error::NotADirectory(_) => {
                ApiError::not_found("File not found")
            }
            other => other.into(),
        })?;

    let file = File::open(&path)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to open file: {e}")))?;
    let size = file.metadata().await.map_err(Error::from)?.len();

    tracing::debug!("Serving {} ({} bytes)", path.display(), size);

    let body = Body::from_stream(ReaderStream::new(file));
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(&path))
        .header(header::CONTENT_LENGTH, size)
        .body(body)
        .map_err(|e| ApiError::internal(e.to_string()))
}

/// DELETE /files/{name} - Delete a file from the current directory.
pub async fn delete_file(
    State(state): State<SharedState>,
    UrlPath(name): UrlPath<String>,
) -> ApiResult<Json<DeleteResponse>> {
    validate_file_name(&name)?;
    let current = state.navigator.current().await;
    let path = state.navigator.sandbox().resolve_file(&current, &name)?;

    // Holding the claim keeps new uploads off the file until it is gone.
    let _claim = state.uploads.claim(&path).map_err(|_| {
        ApiError::conflict(format!("Cannot delete '{name}' while it is being uploaded"))
    })?;

    tokio::fs::remove_file(&path).await.map_err(Error::from)?;
    tracing::info!("Deleted {}", path.display());

    Ok(Json(DeleteResponse {
        success: true,
        filename: name,
    }))
}

// ============================================================================
// Upload
// ============================================================================

/// POST /upload-simple?filename= - Store the raw request body.
///
/// The body is the file. The file lands in the current directory as it was
/// when the request arrived.
pub async fn upload(
    State(state): State<SharedState>,
    Query(query): Query<UploadQuery>,
    body: Body,
) -> Response {
    let filename = query
        .filename
        .filter(|n| !n.is_empty())
        .unwrap_or_else(default_upload_name);

    let result = receive(&state, filename, body).await;
    let mut response = match result {
        Ok(outcome) => outcome_response(outcome),
        Err(e) => e.into_response(),
    };

    let headers = response.headers_mut();
    headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    response
}

async fn receive(state: &SharedState, filename: String, body: Body) -> ApiResult<UploadOutcome> {
    let directory = state.navigator.current().await;
    let target = state
        .navigator
        .sandbox()
        .resolve_new_file(&directory, &filename)?;
    let claim = state.uploads.claim(&target)?;

    let session = UploadSession::create(
        claim,
        filename,
        state.upload_config.clone(),
        state.reporter.clone(),
    )
    .await?;

    Ok(session
        .run(body.into_data_stream(), &state.shutdown)
        .await)
}

fn outcome_response(outcome: UploadOutcome) -> Response {
    let partial = outcome.state == UploadState::TimedOut;
    match outcome.into_result() {
        Ok((outcome, stored)) => Json(UploadResponse {
            success: true,
            filename: outcome.filename,
            size: stored.size,
            path: outcome.path.display().to_string(),
            last_modified: stored.last_modified,
            partial,
        })
        .into_response(),
        Err(Error::Io(e)) => {
            ApiError::internal(format!("Error finalizing upload: {e}")).into_response()
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

fn default_upload_name() -> String {
    format!("upload_{}", epoch_millis(std::time::SystemTime::now()))
}

/// Fallback for unknown routes.
pub async fn not_found() -> ApiError {
    ApiError::not_found("Not found")
}
