//! HTTP error handling for the transfer API.
//!
//! Core errors are converted to a status code and a JSON body of the form
//! `{"success": false, "error": "<message>"}`.

use std::any::Any;

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::Error;

/// API error response.
#[derive(Debug, Clone)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    success: bool,
    error: &'a str,
}

impl ApiError {
    /// Create an error with an explicit status.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Create a bad request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// Create a conflict error (operation already in progress).
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    /// Create an internal server error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// HTTP status for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    /// Human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Status code for a core error.
#[must_use]
pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::OutsideRoot(_)
        | Error::InvalidName(_)
        | Error::AtRoot
        | Error::EmptyUpload
        | Error::UploadAborted(_) => StatusCode::BAD_REQUEST,
        Error::NotFound(_) | Error::NotADirectory(_) | Error::NotAFile(_) => StatusCode::NOT_FOUND,
        Error::UploadInProgress(_) => StatusCode::CONFLICT,
        Error::UploadTimedOut(_) => StatusCode::REQUEST_TIMEOUT,
        Error::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            error: &self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = status_for(&err);
        if err.is_path_rejection() {
            tracing::debug!("Refused client path: {}", err);
        }
        let message = match &err {
            Error::EmptyUpload => "No data received".to_string(),
            _ => err.to_string(),
        };
        Self { status, message }
    }
}

/// Result type for web handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Turn a handler panic into a 500 so one bad request cannot take the
/// server down.
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!("Request handler panicked: {}", detail);

    let mut response = ApiError::internal("Internal server error").into_response();
    response
        .headers_mut()
        .insert(header::CONNECTION, header::HeaderValue::from_static("close"));
    response
}
