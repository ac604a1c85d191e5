//! Error responses
//!
//! Handlers return `Result<_, HttpAppError>`. Anything that converts into
//! `AppError` converts into `HttpAppError`, so `?` works on service calls
//! and every failure renders the same JSON body.

use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    extract::rejection::BytesRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use picode_core::{AppError, ErrorMetadata, LogLevel};
use picode_infra::ErrorResponse;
use picode_storage::StorageError;

/// `AppError` as an axum response.
///
/// The orphan rule forbids implementing axum's `IntoResponse` for the core
/// error type directly.
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
    }
}

impl From<StorageError> for HttpAppError {
    fn from(err: StorageError) -> Self {
        HttpAppError(err.into())
    }
}

/// Raw upload bodies: over-limit bodies are 413, anything else 400.
impl From<BytesRejection> for HttpAppError {
    fn from(rejection: BytesRejection) -> Self {
        HttpAppError(body_rejection(rejection.status(), rejection.body_text()))
    }
}

impl From<MultipartRejection> for HttpAppError {
    fn from(rejection: MultipartRejection) -> Self {
        HttpAppError(body_rejection(rejection.status(), rejection.body_text()))
    }
}

impl From<MultipartError> for HttpAppError {
    fn from(err: MultipartError) -> Self {
        HttpAppError(body_rejection(err.status(), err.body_text()))
    }
}

fn body_rejection(status: StatusCode, message: String) -> AppError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(message)
    } else {
        AppError::BadRequest(message)
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Request failed");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Request failed");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type = error_type, "Request failed");
        }
    }
}

fn is_production_env() -> bool {
    std::env::var("ENVIRONMENT")
        .or_else(|_| std::env::var("APP_ENV"))
        .map(|env| env.to_lowercase() == "production" || env.to_lowercase() == "prod")
        .unwrap_or(false)
}

/// Body for `error`, with details only outside production and only for
/// errors that are not sensitive.
pub fn error_body(error: &AppError, is_production: bool) -> ErrorResponse {
    let details = if is_production || error.is_sensitive() {
        None
    } else {
        Some(error.detailed_message())
    };

    ErrorResponse::new(
        error.client_message(),
        error.error_code(),
        error.is_recoverable(),
    )
    .with_suggested_action(error.suggested_action())
    .with_details(details)
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;

        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        (status, Json(error_body(app_error, is_production_env()))).into_response()
    }
}
