//! Error types module
//!
//! All failures of the image host are unified under [`AppError`]. Each
//! variant describes how it should be presented over HTTP through the
//! [`ErrorMetadata`] trait, so handlers never hand-pick status codes.
//!
//! With the `sqlx` feature off, `Database` carries a plain message.

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

use crate::code::KeyspaceError;

/// Level an error is logged at when it reaches the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Client mistakes: bad uploads, unknown versions, missing files.
    Debug,
    /// Contention that a retry is likely to resolve.
    Warn,
    /// Server-side faults.
    Error,
}

/// How an error is rendered to clients.
pub trait ErrorMetadata {
    fn http_status_code(&self) -> u16;

    /// Stable upper-snake-case code, e.g. `KEYSPACE_EXHAUSTED`.
    fn error_code(&self) -> &'static str;

    /// True if the same request may succeed later.
    fn is_recoverable(&self) -> bool;

    fn suggested_action(&self) -> Option<&'static str>;

    /// Message safe to show to any client.
    fn client_message(&self) -> String;

    /// Sensitive errors never expose `details`, even outside production.
    fn is_sensitive(&self) -> bool;

    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Image decode error: {0}")]
    ImageDecode(String),

    #[error("Image encode error: {0}")]
    ImageEncode(String),

    #[error("Image too large: {size} bytes exceeds limit of {max} bytes")]
    ImageTooLarge { size: usize, max: usize },

    #[error("Keyspace exhausted: {0}")]
    KeyspaceExhausted(String),

    #[error("Code allocation failed after {attempts} attempts")]
    AllocationFailed { attempts: u32 },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Request body too large: {0}")]
    PayloadTooLarge(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error: {message}")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<KeyspaceError> for AppError {
    fn from(err: KeyspaceError) -> Self {
        AppError::KeyspaceExhausted(err.to_string())
    }
}

/// (status, code, recoverable, suggested action, sensitive, log level)
fn metadata_for(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::Database(_) => (
            500,
            "DATABASE_ERROR",
            true,
            Some("Retry the upload in a few seconds"),
            true,
            LogLevel::Error,
        ),
        AppError::Storage(_) => (
            500,
            "STORAGE_ERROR",
            true,
            Some("Retry the upload in a few seconds"),
            true,
            LogLevel::Error,
        ),
        AppError::ImageDecode(_) => (
            400,
            "IMAGE_DECODE_ERROR",
            false,
            Some("Upload a PNG, JPEG, GIF or WebP image"),
            false,
            LogLevel::Debug,
        ),
        AppError::ImageEncode(_) => (
            500,
            "IMAGE_ENCODE_ERROR",
            false,
            Some("Convert the image to PNG or JPEG and upload it again"),
            true,
            LogLevel::Error,
        ),
        AppError::ImageTooLarge { .. } => (
            413,
            "IMAGE_TOO_LARGE",
            false,
            Some("Reduce image dimensions and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::KeyspaceExhausted(_) => (
            503,
            "KEYSPACE_EXHAUSTED",
            false,
            Some("Contact the operator, no codes are left to issue"),
            false,
            LogLevel::Error,
        ),
        AppError::AllocationFailed { .. } => (
            503,
            "ALLOCATION_FAILED",
            true,
            Some("Retry the upload, the server is allocating new codes"),
            false,
            LogLevel::Warn,
        ),
        AppError::BadRequest(_) => (
            400,
            "BAD_REQUEST",
            false,
            Some("Send the image as the raw body (version=0) or as the `image` field (version=1)"),
            false,
            LogLevel::Debug,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the image code exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::PayloadTooLarge(_) => (
            413,
            "PAYLOAD_TOO_LARGE",
            false,
            Some("Send a smaller body"),
            false,
            LogLevel::Debug,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            None,
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Variant name, used as a log field.
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::Database(_) => "Database",
            AppError::Storage(_) => "Storage",
            AppError::ImageDecode(_) => "ImageDecode",
            AppError::ImageEncode(_) => "ImageEncode",
            AppError::ImageTooLarge { .. } => "ImageTooLarge",
            AppError::KeyspaceExhausted(_) => "KeyspaceExhausted",
            AppError::AllocationFailed { .. } => "AllocationFailed",
            AppError::BadRequest(_) => "BadRequest",
            AppError::NotFound(_) => "NotFound",
            AppError::PayloadTooLarge(_) => "PayloadTooLarge",
            AppError::Internal(_) | AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Display text followed by up to five causes, one per line.
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut lines = vec![self.to_string()];
        let mut cause = self.source();
        while let Some(err) = cause {
            if lines.len() > 5 {
                lines.push("...".to_string());
                break;
            }
            lines.push(format!("caused by: {}", err));
            cause = err.source();
        }

        lines.join("\n")
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        metadata_for(self).0
    }

    fn error_code(&self) -> &'static str {
        metadata_for(self).1
    }

    fn is_recoverable(&self) -> bool {
        metadata_for(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        metadata_for(self).3
    }

    fn is_sensitive(&self) -> bool {
        metadata_for(self).4
    }

    fn log_level(&self) -> LogLevel {
        metadata_for(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Code pool is unavailable".to_string(),
            AppError::Storage(_) => "Image storage is unavailable".to_string(),
            AppError::ImageDecode(_) => "Uploaded data is not a supported image".to_string(),
            AppError::ImageEncode(_) => "Failed to re-encode image".to_string(),
            AppError::ImageTooLarge { size, max } => format!(
                "Image too large: {} bytes after re-encoding, limit is {} bytes",
                size, max
            ),
            AppError::KeyspaceExhausted(_) => "No image codes left to allocate".to_string(),
            AppError::AllocationFailed { .. } => {
                "Could not allocate an image code, server is busy".to_string()
            }
            AppError::BadRequest(msg) | AppError::NotFound(msg) | AppError::PayloadTooLarge(msg) => {
                msg.clone()
            }
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "sqlx")]
    #[test]
    fn test_pool_errors_are_hidden_from_clients() {
        let err = AppError::from(sqlx::Error::PoolClosed);
        assert_eq!(err.http_status_code(), 500);
        assert_eq!(err.error_code(), "DATABASE_ERROR");
        assert_eq!(err.client_message(), "Code pool is unavailable");
        assert!(err.is_sensitive());
        assert_eq!(err.log_level(), LogLevel::Error);
    }

    #[test]
    fn test_error_metadata_image_decode() {
        let err = AppError::ImageDecode("unknown format".to_string());
        assert_eq!(err.http_status_code(), 400);
        assert_eq!(err.error_code(), "IMAGE_DECODE_ERROR");
        assert!(!err.is_recoverable());
        assert!(!err.is_sensitive());
    }

    #[test]
    fn test_error_metadata_image_too_large() {
        let err = AppError::ImageTooLarge {
            size: 3_000_000,
            max: 2_097_152,
        };
        assert_eq!(err.http_status_code(), 413);
        assert_eq!(err.error_code(), "IMAGE_TOO_LARGE");
        assert!(err.client_message().contains("3000000"));
        assert!(err.client_message().contains("2097152"));
        assert_eq!(err.log_level(), LogLevel::Debug);
    }

    #[test]
    fn test_keyspace_exhaustion_is_distinct_and_terminal() {
        let err = AppError::from(KeyspaceError::Exhausted {
            requested: 100,
            remaining: 0,
        });
        assert_eq!(err.http_status_code(), 503);
        assert_eq!(err.error_code(), "KEYSPACE_EXHAUSTED");
        assert!(!err.is_recoverable());
        assert_eq!(err.error_type(), "KeyspaceExhausted");

        let contended = AppError::AllocationFailed { attempts: 8 };
        assert_ne!(contended.error_code(), err.error_code());
        assert!(contended.is_recoverable());
    }

    #[test]
    fn test_client_errors_echo_their_message() {
        for err in [
            AppError::BadRequest("Incorrect version: 7".to_string()),
            AppError::NotFound("Incorrect version: 7".to_string()),
            AppError::PayloadTooLarge("Incorrect version: 7".to_string()),
        ] {
            assert_eq!(err.client_message(), "Incorrect version: 7");
            assert!(!err.is_sensitive());
            assert_eq!(err.log_level(), LogLevel::Debug);
        }
    }

    #[test]
    fn test_detailed_message_includes_source_chain() {
        let err = AppError::from(anyhow::anyhow!("disk full").context("writing thumbnail"));
        let details = err.detailed_message();
        assert!(details.contains("caused by: disk full"));
        assert_eq!(err.client_message(), "Internal server error");
    }
}
