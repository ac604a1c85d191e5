//! HTTP error response body
//!
//! The `IntoResponse` implementation for `AppError` lives in the API crate:
//! the orphan rule forbids implementing axum's trait for a core type here.

use serde::Serialize;
use utoipa::ToSchema;

/// JSON body of every non-2xx response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Always `false`.
    pub success: bool,
    pub error: String,
    /// Machine readable error code, e.g. `IMAGE_TOO_LARGE`.
    pub code: String,
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>, recoverable: bool) -> Self {
        Self {
            success: false,
            error: error.into(),
            code: code.into(),
            recoverable,
            suggested_action: None,
            details: None,
        }
    }

    pub fn with_suggested_action(mut self, action: Option<&str>) -> Self {
        self.suggested_action = action.map(str::to_string);
        self
    }

    pub fn with_details(mut self, details: Option<String>) -> Self {
        self.details = details;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_fields_are_omitted() {
        let body = serde_json::to_value(ErrorResponse::new("nope", "NOT_FOUND", false)).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "NOT_FOUND");
        assert!(body.get("details").is_none());
        assert!(body.get("suggested_action").is_none());
    }
}
