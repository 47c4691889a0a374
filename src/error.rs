//! Structured error types for API responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;
use std::fmt;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (4xx-like)
    MissingRequiredField,
    InvalidFieldValue,
    AlreadyExists,

    // Not found errors
    TaskNotFound,
    CategoryNotFound,
    TagNotFound,

    // Auth errors
    Unauthorized,
    InvalidCredentials,

    // Internal errors
    DatabaseError,
    InternalError,
}

impl ErrorCode {
    fn status(self) -> StatusCode {
        match self {
            ErrorCode::MissingRequiredField
            | ErrorCode::InvalidFieldValue
            | ErrorCode::AlreadyExists => StatusCode::BAD_REQUEST,
            ErrorCode::TaskNotFound | ErrorCode::CategoryNotFound | ErrorCode::TagNotFound => {
                StatusCode::NOT_FOUND
            }
            ErrorCode::Unauthorized | ErrorCode::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ErrorCode::DatabaseError | ErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Structured error for API responses.
#[derive(Debug, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
            details: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingRequiredField,
            format!("{} is required", field),
        )
        .with_field(field)
    }

    pub fn invalid_value(field: &str, reason: &str) -> Self {
        Self::new(ErrorCode::InvalidFieldValue, reason).with_field(field)
    }

    pub fn already_exists(field: &str, reason: &str) -> Self {
        Self::new(ErrorCode::AlreadyExists, reason).with_field(field)
    }

    pub fn task_not_found(task_id: &str) -> Self {
        Self::new(
            ErrorCode::TaskNotFound,
            format!("Task not found: {}", task_id),
        )
    }

    pub fn category_not_found(category_id: &str) -> Self {
        Self::new(
            ErrorCode::CategoryNotFound,
            format!("Category not found: {}", category_id),
        )
    }

    pub fn tag_not_found(tag_id: &str) -> Self {
        Self::new(ErrorCode::TagNotFound, format!("Tag not found: {}", tag_id))
    }

    pub fn unauthorized() -> Self {
        Self::new(ErrorCode::Unauthorized, "Authentication required")
    }

    pub fn invalid_credentials() -> Self {
        Self::new(ErrorCode::InvalidCredentials, "Invalid username or password")
    }

    pub fn database(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::DatabaseError, err.to_string())
    }

    pub fn internal(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InternalError, err.to_string())
    }
}

// Allow using ? with anyhow errors by converting them
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        // Try to downcast to ApiError first
        match err.downcast::<ApiError>() {
            Ok(api_err) => api_err,
            Err(err) => ApiError::internal(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            // Log the real failure; callers only see a generic message.
            tracing::error!(code = ?self.code, error = %self.message, "Internal error");
            let body = json!({
                "code": self.code,
                "message": "Internal server error",
            });
            return (status, Json(body)).into_response();
        }
        (status, Json(self)).into_response()
    }
}

/// Result type for API operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anyhow_roundtrip_preserves_structure() {
        let err = ApiError::invalid_value("parent_task", "A task cannot be its own parent");
        let any: anyhow::Error = err.into();
        let back = ApiError::from(any);
        assert_eq!(back.code, ErrorCode::InvalidFieldValue);
        assert_eq!(back.field.as_deref(), Some("parent_task"));
    }

    #[test]
    fn foreign_anyhow_becomes_internal() {
        let any = anyhow::anyhow!("disk on fire");
        let back = ApiError::from(any);
        assert_eq!(back.code, ErrorCode::InternalError);
    }
}
