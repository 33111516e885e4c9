/// Unified error types for the films catalog
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the catalog
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Unknown film identifier
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller may not mutate the resource
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Missing or invalid credentials
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Field-level validation errors
    #[error("Validation error on {field}: {message}")]
    Validation { field: String, message: String },

    /// Attachment filesystem errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Database errors
    #[error("Persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CatalogError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        CatalogError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<validator::ValidationErrors> for CatalogError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let (field, message) = errors
            .field_errors()
            .into_iter()
            .next()
            .map(|(field, errs)| {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref())
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{} is invalid", field));
                (field.to_string(), message)
            })
            .unwrap_or_else(|| ("request".to_string(), errors.to_string()));

        CatalogError::Validation { field, message }
    }
}

/// JSON error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        let (status, error_code, message, field) = match &self {
            CatalogError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                "NotFound",
                self.to_string(),
                None,
            ),
            CatalogError::Forbidden(_) => (
                StatusCode::FORBIDDEN,
                "Forbidden",
                self.to_string(),
                None,
            ),
            CatalogError::Authentication(_) => (
                StatusCode::UNAUTHORIZED,
                "AuthenticationRequired",
                self.to_string(),
                None,
            ),
            CatalogError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                "ValidationFailed",
                message.clone(),
                Some(field.clone()),
            ),
            CatalogError::Storage(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "StorageFailure",
                "Attachment storage failed".to_string(),
                None,
            ),
            CatalogError::Persistence(_) | CatalogError::Io(_) | CatalogError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalServerError",
                "Internal server error".to_string(), // Don't leak details
                None,
            ),
        };

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            field,
        });

        (status, body).into_response()
    }
}

/// Result type alias for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;
