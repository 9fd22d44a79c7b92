//! Error types for BookSpace services
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for different failure modes
//! - HTTP status code mapping
//! - Structured error responses
//! - Error codes for client handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::DbErr;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,

    // Resource errors (4xxx)
    NotFound,

    // Conflict errors (5xxx)
    Conflict,

    // Database errors (7xxx)
    PersistenceError,
    ConnectionError,

    // External service errors (8xxx)
    StorageUnavailable,
    AnalysisUnavailable,

    // Internal errors (9xxx)
    MappingError,
    ConfigurationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            // Validation (1xxx)
            ErrorCode::ValidationError => 1001,

            // Resources (4xxx)
            ErrorCode::NotFound => 4001,

            // Conflicts (5xxx)
            ErrorCode::Conflict => 5001,

            // Database (7xxx)
            ErrorCode::PersistenceError => 7001,
            ErrorCode::ConnectionError => 7002,

            // External (8xxx)
            ErrorCode::StorageUnavailable => 8002,
            ErrorCode::AnalysisUnavailable => 8003,

            // Internal (9xxx)
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::MappingError => 9004,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    // Resource errors
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    // Conflict errors
    #[error("Conflict: {message}")]
    Conflict { message: String },

    // Database errors
    #[error("Persistence error: {0}")]
    Persistence(#[from] DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    // External service errors
    #[error("Blob storage unavailable: {message}")]
    StorageUnavailable { message: String },

    #[error("Face analysis unavailable: {message}")]
    AnalysisUnavailable { message: String },

    // Internal errors
    #[error("Cannot map {entity}: required field `{field}` is missing")]
    Mapping { entity: String, field: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl AppError {
    /// Shorthand for a missing entity of the given kind
    pub fn not_found(resource_type: &str, id: impl ToString) -> Self {
        AppError::NotFound {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
        }
    }

    /// Shorthand for a mapping failure on a required field
    pub fn mapping(entity: &str, field: &str) -> Self {
        AppError::Mapping {
            entity: entity.to_string(),
            field: field.to_string(),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::Conflict { .. } => ErrorCode::Conflict,
            AppError::Persistence(_) => ErrorCode::PersistenceError,
            AppError::DatabaseConnection { .. } => ErrorCode::ConnectionError,
            AppError::StorageUnavailable { .. } => ErrorCode::StorageUnavailable,
            AppError::AnalysisUnavailable { .. } => ErrorCode::AnalysisUnavailable,
            AppError::Mapping { .. } => ErrorCode::MappingError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,

            // 404 Not Found
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::Conflict { .. } => StatusCode::CONFLICT,

            // 500 Internal Server Error
            AppError::Persistence(_)
            | AppError::DatabaseConnection { .. }
            | AppError::Mapping { .. }
            | AppError::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,

            // 503 Service Unavailable
            AppError::StorageUnavailable { .. } | AppError::AnalysisUnavailable { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Whether an external enrichment call may succeed if attempted again
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::StorageUnavailable { .. } | AppError::AnalysisUnavailable { .. }
        )
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        // Log based on severity
        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let details = match &self {
            AppError::Validation {
                field: Some(field), ..
            } => Some(serde_json::json!({ "field": field })),
            _ => None,
        };

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}
