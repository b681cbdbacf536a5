use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Standard error envelope returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Unprocessable Entity")
    #[schema(example = "Unprocessable Entity")]
    pub error: String,
    /// Human-readable error description
    #[schema(example = "Insufficient stock for REF-1: available 70, requested 90")]
    pub message: String,
    /// Additional details (validation field errors)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

/// Unified error type for the ledger core.
///
/// Validation failures are rejected before any transaction opens;
/// `InsufficientStock` is raised inside the exit transaction and rolls
/// the whole transaction back; authorization and not-found errors stay
/// deliberately terse toward the caller.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Insufficient stock for {material_ref}: available {available}, requested {requested}")]
    InsufficientStock {
        material_ref: String,
        available: i64,
        requested: i64,
    },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ServiceError {
    /// Single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DatabaseError(_) | Self::SerializationError(_) | Self::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InsufficientStock { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    /// Message suitable for HTTP responses. Internal errors collapse to a
    /// generic message so implementation details never leak.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::SerializationError(_) | Self::InternalError(_) => {
                "Internal server error".to_string()
            }
            Self::Unauthorized(_) => "Authentication required".to_string(),
            Self::Forbidden(_) => "Operation not permitted".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(errors.to_string())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            details: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        (status, Json(err)).into_response()
    }
}
