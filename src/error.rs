// Error handling for the rental core
// Domain error kinds and their HTTP response conversion

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::Serialize;
use std::fmt::Display;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Result alias used by services, stores and collaborator clients
pub type RentalResult<T> = Result<T, RentalError>;

/// Main error type for the rental core
///
/// Each variant maps to one error kind of the domain and to a fixed
/// HTTP status code. Partial orchestration is not an error: it is
/// reported through the saga record.
#[derive(Debug, Error)]
pub enum RentalError {
    /// Malformed input: bad date range, negative price or mileage
    /// Maps to HTTP 400 Bad Request
    #[error("Validation error: {0}")]
    Validation(String),

    /// Request DTO rejected by the validator crate
    /// Maps to HTTP 400 Bad Request with field-level details
    #[error("Request validation failed: {0}")]
    InvalidRequest(#[from] validator::ValidationErrors),

    /// Illegal lifecycle move
    /// Maps to HTTP 409 Conflict
    #[error("Invalid {entity} status transition from {from} to {to} (id {id})")]
    InvalidStateTransition {
        entity: &'static str,
        id: i64,
        from: String,
        to: String,
    },

    /// Referenced entity absent, locally or at a collaborator
    /// Maps to HTTP 404 Not Found
    #[error("{resource} with id {id} not found")]
    NotFound { resource: &'static str, id: String },

    /// Concurrent transition race lost or uniqueness violated
    /// Maps to HTTP 409 Conflict
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Collaborator unreachable or returned an error
    /// Maps to HTTP 502 Bad Gateway
    #[error("Remote call {service}.{operation} failed: {message}")]
    RemoteCallFailure {
        service: &'static str,
        operation: String,
        transient: bool,
        message: String,
    },

    /// Persistence failure, details are not exposed to clients
    /// Maps to HTTP 500 Internal Server Error
    #[error("Database error: {0}")]
    Database(String),

    /// Maps to HTTP 403 Forbidden
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Maps to HTTP 500 Internal Server Error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RentalError {
    pub fn not_found(resource: &'static str, id: impl Display) -> Self {
        RentalError::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn invalid_transition(
        entity: &'static str,
        id: i64,
        from: impl Display,
        to: impl Display,
    ) -> Self {
        RentalError::InvalidStateTransition {
            entity,
            id,
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn remote(
        service: &'static str,
        operation: impl Into<String>,
        transient: bool,
        message: impl Into<String>,
    ) -> Self {
        RentalError::RemoteCallFailure {
            service,
            operation: operation.into(),
            transient,
            message: message.into(),
        }
    }

    /// Whether the orchestrator may retry the failed call once
    pub fn is_transient(&self) -> bool {
        matches!(self, RentalError::RemoteCallFailure { transient: true, .. })
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            RentalError::Validation(_) | RentalError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            RentalError::InvalidStateTransition { .. } => StatusCode::CONFLICT,
            RentalError::NotFound { .. } => StatusCode::NOT_FOUND,
            RentalError::Conflict(_) => StatusCode::CONFLICT,
            RentalError::RemoteCallFailure { .. } => StatusCode::BAD_GATEWAY,
            RentalError::Database(_) | RentalError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            RentalError::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            RentalError::Validation(_) | RentalError::InvalidRequest(_) => "VALIDATION_ERROR",
            RentalError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            RentalError::NotFound { .. } => "NOT_FOUND",
            RentalError::Conflict(_) => "CONFLICT",
            RentalError::RemoteCallFailure { .. } => "REMOTE_CALL_FAILURE",
            RentalError::Database(_) => "DATABASE_ERROR",
            RentalError::Forbidden(_) => "FORBIDDEN",
            RentalError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Convert to status code and body, logging at a level matching severity:
    /// debug for expected client errors, warn for conflicts and remote
    /// failures, error for anything that hides details from the client.
    fn to_error_response(&self) -> (StatusCode, ErrorResponse) {
        let (message, details) = match self {
            RentalError::InvalidRequest(errors) => {
                debug!("Request validation failed: {:?}", errors);
                (
                    "Request validation failed".to_string(),
                    Some(serde_json::to_value(errors).unwrap_or(serde_json::json!({}))),
                )
            }
            RentalError::Validation(_) | RentalError::NotFound { .. } => {
                debug!("{}", self);
                (self.to_string(), None)
            }
            RentalError::InvalidStateTransition { entity, id, from, to } => {
                debug!("{}", self);
                (
                    self.to_string(),
                    Some(serde_json::json!({
                        "entity": entity,
                        "id": id,
                        "from": from,
                        "to": to,
                    })),
                )
            }
            RentalError::Conflict(_) | RentalError::Forbidden(_) => {
                warn!("{}", self);
                (self.to_string(), None)
            }
            RentalError::RemoteCallFailure {
                service,
                operation,
                transient,
                ..
            } => {
                warn!("{}", self);
                (
                    self.to_string(),
                    Some(serde_json::json!({
                        "service": service,
                        "operation": operation,
                        "transient": transient,
                    })),
                )
            }
            RentalError::Database(msg) => {
                error!("Database error: {}", msg);
                ("A database error occurred".to_string(), None)
            }
            RentalError::Internal(msg) => {
                error!("Internal error: {}", msg);
                ("An internal server error occurred".to_string(), None)
            }
        };

        (
            self.status_code(),
            ErrorResponse {
                error_code: self.error_code().to_string(),
                message,
                details,
                timestamp: Utc::now().to_rfc3339(),
            },
        )
    }
}

/// Consistent error response structure
///
/// Machine-readable `error_code`, human-readable `message`, optional
/// structured `details` (omitted when absent) and an RFC 3339 timestamp.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error_code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub timestamp: String,
}

impl IntoResponse for RentalError {
    fn into_response(self) -> Response {
        let (status, body) = self.to_error_response();
        (status, Json(body)).into_response()
    }
}

/// Unique-constraint violations surface as conflicts, everything else as
/// an opaque database error
impl From<sqlx::Error> for RentalError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                return RentalError::Conflict(db_err.message().to_string());
            }
        }
        RentalError::Database(err.to_string())
    }
}
