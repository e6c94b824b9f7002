//! Error types for Caseworks server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Stable numeric error codes exposed to API clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Success = 0,
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NotFound = 4,
    InvalidQuantity = 5,
    IllegalTransition = 6,
    TerminalState = 7,
    AlreadyReturned = 8,
    AlreadyCancelled = 9,
    HasActiveRentals = 10,
    BadValue = 11,
    Conflict = 12,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid quantity: {message}")]
    InvalidQuantity {
        message: String,
        /// Smallest available quantity that keeps the rental commitments intact
        minimum_available: Option<i32>,
        /// Largest available quantity accepted (the total)
        maximum_available: Option<i32>,
    },

    #[error("Illegal transition for {entity}: {from} -> {to}")]
    IllegalTransition {
        entity: &'static str,
        from: String,
        to: String,
        allowed: Vec<String>,
    },

    #[error("{entity} is in terminal state '{state}'")]
    TerminalState { entity: &'static str, state: String },

    #[error("Rental {0} has already been returned")]
    AlreadyReturned(i32),

    #[error("Rental {0} has already been cancelled")]
    AlreadyCancelled(i32),

    #[error("Equipment {equipment_id} still has {count} active rental(s)")]
    HasActiveRentals { equipment_id: i32, count: i64 },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Build an `IllegalTransition` from any displayable states
    pub fn illegal_transition<S: std::fmt::Display>(
        entity: &'static str,
        from: S,
        to: S,
        allowed: &[S],
    ) -> Self {
        AppError::IllegalTransition {
            entity,
            from: from.to_string(),
            to: to.to_string(),
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
    /// Legal next states, present for illegal transitions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_available: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum_available: Option<i32>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut allowed = None;
        let mut minimum = None;
        let mut maximum = None;

        let (status, code) = match &self {
            AppError::Authentication(_) => (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthorized),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, ErrorCode::NotAuthorized),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::NotFound),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, ErrorCode::BadValue),
            AppError::InvalidQuantity {
                minimum_available,
                maximum_available,
                ..
            } => {
                minimum = *minimum_available;
                maximum = *maximum_available;
                (StatusCode::UNPROCESSABLE_ENTITY, ErrorCode::InvalidQuantity)
            }
            AppError::IllegalTransition { allowed: legal, .. } => {
                allowed = Some(legal.clone());
                (StatusCode::CONFLICT, ErrorCode::IllegalTransition)
            }
            AppError::TerminalState { .. } => (StatusCode::CONFLICT, ErrorCode::TerminalState),
            AppError::AlreadyReturned(_) => (StatusCode::CONFLICT, ErrorCode::AlreadyReturned),
            AppError::AlreadyCancelled(_) => (StatusCode::CONFLICT, ErrorCode::AlreadyCancelled),
            AppError::HasActiveRentals { .. } => (StatusCode::CONFLICT, ErrorCode::HasActiveRentals),
            AppError::Conflict(_) => (StatusCode::CONFLICT, ErrorCode::Conflict),
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DbFailure)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Failure)
            }
        };

        let message = match &self {
            AppError::Database(_) => "Database error".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
            allowed,
            minimum_available: minimum,
            maximum_available: maximum,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
