//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server errors to Sentry
//! and renders every failure as the JSON error envelope:
//!
//! ```json
//! { "success": false, "error": { "code": "NOT_FOUND", "message": "..." }, "timestamp": "..." }
//! ```
//!
//! All route handlers should return `Result<T, AppError>`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use shopbot_core::{ApiError, ApiResponse, ValidationErrors};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::security::CryptoError;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Transaction payload could not be encrypted or decrypted.
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Request payload failed validation.
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller is authenticated but not allowed to do this.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Request conflicts with current state (e.g. deleting a referenced row).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Malformed request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Payment order is not in a state that permits the operation.
    #[error("Invalid payment state: {0}")]
    PaymentState(String),

    /// Risk scoring rejected the transaction.
    #[error("Transaction blocked (risk score {score})")]
    TransactionBlocked {
        /// Score that triggered the block.
        score: u32,
    },

    /// Webhook signature missing, stale or wrong.
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(RepositoryError::Conflict(_))
            | Self::Conflict(_)
            | Self::PaymentState(_) => StatusCode::CONFLICT,
            Self::Database(_) | Self::Crypto(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) | Self::InvalidSignature(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) | Self::TransactionBlocked { .. } => StatusCode::FORBIDDEN,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// Stable machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => "NOT_FOUND",
            Self::Database(RepositoryError::Conflict(_)) | Self::Conflict(_) => "CONFLICT",
            Self::Database(_) | Self::Crypto(_) | Self::Internal(_) => "INTERNAL_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::PaymentState(_) => "PAYMENT_STATE",
            Self::TransactionBlocked { .. } => "TRANSACTION_BLOCKED",
            Self::InvalidSignature(_) => "INVALID_SIGNATURE",
            Self::RateLimited => "RATE_LIMITED",
        }
    }

    /// Whether this is a server-side failure worth reporting.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status().is_server_error()
    }

    /// Client-safe error body. Internal details are never exposed.
    fn to_api_error(&self) -> ApiError {
        match self {
            Self::Database(RepositoryError::NotFound) => {
                ApiError::new(self.code(), "Resource not found")
            }
            Self::Database(RepositoryError::Conflict(msg)) => ApiError::new(self.code(), msg),
            Self::Database(_) | Self::Crypto(_) | Self::Internal(_) => {
                ApiError::new(self.code(), "Internal server error")
            }
            Self::Validation(errors) => ApiError::new(self.code(), "Request validation failed")
                .with_details(serde_json::to_value(errors).unwrap_or_default()),
            Self::TransactionBlocked { score } => ApiError::new(
                self.code(),
                "Transaction rejected by security checks",
            )
            .with_details(serde_json::json!({ "risk_score": score })),
            Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::Conflict(msg)
            | Self::BadRequest(msg)
            | Self::PaymentState(msg)
            | Self::InvalidSignature(msg) => ApiError::new(self.code(), msg),
            Self::RateLimited => ApiError::new(self.code(), "Too many requests"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, code = self.code(), "Request rejected");
        }

        let status = self.status();
        let body = ApiResponse::<()>::err(self.to_api_error());

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
