//! JSON envelope shared by every API response.
//!
//! ```json
//! { "success": true,  "data": { ... },  "timestamp": "2026-01-01T00:00:00Z" }
//! { "success": false, "error": { "code": "NOT_FOUND", "message": "..." }, "timestamp": "..." }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    /// Successful response carrying `data`.
    #[must_use]
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Failed response carrying `error`.
    #[must_use]
    pub fn err(error: ApiError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            timestamp: Utc::now(),
        }
    }

    /// Convert into a `Result`, treating a success without data as an error.
    ///
    /// # Errors
    ///
    /// Returns the carried [`ApiError`], or a synthetic `EMPTY_RESPONSE`
    /// error when neither data nor error is present.
    pub fn into_result(self) -> Result<T, ApiError> {
        match (self.data, self.error) {
            (Some(data), _) if self.success => Ok(data),
            (_, Some(error)) => Err(error),
            _ => Err(ApiError::new("EMPTY_RESPONSE", "response carried no data")),
        }
    }
}

/// Machine-readable error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Stable code (e.g. `VALIDATION_ERROR`).
    pub code: String,
    /// Human-readable message, safe to show to end users.
    pub message: String,
    /// Optional structured details (e.g. per-field validation errors).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create an error without details.
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Attach structured details.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: i64,
}

impl<T> Paginated<T> {
    /// Whether another page exists after this one.
    #[must_use]
    pub fn has_more(&self) -> bool {
        i64::from(self.page) * i64::from(self.limit) < self.total
    }
}
