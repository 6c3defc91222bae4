//! Backend client errors.

use shopbot_core::auth::TokenError;
use thiserror::Error;

/// Errors that can occur when calling the backend API.
#[derive(Debug, Error)]
pub enum ApiClientError {
    /// HTTP request failed before a response arrived.
    #[error("API request failed: {0}")]
    Request(String),

    /// Response body was not the expected envelope.
    #[error("API response error: {0}")]
    Response(String),

    /// The API answered with an error envelope or a non-success status.
    #[error("API error {status} {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// Minting the service token failed.
    #[error("service token error: {0}")]
    Token(#[from] TokenError),
}

impl ApiClientError {
    /// Stable error code from the API, if this is an API error.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Text safe to show a Discord user.
    ///
    /// Validation and state errors carry messages meant for the caller;
    /// everything else is reported generically.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api { status, message, .. } if (400..500).contains(status) => message.clone(),
            _ => "The shop is unavailable right now. Please try again later.".to_string(),
        }
    }
}
