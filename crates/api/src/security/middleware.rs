//! Pre-handler risk screening for order creation.
//!
//! Buffers the JSON body, reads the buyer and any amount hint from it,
//! combines them with fingerprint headers, and scores the attempt before the
//! handler runs. Blocked attempts never reach the handler; everything else
//! continues with the [`RiskAssessment`](super::RiskAssessment) attached as a request extension.

use std::convert::Infallible;
use std::net::IpAddr;

use axum::{
    body::{Body, to_bytes},
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::debug;

use shopbot_core::{Currency, DiscordId, Money};

use super::RiskContext;
use crate::error::AppError;
use crate::middleware::rate_limit::client_ip;
use crate::state::AppState;

/// Largest order body the screen will buffer.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Header carrying a client-side device fingerprint.
pub const DEVICE_ID_HEADER: &str = "x-device-id";

/// Client fingerprint taken from request headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fingerprint {
    pub ip: Option<IpAddr>,
    pub user_agent: Option<String>,
    pub device_id: Option<String>,
}

impl Fingerprint {
    /// Read `cf-connecting-ip`/`x-forwarded-for`, `user-agent` and `x-device-id`.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let text = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };
        Self {
            ip: client_ip(headers),
            user_agent: text("user-agent"),
            device_id: text(DEVICE_ID_HEADER),
        }
    }

    /// Combine with the buyer and amount into a scoring context.
    #[must_use]
    pub fn into_context(self, user: DiscordId, amount: Option<Money>) -> RiskContext {
        RiskContext {
            user,
            ip: self.ip,
            user_agent: self.user_agent,
            device_id: self.device_id,
            amount,
            at: Utc::now(),
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Fingerprint {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

/// Fields of an order body the screen looks at. Everything is optional; the
/// handler does full validation.
#[derive(Debug, Default)]
struct OrderHints {
    discord_user_id: Option<String>,
    amount: Option<String>,
    currency: Option<String>,
}

impl OrderHints {
    fn parse(body: &[u8]) -> Self {
        serde_json::from_slice::<serde_json::Value>(body)
            .ok()
            .map(|value| Self {
                discord_user_id: string_field(&value, "discord_user_id"),
                amount: string_field(&value, "amount"),
                currency: string_field(&value, "currency"),
            })
            .unwrap_or_default()
    }

    fn money(&self) -> Option<Money> {
        let currency: Currency = self.currency.as_deref()?.parse().ok()?;
        Money::parse(self.amount.as_deref()?, currency).ok()
    }
}

/// Read a field that may be sent as a JSON string or number.
fn string_field(value: &serde_json::Value, key: &str) -> Option<String> {
    match value.get(key)? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Score an order request before its handler runs.
///
/// Requests whose body cannot be read or names no valid buyer pass through
/// unscored; the handler rejects them during validation.
pub async fn transaction_security_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();
    let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return AppError::BadRequest(format!(
                "request body exceeds {MAX_BODY_BYTES} bytes"
            ))
            .into_response();
        }
    };

    let hints = OrderHints::parse(&bytes);
    if let Some(user) = hints
        .discord_user_id
        .as_deref()
        .and_then(|id| DiscordId::parse(id).ok())
    {
        let ctx = Fingerprint::from_headers(&parts.headers).into_context(user, hints.money());
        let security = state.security();
        let assessment = security.assess(&ctx);
        debug!(score = assessment.score, decision = ?assessment.decision, "Order pre-screened");

        if assessment.is_blocked() {
            security.record(&ctx, &assessment);
            return AppError::TransactionBlocked {
                score: assessment.score,
            }
            .into_response();
        }
        parts.extensions.insert(assessment);
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_fingerprint_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        headers.insert("user-agent", HeaderValue::from_static("Mozilla/5.0"));
        headers.insert(DEVICE_ID_HEADER, HeaderValue::from_static("  "));

        let fp = Fingerprint::from_headers(&headers);
        assert_eq!(fp.ip, "203.0.113.9".parse().ok());
        assert_eq!(fp.user_agent.as_deref(), Some("Mozilla/5.0"));
        assert_eq!(fp.device_id, None);
    }

    #[test]
    fn test_hints_accept_strings_and_numbers() {
        let hints = OrderHints::parse(
            br#"{"discord_user_id":"80351110224678912","amount":1000,"currency":"usdt"}"#,
        );
        assert_eq!(hints.discord_user_id.as_deref(), Some("80351110224678912"));
        assert_eq!(
            hints.money().map(|m| m.to_string()).as_deref(),
            Some("1000 USDT")
        );
    }

    #[test]
    fn test_hints_tolerate_garbage() {
        let hints = OrderHints::parse(b"not json");
        assert!(hints.discord_user_id.is_none());
        assert!(hints.money().is_none());
    }
}
