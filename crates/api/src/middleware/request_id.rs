//! Request ID middleware for request tracing and correlation.
//!
//! A caller-supplied `x-request-id` is kept so one ID can follow a request
//! across services and into Sentry. Requests without a usable ID get a
//! UUID v4.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Span;
use uuid::Uuid;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest client-supplied ID that is accepted as-is.
const MAX_REQUEST_ID_LEN: usize = 128;

/// Request ID stored in request extensions for handlers that need it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

/// Accept a client-supplied ID only if it is short, printable ASCII.
fn usable_id(value: &HeaderValue) -> Option<String> {
    let s = value.to_str().ok()?.trim();
    let ok = !s.is_empty()
        && s.len() <= MAX_REQUEST_ID_LEN
        && s.bytes().all(|b| b.is_ascii_graphic());
    ok.then(|| s.to_owned())
}

/// Middleware that ensures every request has a request ID.
///
/// The ID is recorded in the current tracing span, tagged on the Sentry
/// scope, stored as a [`RequestId`] extension and echoed in the response.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(usable_id)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    Span::current().record("request_id", &request_id);

    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &request_id);
    });

    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}
