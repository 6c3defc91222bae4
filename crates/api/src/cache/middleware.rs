//! Read-through caching of catalog GET responses.
//!
//! Only `200 OK` GET responses are stored; everything else passes through
//! untouched. Each response reports what happened in `x-cache`:
//!
//! - `HIT`: served from Redis without touching the handler
//! - `MISS`: handler ran (and the body was stored if cacheable)
//! - `BYPASS`: the cache is disabled or the request is not cacheable

use axum::{
    body::{Body, to_bytes},
    extract::{OriginalUri, Request, State},
    http::{HeaderValue, Method, StatusCode, header::CONTENT_TYPE},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use super::ResponseCache;

/// Response header reporting the cache outcome.
pub const CACHE_STATUS_HEADER: &str = "x-cache";

/// Bodies larger than this are never stored.
pub const MAX_CACHEABLE_BYTES: usize = 1024 * 1024;

fn with_cache_status(mut response: Response, status: &'static str) -> Response {
    response
        .headers_mut()
        .insert(CACHE_STATUS_HEADER, HeaderValue::from_static(status));
    response
}

/// Cache key for a request: path plus raw query string.
///
/// Uses the pre-nesting URI so keys always carry the full `/api/...` path.
#[must_use]
pub fn cache_key(request: &Request) -> String {
    let uri = request
        .extensions()
        .get::<OriginalUri>()
        .map_or_else(|| request.uri(), |original| &original.0);
    match uri.query() {
        Some(q) if !q.is_empty() => format!("{}?{q}", uri.path()),
        _ => uri.path().to_owned(),
    }
}

/// Serve cached GET responses and store fresh ones.
pub async fn response_cache_middleware(
    State(cache): State<ResponseCache>,
    request: Request,
    next: Next,
) -> Response {
    if request.method() != Method::GET || !cache.is_enabled() {
        return with_cache_status(next.run(request).await, "BYPASS");
    }

    let key = cache_key(&request);
    if let Some(body) = cache.get(&key).await {
        let response = (
            StatusCode::OK,
            [(CONTENT_TYPE, HeaderValue::from_static("application/json"))],
            body,
        )
            .into_response();
        return with_cache_status(response, "HIT");
    }

    let response = next.run(request).await;
    if response.status() != StatusCode::OK {
        return with_cache_status(response, "MISS");
    }

    let (parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "Failed to buffer response for caching");
            return with_cache_status(
                StatusCode::INTERNAL_SERVER_ERROR.into_response(),
                "MISS",
            );
        }
    };

    if bytes.len() <= MAX_CACHEABLE_BYTES {
        cache.set(&key, &bytes, cache.default_ttl()).await;
    }

    with_cache_status(Response::from_parts(parts, Body::from(bytes)), "MISS")
}
