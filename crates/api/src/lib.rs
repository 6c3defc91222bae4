//! Shopbot API library.
//!
//! The REST backend behind the Discord shop: catalog CRUD, payment orders,
//! processor webhooks, response caching and transaction security. Exposed
//! as a library so the binary, the CLI and the integration tests build the
//! exact same router.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod security;
pub mod services;
pub mod state;

use axum::http::{HeaderValue, Method, header};
use axum::{Router, routing::get};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use state::AppState;

/// CORS for the configured origins; an empty list allows none.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Build the full application router.
///
/// Layer order, outermost first: Sentry, tracing, request ID, security
/// headers, CORS, then per-group rate limits and caching inside `/api`.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config().cors_origins);

    Router::new()
        .route("/health", get(routes::monitoring::liveness))
        .nest("/api", routes::api_routes(&state))
        .layer(cors)
        .layer(axum::middleware::from_fn(
            middleware::security_headers_middleware,
        ))
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
