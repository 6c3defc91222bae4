//! HTTP route handlers for the API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                                        - Liveness
//!
//! # Monitoring
//! GET    /api/monitoring/health                         - Database and cache status
//! GET    /api/monitoring/stats                          - Cache, risk and order counters
//!
//! # Catalog (reads cached, writes need a service token)
//! GET    /api/categories?guild_id=                      - List a guild's categories
//! GET    /api/categories/{id}                           - Category detail
//! POST   /api/categories                                - Create
//! PUT    /api/categories/{id}                           - Update
//! DELETE /api/categories/{id}?guild_id=                 - Delete (409 while referenced)
//! GET    /api/products?guild_id=&category_id=&active=&page=&limit=
//! GET    /api/products/{id}                             - Product detail
//! POST   /api/products                                  - Create
//! PUT    /api/products/{id}                             - Update
//! DELETE /api/products/{id}?guild_id=                   - Deactivate
//!
//! # Payments (service token)
//! POST   /api/payments/orders                           - Create order (risk screened)
//! GET    /api/payments/orders/{id}                      - Order detail
//! POST   /api/payments/orders/{id}/cancel               - Cancel own pending order
//! GET    /api/payments/users/{discord_id}/orders        - Order history
//! GET    /api/payments/users/{discord_id}/subscriptions - Subscriptions
//! GET    /api/payments/transactions/{id}                - Transaction with decrypted payload
//!
//! # Webhooks (HMAC signature)
//! POST   /api/webhooks/payments                         - Processor notification
//! ```

pub mod categories;
pub mod monitoring;
pub mod payments;
pub mod products;
pub mod webhooks;

use axum::{Router, middleware::from_fn_with_state};

use crate::cache::response_cache_middleware;
use crate::middleware::{api_rate_limiter, payments_rate_limiter};
use crate::state::AppState;

/// Catalog routes behind the response cache.
pub fn catalog_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .nest("/categories", categories::router())
        .nest("/products", products::router())
        .layer(from_fn_with_state(state.clone(), response_cache_middleware))
}

/// Create every route under `/api`.
pub fn api_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(catalog_routes(state))
        .nest("/monitoring", monitoring::router())
        .nest(
            "/payments",
            payments::router(state).layer(payments_rate_limiter()),
        )
        .nest("/webhooks", webhooks::router().layer(payments_rate_limiter()))
        .layer(api_rate_limiter())
}
