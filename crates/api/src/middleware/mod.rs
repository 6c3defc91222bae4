//! HTTP middleware stack for the API.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Security headers
//! 5. CORS
//! 6. Rate limiting (governor, per route group)
//! 7. Response cache (catalog reads) / transaction security (order creation)

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;

pub use auth::{RequireService, require_service_middleware};
pub use rate_limit::{api_rate_limiter, client_ip, payments_rate_limiter};
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
pub use security_headers::security_headers_middleware;
