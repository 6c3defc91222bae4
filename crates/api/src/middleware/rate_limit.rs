//! Rate limiting middleware using governor and `tower_governor`.
//!
//! Provides configurable rate limiters for different endpoint categories:
//! - `payments_rate_limiter`: Strict limits for order creation and webhooks (~20/min)
//! - `api_rate_limiter`: Relaxed limits for general API endpoints (~100/min)

use std::net::IpAddr;
use std::sync::Arc;

use axum::http::{HeaderMap, Request};
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

// =============================================================================
// Client IP
// =============================================================================

fn header_ip(headers: &HeaderMap, name: &str) -> Option<IpAddr> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
}

/// Best-effort real client IP from proxy headers.
///
/// Checks Cloudflare's `CF-Connecting-IP` first, then the first hop of
/// `X-Forwarded-For`, then `X-Real-IP`.
#[must_use]
pub fn client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    header_ip(headers, "cf-connecting-ip")
        .or_else(|| header_ip(headers, "x-forwarded-for"))
        .or_else(|| header_ip(headers, "x-real-ip"))
}

// =============================================================================
// Custom IP Key Extractor
// =============================================================================

/// Key extractor using [`client_ip`].
///
/// Requests with no recognisable client IP (for example the Discord bot
/// calling from the same network) share the unspecified-address bucket.
#[derive(Clone, Copy)]
pub struct ProxyIpKeyExtractor;

impl tower_governor::key_extractor::KeyExtractor for ProxyIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        Ok(client_ip(req.headers()).unwrap_or(IpAddr::from([0, 0, 0, 0])))
    }
}

// =============================================================================
// Rate Limiter Configuration
// =============================================================================

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ProxyIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Create rate limiter for payment endpoints: ~20 requests per minute per IP.
///
/// Configuration: 1 request every 3 seconds (replenish), burst of 10.
///
/// # Panics
///
/// This function will not panic. The configuration uses only valid positive
/// integers (`per_second(3)` and `burst_size(10)`), which are always accepted
/// by `GovernorConfigBuilder`.
#[must_use]
pub fn payments_rate_limiter() -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ProxyIpKeyExtractor)
        .per_second(3) // Replenish 1 token every 3 seconds (~20/minute)
        .burst_size(10)
        .finish()
        .expect("rate limiter config with per_second(3) and burst_size(10) is valid");
    GovernorLayer::new(Arc::new(config))
}

/// Create rate limiter for general API: ~100 requests per minute per IP.
///
/// Configuration: 1 request per second (replenish), burst of 50.
///
/// # Panics
///
/// This function will not panic. The configuration uses only valid positive
/// integers (`per_second(1)` and `burst_size(50)`), which are always accepted
/// by `GovernorConfigBuilder`.
#[must_use]
pub fn api_rate_limiter() -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ProxyIpKeyExtractor)
        .per_second(1)
        .burst_size(50)
        .finish()
        .expect("rate limiter config with per_second(1) and burst_size(50) is valid");
    GovernorLayer::new(Arc::new(config))
}
