//! Service authentication extractor.
//!
//! Every write route and every payment route requires a service token:
//!
//! ```text
//! Authorization: Bearer <HS256 JWT with role = "service">
//! ```
//!
//! Missing or invalid tokens are rejected with 401, valid tokens with any
//! other role with 403.

use axum::{
    extract::{FromRequestParts, Request},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use shopbot_core::auth::{ServiceClaims, TokenError};

use crate::error::AppError;
use crate::state::AppState;

/// Extractor that requires a valid service token.
///
/// # Example
///
/// ```rust,ignore
/// async fn create_category(
///     RequireService(caller): RequireService,
///     State(state): State<AppState>,
/// ) -> Result<Json<ApiResponse<Category>>> {
///     tracing::info!(caller = %caller.sub, "creating category");
///     // ...
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequireService(pub ServiceClaims);

/// Pull the bearer token out of an `Authorization` header value.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

impl FromRequestParts<AppState> for RequireService {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;

        let token = bearer_token(header)
            .ok_or_else(|| AppError::Unauthorized("malformed authorization header".to_string()))?;

        match state.tokens().verify_service(token) {
            Ok(claims) => {
                sentry::configure_scope(|scope| scope.set_tag("service", &claims.sub));
                Ok(Self(claims))
            }
            Err(TokenError::WrongRole(role)) => {
                debug!(%role, "Token with non-service role rejected");
                Err(AppError::Forbidden(
                    "service role required for this endpoint".to_string(),
                ))
            }
            Err(e) => {
                debug!(error = %e, "Service token rejected");
                Err(AppError::Unauthorized("invalid or expired token".to_string()))
            }
        }
    }
}

/// Route layer that rejects callers without a service token before any
/// other middleware on the route runs.
pub async fn require_service_middleware(
    _caller: RequireService,
    request: Request,
    next: Next,
) -> Response {
    next.run(request).await
}
