//! Payment processor webhook handler.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
};
use chrono::Utc;
use tracing::{debug, instrument, warn};

use shopbot_core::{ApiResponse, PaymentStatus, ValidationErrors};

use crate::error::{AppError, Result};
use crate::models::{WebhookAck, WebhookPayload};
use crate::routes::products;
use crate::services::webhook::{SIGNATURE_HEADER, TIMESTAMP_HEADER};
use crate::state::AppState;

/// Webhook routes, nested under `/api/webhooks`.
pub fn router() -> Router<AppState> {
    Router::new().route("/payments", post(payment_webhook))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// `POST /api/webhooks/payments`
///
/// The signature covers the exact bytes received, so the body is read raw
/// and parsed only after verification.
#[instrument(skip(state, headers, body))]
async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<WebhookAck>>> {
    state
        .webhooks()
        .verify(
            header(&headers, TIMESTAMP_HEADER),
            header(&headers, SIGNATURE_HEADER),
            &body,
            Utc::now(),
        )
        .map_err(|e| {
            warn!(error = %e, "Webhook rejected");
            AppError::InvalidSignature(e.to_string())
        })?;

    let raw: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("invalid JSON: {e}")))?;
    let payload: WebhookPayload = serde_json::from_value(raw.clone()).map_err(|e| {
        let mut errors = ValidationErrors::new();
        errors.add("body", e.to_string());
        AppError::Validation(errors)
    })?;
    payload.validate()?;

    debug!(order_id = %payload.order_id, status = ?payload.status, "Webhook verified");

    let ack = state.payments().process_webhook(&payload, &raw).await?;
    if !ack.ignored && ack.status == PaymentStatus::Completed {
        // Stock changed
        state.cache().invalidate_prefix(products::CACHE_PREFIX).await;
    }

    Ok(Json(ApiResponse::ok(ack)))
}
