//! Payment route handlers.
//!
//! Every route needs a service token. Order creation additionally runs
//! behind the transaction security pre-screen.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use serde::Deserialize;
use tracing::instrument;

use shopbot_core::{ApiResponse, DiscordId, OrderId, Paginated, PaymentOrder, TransactionId};

use crate::error::{AppError, Result};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::{RequireService, require_service_middleware};
use crate::models::{
    CancelOrderRequest, CreateOrderRequest, OrderCreated, PageQuery, SubscriptionView,
    TransactionView,
};
use crate::security::middleware::{Fingerprint, transaction_security_middleware};
use crate::state::AppState;

/// Payment routes, nested under `/api/payments`.
///
/// Needs the state up front to attach the pre-screen to order creation.
pub fn router(state: &AppState) -> Router<AppState> {
    let create = post(create_order)
        .route_layer(from_fn_with_state(
            state.clone(),
            transaction_security_middleware,
        ))
        // Outermost: unauthenticated callers never reach the risk ledgers
        .route_layer(from_fn_with_state(state.clone(), require_service_middleware));

    Router::new()
        .route("/orders", create)
        .route("/orders/{id}", get(show_order))
        .route("/orders/{id}/cancel", post(cancel_order))
        .route("/users/{discord_id}/orders", get(user_orders))
        .route("/users/{discord_id}/subscriptions", get(user_subscriptions))
        .route("/transactions/{id}", get(show_transaction))
}

/// Optional owner check on order reads.
#[derive(Debug, Deserialize)]
struct OwnerQuery {
    discord_user_id: Option<DiscordId>,
}

/// `POST /api/payments/orders`
#[instrument(skip(state, caller, fingerprint, request), fields(service = %caller.0.sub))]
async fn create_order(
    caller: RequireService,
    State(state): State<AppState>,
    fingerprint: Fingerprint,
    ApiJson(request): ApiJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderCreated>>)> {
    let created = state.payments().create_order(request, fingerprint).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(created))))
}

/// `GET /api/payments/orders/{id}[?discord_user_id=]`
#[instrument(skip(state, _caller))]
async fn show_order(
    _caller: RequireService,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<OrderId>,
    ApiQuery(owner): ApiQuery<OwnerQuery>,
) -> Result<Json<ApiResponse<PaymentOrder>>> {
    let order = state.payments().get_order(id).await?;
    if let Some(user) = owner.discord_user_id
        && user != order.discord_user_id
    {
        return Err(AppError::Forbidden(
            "order belongs to another user".to_string(),
        ));
    }
    Ok(Json(ApiResponse::ok(order)))
}

/// `POST /api/payments/orders/{id}/cancel`
#[instrument(skip(state, _caller, request))]
async fn cancel_order(
    _caller: RequireService,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<OrderId>,
    ApiJson(request): ApiJson<CancelOrderRequest>,
) -> Result<Json<ApiResponse<PaymentOrder>>> {
    let order = state
        .payments()
        .cancel_order(id, &request.discord_user_id)
        .await?;
    Ok(Json(ApiResponse::ok(order)))
}

/// `GET /api/payments/users/{discord_id}/orders?page=&limit=`
#[instrument(skip(state, _caller))]
async fn user_orders(
    _caller: RequireService,
    State(state): State<AppState>,
    ApiPath(user): ApiPath<DiscordId>,
    ApiQuery(paging): ApiQuery<PageQuery>,
) -> Result<Json<ApiResponse<Paginated<PaymentOrder>>>> {
    paging.validate()?;
    let orders = state
        .payments()
        .list_user_orders(&user, paging.page, paging.limit)
        .await?;
    Ok(Json(ApiResponse::ok(orders)))
}

/// `GET /api/payments/users/{discord_id}/subscriptions`
#[instrument(skip(state, _caller))]
async fn user_subscriptions(
    _caller: RequireService,
    State(state): State<AppState>,
    ApiPath(user): ApiPath<DiscordId>,
) -> Result<Json<ApiResponse<Vec<SubscriptionView>>>> {
    let now = chrono::Utc::now();
    let subscriptions = state
        .payments()
        .list_user_subscriptions(&user)
        .await?
        .into_iter()
        .map(|subscription| SubscriptionView {
            days_remaining: subscription.days_remaining(now),
            subscription,
        })
        .collect();
    Ok(Json(ApiResponse::ok(subscriptions)))
}

/// `GET /api/payments/transactions/{id}`
///
/// Returns the processor payload decrypted.
#[instrument(skip(state, caller), fields(service = %caller.0.sub))]
async fn show_transaction(
    caller: RequireService,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<TransactionId>,
) -> Result<Json<ApiResponse<TransactionView>>> {
    let view = state.payments().get_transaction(id).await?;
    Ok(Json(ApiResponse::ok(view)))
}
