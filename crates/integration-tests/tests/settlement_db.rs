//! Webhook settlement and expiry sweeps against a real database.
//!
//! These tests require a `PostgreSQL` database with migrations applied at
//! `TEST_DATABASE_URL`. No API server is needed; the payment service runs
//! in-process.
//!
//! Run with: `cargo test -p shopbot-integration-tests --test settlement_db -- --ignored`

#![allow(clippy::unwrap_used)]

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use shopbot_api::db::orders::NewOrder;
use shopbot_api::db::{OrderRepository, ProductRepository, SubscriptionRepository};
use shopbot_api::models::catalog::ProductFields;
use shopbot_api::models::payment::{WebhookAck, WebhookPayload, WebhookStatus};
use shopbot_api::services::sweep_expired;
use shopbot_api::state::AppState;
use shopbot_core::{Currency, DiscordId, OrderId, PaymentOrder, PaymentStatus, Product};
use shopbot_integration_tests::{connect_test_db, db_state};

/// A snowflake no earlier run used, offset so tests in one run differ.
fn fresh_id(offset: u64) -> DiscordId {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap();
    let nanos = u64::try_from(nanos).unwrap() % 1_000_000_000_000_000;
    DiscordId::from_u64(100_000_000_000_000_000 + nanos + offset)
}

async fn product(
    pool: &PgPool,
    guild: &DiscordId,
    stock: Option<i32>,
    days: Option<i32>,
) -> Product {
    let fields = ProductFields {
        category_id: None,
        name: "Settlement product".to_string(),
        description: None,
        price: Decimal::new(1250, 2),
        currency: Currency::Usdt,
        stock,
        role_id: days.map(|_| DiscordId::from_u64(723_456_789_012_345_678)),
        duration_days: days,
        is_active: true,
    };
    ProductRepository::new(pool).create(guild, &fields).await.unwrap()
}

async fn order(
    pool: &PgPool,
    product: &Product,
    buyer: &DiscordId,
    expires_in: Duration,
) -> PaymentOrder {
    let id = OrderId::generate();
    let new_order = NewOrder {
        id,
        product_id: product.id,
        guild_id: product.guild_id.clone(),
        discord_user_id: buyer.clone(),
        amount: product.price,
        currency: product.currency,
        pay_address: format!("test-{}", id.short()),
        risk_score: 0,
        expires_at: Utc::now() + expires_in,
    };
    OrderRepository::new(pool).create(&new_order).await.unwrap()
}

async fn deliver(state: &AppState, order: &PaymentOrder, status: WebhookStatus) -> WebhookAck {
    let payload = WebhookPayload {
        event_id: format!("evt_{}", order.id.short()),
        order_id: order.id,
        status,
        amount: order.amount,
        currency: order.currency,
        tx_hash: Some("0xabc".to_string()),
    };
    let raw = serde_json::to_value(&payload).unwrap();
    state.payments().process_webhook(&payload, &raw).await.unwrap()
}

async fn stock(pool: &PgPool, product: &Product) -> Option<i32> {
    ProductRepository::new(pool)
        .get_by_id(product.id)
        .await
        .unwrap()
        .unwrap()
        .stock
}

async fn order_status(pool: &PgPool, order: &PaymentOrder) -> PaymentStatus {
    OrderRepository::new(pool)
        .get_by_id(order.id)
        .await
        .unwrap()
        .unwrap()
        .status
}

async fn transaction_count(pool: &PgPool, order: &PaymentOrder) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE order_id = $1")
        .bind(order.id)
        .fetch_one(pool)
        .await
        .unwrap()
}

// ============================================================================
// Settlement
// ============================================================================

#[tokio::test]
#[ignore = "requires database"]
async fn test_subscription_settles_on_a_single_connection() {
    // The settlement transaction holds the only connection; every read it
    // needs must go through that transaction.
    let pool = connect_test_db(1).await;
    let state = db_state(pool.clone());
    let guild = fresh_id(0);
    let buyer = fresh_id(1);

    let product = product(&pool, &guild, Some(5), Some(30)).await;
    let order = order(&pool, &product, &buyer, Duration::minutes(30)).await;

    let ack = deliver(&state, &order, WebhookStatus::Confirmed).await;
    assert_eq!(ack.status, PaymentStatus::Completed);
    assert!(!ack.ignored);
    assert_eq!(stock(&pool, &product).await, Some(4));

    let subscriptions = SubscriptionRepository::new(&pool)
        .list_by_user(&buyer)
        .await
        .unwrap();
    assert_eq!(subscriptions.len(), 1);
    assert!(subscriptions[0].is_active);
    assert_eq!(subscriptions[0].order_id, order.id);
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_replayed_delivery_is_ignored() {
    let pool = connect_test_db(2).await;
    let state = db_state(pool.clone());
    let guild = fresh_id(10);
    let buyer = fresh_id(11);

    let product = product(&pool, &guild, Some(2), None).await;
    let order = order(&pool, &product, &buyer, Duration::minutes(30)).await;

    let first = deliver(&state, &order, WebhookStatus::Confirmed).await;
    assert_eq!(first.status, PaymentStatus::Completed);
    assert!(!first.ignored);

    let replay = deliver(&state, &order, WebhookStatus::Confirmed).await;
    assert_eq!(replay.status, PaymentStatus::Completed);
    assert!(replay.ignored);

    // A failure report after completion changes nothing either
    let late_failure = deliver(&state, &order, WebhookStatus::Failed).await;
    assert_eq!(late_failure.status, PaymentStatus::Completed);
    assert!(late_failure.ignored);

    assert_eq!(stock(&pool, &product).await, Some(1));
    assert_eq!(transaction_count(&pool, &order).await, 1);
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_sold_out_product_fails_second_order() {
    let pool = connect_test_db(2).await;
    let state = db_state(pool.clone());
    let guild = fresh_id(20);

    let product = product(&pool, &guild, Some(1), None).await;
    let first = order(&pool, &product, &fresh_id(21), Duration::minutes(30)).await;
    let second = order(&pool, &product, &fresh_id(22), Duration::minutes(30)).await;

    let ack = deliver(&state, &first, WebhookStatus::Confirmed).await;
    assert_eq!(ack.status, PaymentStatus::Completed);
    let ack = deliver(&state, &second, WebhookStatus::Confirmed).await;
    assert_eq!(ack.status, PaymentStatus::Failed);

    assert_eq!(stock(&pool, &product).await, Some(0));
    assert_eq!(transaction_count(&pool, &second).await, 0);
}

// ============================================================================
// Expiry
// ============================================================================

#[tokio::test]
#[ignore = "requires database"]
async fn test_delivery_after_deadline_expires_order() {
    let pool = connect_test_db(2).await;
    let state = db_state(pool.clone());
    let guild = fresh_id(30);

    let product = product(&pool, &guild, Some(3), None).await;
    let order = order(&pool, &product, &fresh_id(31), -Duration::minutes(1)).await;

    // Whether this delivery or a concurrent sweep expires it, the payment
    // does not complete
    let ack = deliver(&state, &order, WebhookStatus::Confirmed).await;
    assert_eq!(ack.status, PaymentStatus::Expired);
    assert_eq!(order_status(&pool, &order).await, PaymentStatus::Expired);
    assert_eq!(stock(&pool, &product).await, Some(3));
    assert_eq!(transaction_count(&pool, &order).await, 0);
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_sweep_expires_overdue_orders_only() {
    let pool = connect_test_db(2).await;
    let state = db_state(pool.clone());
    let guild = fresh_id(40);

    let product = product(&pool, &guild, Some(3), None).await;
    let overdue = order(&pool, &product, &fresh_id(41), -Duration::minutes(1)).await;
    let payable = order(&pool, &product, &fresh_id(42), Duration::minutes(30)).await;

    let report = sweep_expired(&pool, Utc::now()).await.unwrap();
    assert!(report.expired_orders >= 1);
    assert_eq!(order_status(&pool, &overdue).await, PaymentStatus::Expired);
    assert_eq!(order_status(&pool, &payable).await, PaymentStatus::Pending);

    // A confirmation arriving after the sweep is acknowledged and ignored
    let late = deliver(&state, &overdue, WebhookStatus::Confirmed).await;
    assert_eq!(late.status, PaymentStatus::Expired);
    assert!(late.ignored);
    assert_eq!(stock(&pool, &product).await, Some(3));
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_lapsed_subscription_is_deactivated_and_repurchase_starts_fresh() {
    let pool = connect_test_db(2).await;
    let state = db_state(pool.clone());
    let guild = fresh_id(50);
    let buyer = fresh_id(51);

    let product = product(&pool, &guild, None, Some(30)).await;
    let first = order(&pool, &product, &buyer, Duration::minutes(30)).await;
    deliver(&state, &first, WebhookStatus::Confirmed).await;

    sqlx::query(
        "UPDATE user_subscriptions
         SET expires_at = NOW() - INTERVAL '1 minute'
         WHERE order_id = $1",
    )
    .bind(first.id)
    .execute(&pool)
    .await
    .unwrap();

    let report = sweep_expired(&pool, Utc::now()).await.unwrap();
    assert!(report.lapsed_subscriptions >= 1);

    let subscriptions = SubscriptionRepository::new(&pool);
    let lapsed = subscriptions.list_by_user(&buyer).await.unwrap();
    assert_eq!(lapsed.len(), 1);
    assert!(!lapsed[0].is_active);

    let second = order(&pool, &product, &buyer, Duration::minutes(30)).await;
    let before = Utc::now();
    deliver(&state, &second, WebhookStatus::Confirmed).await;

    let all = subscriptions.list_by_user(&buyer).await.unwrap();
    assert_eq!(all.len(), 2);
    let (active, history): (Vec<_>, Vec<_>) = all.into_iter().partition(|s| s.is_active);
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].order_id, second.id);
    assert!(active[0].expires_at >= before + Duration::days(30));
    assert_eq!(history[0].id, lapsed[0].id);
    assert_eq!(history[0].order_id, first.id);
}
