//! Payment order lifecycle.
//!
//! Orders are created pending, then settled by a signed processor webhook,
//! cancelled by their owner, or expired by the background sweep. Settlement
//! runs in one database transaction with the order row locked: the order
//! status, stock, transaction record and subscription all change together or
//! not at all.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use shopbot_core::{
    DiscordId, Money, OrderId, Paginated, PaymentOrder, PaymentStatus, Product, RiskLevel,
    Transaction, TransactionId, UserSubscription,
};

use crate::config::PaymentsConfig;
use crate::db::orders::NewOrder;
use crate::db::{
    OrderRepository, ProductRepository, RepositoryError, SubscriptionRepository,
    TransactionRepository,
};
use crate::error::AppError;
use crate::models::payment::{
    CreateOrderRequest, OrderCreated, TransactionView, WebhookAck, WebhookPayload, WebhookStatus,
};
use crate::security::middleware::Fingerprint;
use crate::security::{RiskDecision, TransactionCipher, TransactionSecurity};

/// What a webhook delivery does to a pending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Paid in full, in the right currency, in time.
    Complete,
    /// The payment window closed before the delivery arrived.
    Expire,
    /// Processor failure, underpayment or wrong currency.
    Fail(&'static str),
}

impl Settlement {
    /// Decide the outcome of `payload` for a pending `order` at `now`.
    #[must_use]
    pub fn decide(order: &PaymentOrder, payload: &WebhookPayload, now: DateTime<Utc>) -> Self {
        if now > order.expires_at {
            return Self::Expire;
        }
        let paid = Money {
            amount: payload.amount,
            currency: payload.currency,
        };
        match payload.status {
            WebhookStatus::Failed => Self::Fail("processor reported failure"),
            WebhookStatus::Confirmed if paid.covers(&order.amount()) => Self::Complete,
            WebhookStatus::Confirmed if paid.currency != order.currency => {
                Self::Fail("currency mismatch")
            }
            WebhookStatus::Confirmed => Self::Fail("underpaid"),
        }
    }
}

/// Deposit reference for an order: the prefix plus a digest of the order ID.
///
/// Deterministic, so a retried create or a support lookup always derives the
/// same reference for the same order.
#[must_use]
pub fn pay_address(prefix: &str, order_id: OrderId) -> String {
    let digest = Sha256::new()
        .chain_update(prefix.as_bytes())
        .chain_update(b":")
        .chain_update(order_id.as_uuid().as_bytes())
        .finalize();
    let encoded = hex::encode(digest);
    format!("{prefix}-{}", encoded.get(..32).unwrap_or(&encoded))
}

/// Counts from one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired_orders: u64,
    pub lapsed_subscriptions: usize,
}

/// Payment operations over the shared pool and security components.
pub struct PaymentService<'a> {
    pool: &'a PgPool,
    config: &'a PaymentsConfig,
    security: &'a TransactionSecurity,
    cipher: &'a TransactionCipher,
}

impl<'a> PaymentService<'a> {
    /// Create a new payment service.
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        config: &'a PaymentsConfig,
        security: &'a TransactionSecurity,
        cipher: &'a TransactionCipher,
    ) -> Self {
        Self {
            pool,
            config,
            security,
            cipher,
        }
    }

    /// Create a pending order for one unit of a product.
    ///
    /// The attempt is scored against the product's real price and recorded
    /// for velocity checks.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the product does not exist in the request's guild
    /// - `Conflict` if the product is inactive or sold out
    /// - `TransactionBlocked` if risk scoring rejects the attempt
    #[instrument(skip(self, fingerprint), fields(user = %request.discord_user_id, product = %request.product_id))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
        fingerprint: Fingerprint,
    ) -> Result<OrderCreated, AppError> {
        let product = ProductRepository::new(self.pool)
            .get_by_id(request.product_id)
            .await?
            .filter(|p| p.guild_id == request.guild_id)
            .ok_or_else(|| AppError::NotFound(format!("product {}", request.product_id)))?;

        if !product.is_active {
            return Err(AppError::Conflict("product is not available".to_string()));
        }
        if !product.in_stock() {
            return Err(AppError::Conflict("product is out of stock".to_string()));
        }

        let ctx = fingerprint.into_context(request.discord_user_id.clone(), Some(product.price()));
        let assessment = self.security.assess_and_record(&ctx);
        if assessment.is_blocked() {
            return Err(AppError::TransactionBlocked {
                score: assessment.score,
            });
        }

        let id = OrderId::generate();
        let now = Utc::now();
        let new_order = NewOrder {
            id,
            product_id: product.id,
            guild_id: product.guild_id.clone(),
            discord_user_id: request.discord_user_id,
            amount: product.price,
            currency: product.currency,
            pay_address: pay_address(&self.config.pay_address_prefix, id),
            risk_score: i32::try_from(assessment.score).unwrap_or(i32::MAX),
            expires_at: now + self.config.order_ttl,
        };
        let order = OrderRepository::new(self.pool).create(&new_order).await?;

        info!(
            order_id = %order.id,
            amount = %order.amount(),
            risk_score = assessment.score,
            "Payment order created"
        );

        Ok(OrderCreated {
            order,
            risk_score: assessment.score,
            risk_level: assessment.level,
            review: assessment.decision == RiskDecision::Review,
        })
    }

    /// Get an order.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the order does not exist.
    pub async fn get_order(&self, id: OrderId) -> Result<PaymentOrder, AppError> {
        OrderRepository::new(self.pool)
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {id}")))
    }

    /// Cancel a pending order on behalf of its owner.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the order does not exist
    /// - `Forbidden` if `user` does not own it
    /// - `PaymentState` if it is no longer pending
    #[instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        id: OrderId,
        user: &DiscordId,
    ) -> Result<PaymentOrder, AppError> {
        let order = self.get_order(id).await?;
        if &order.discord_user_id != user {
            return Err(AppError::Forbidden(
                "order belongs to another user".to_string(),
            ));
        }
        if order.status.is_terminal() {
            return Err(AppError::PaymentState(format!("order is {}", order.status)));
        }

        // A webhook may settle the order between the read and the update
        let cancelled = OrderRepository::new(self.pool)
            .cancel(id)
            .await?
            .ok_or_else(|| AppError::PaymentState("order is no longer pending".to_string()))?;

        info!(order_id = %id, "Payment order cancelled");
        Ok(cancelled)
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Database` if the query fails.
    pub async fn list_user_orders(
        &self,
        user: &DiscordId,
        page: u32,
        limit: u32,
    ) -> Result<Paginated<PaymentOrder>, AppError> {
        Ok(OrderRepository::new(self.pool)
            .list_by_user(user, page, limit)
            .await?)
    }

    /// A user's subscriptions.
    ///
    /// # Errors
    ///
    /// Returns `Database` if the query fails.
    pub async fn list_user_subscriptions(
        &self,
        user: &DiscordId,
    ) -> Result<Vec<UserSubscription>, AppError> {
        Ok(SubscriptionRepository::new(self.pool)
            .list_by_user(user)
            .await?)
    }

    /// A settled transaction with its processor payload decrypted.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the transaction does not exist
    /// - `Crypto` if the stored payload cannot be decrypted
    #[instrument(skip(self))]
    pub async fn get_transaction(&self, id: TransactionId) -> Result<TransactionView, AppError> {
        let transaction = TransactionRepository::new(self.pool)
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("transaction {id}")))?;

        let payload = self
            .cipher
            .decrypt_json::<serde_json::Value>(transaction.id, &transaction.encrypted_payload)?;

        Ok(TransactionView {
            transaction,
            payload,
        })
    }

    /// Apply a verified processor notification.
    ///
    /// `raw` is the full delivery body; it is stored encrypted with the
    /// transaction. Deliveries for orders that are already terminal change
    /// nothing and are acknowledged with `ignored: true`, so processor retries
    /// are harmless.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the order does not exist
    /// - `Database`/`Crypto` if settlement fails; nothing is committed
    #[instrument(skip(self, payload, raw), fields(order_id = %payload.order_id, event_id = %payload.event_id))]
    pub async fn process_webhook(
        &self,
        payload: &WebhookPayload,
        raw: &serde_json::Value,
    ) -> Result<WebhookAck, AppError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let order = OrderRepository::lock(&mut tx, payload.order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {}", payload.order_id)))?;

        if order.status.is_terminal() {
            info!(status = %order.status, "Webhook for settled order ignored");
            return Ok(WebhookAck {
                order_id: order.id,
                status: order.status,
                ignored: true,
            });
        }

        let event_id = Some(payload.event_id.as_str());
        let mut product = None;
        let (status, reason) = match Settlement::decide(&order, payload, now) {
            Settlement::Expire => (PaymentStatus::Expired, Some("payment window elapsed")),
            Settlement::Fail(reason) => (PaymentStatus::Failed, Some(reason)),
            Settlement::Complete => {
                product = ProductRepository::take_stock(&mut tx, order.product_id).await?;
                if product.is_some() {
                    (PaymentStatus::Completed, None)
                } else {
                    (PaymentStatus::Failed, Some("product sold out"))
                }
            }
        };

        let settled = OrderRepository::finish(&mut tx, order.id, status, event_id, reason)
            .await?
            .ok_or_else(|| AppError::PaymentState("order is no longer pending".to_string()))?;

        if let Some(product) = product.filter(|_| status == PaymentStatus::Completed) {
            self.record_settlement(&mut tx, &settled, &product, payload, raw, now)
                .await?;
        }

        tx.commit().await.map_err(RepositoryError::from)?;

        match status {
            PaymentStatus::Completed => info!("Payment completed"),
            _ => warn!(status = %status, reason = reason.unwrap_or_default(), "Payment not completed"),
        }

        Ok(WebhookAck {
            order_id: settled.id,
            status: settled.status,
            ignored: false,
        })
    }

    /// Store the transaction and grant any subscription for a completed order.
    ///
    /// `product` is the row returned by the stock update on `conn`; nothing
    /// here touches the pool, so the settlement holds a single connection.
    async fn record_settlement(
        &self,
        conn: &mut sqlx::PgConnection,
        order: &PaymentOrder,
        product: &Product,
        payload: &WebhookPayload,
        raw: &serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let id = TransactionId::generate();
        let risk_score = order.risk_score.clamp(0, 100);
        let transaction = Transaction {
            id,
            order_id: order.id,
            discord_user_id: order.discord_user_id.clone(),
            amount: payload.amount,
            currency: payload.currency,
            tx_hash: payload.tx_hash.clone(),
            risk_score,
            risk_level: RiskLevel::from_score(risk_score.unsigned_abs()),
            encrypted_payload: self.cipher.encrypt_json(id, raw)?,
            created_at: now,
        };
        TransactionRepository::insert(conn, &transaction).await?;

        if product.is_subscription() {
            let subscription = SubscriptionRepository::grant(conn, order, product, now).await?;
            info!(
                subscription_id = %subscription.id,
                expires_at = %subscription.expires_at,
                "Subscription granted"
            );
        }

        Ok(())
    }
}

/// Expire overdue orders and deactivate lapsed subscriptions.
///
/// # Errors
///
/// Returns `Database` if either update fails.
pub async fn sweep_expired(pool: &PgPool, now: DateTime<Utc>) -> Result<SweepReport, AppError> {
    let expired_orders = OrderRepository::new(pool).expire_overdue(now).await?;
    let lapsed = SubscriptionRepository::new(pool)
        .deactivate_lapsed(now)
        .await?;

    Ok(SweepReport {
        expired_orders,
        lapsed_subscriptions: lapsed.len(),
    })
}

/// Run [`sweep_expired`] every `interval` until the runtime shuts down.
pub fn spawn_expiry_sweeper(pool: PgPool, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match sweep_expired(&pool, Utc::now()).await {
                Ok(report) if report != SweepReport::default() => info!(
                    expired_orders = report.expired_orders,
                    lapsed_subscriptions = report.lapsed_subscriptions,
                    "Expiry sweep"
                ),
                Ok(_) => {}
                Err(e) => error!(error = %e, "Expiry sweep failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;
    use rust_decimal::Decimal;

    use shopbot_core::{Currency, ProductId};

    use super::*;

    fn order(now: DateTime<Utc>) -> PaymentOrder {
        PaymentOrder {
            id: OrderId::generate(),
            product_id: ProductId::new(1),
            guild_id: DiscordId::from_u64(80_351_110_224_678_912),
            discord_user_id: DiscordId::from_u64(80_351_110_224_678_913),
            amount: Decimal::new(1999, 2),
            currency: Currency::Usdt,
            pay_address: "shopbot-x".to_string(),
            status: PaymentStatus::Pending,
            risk_score: 10,
            provider_reference: None,
            failure_reason: None,
            expires_at: now + ChronoDuration::minutes(30),
            paid_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn payload(order: &PaymentOrder, status: WebhookStatus, amount: Decimal) -> WebhookPayload {
        WebhookPayload {
            event_id: "evt_1".to_string(),
            order_id: order.id,
            status,
            amount,
            currency: order.currency,
            tx_hash: Some("0xabc".to_string()),
        }
    }

    #[test]
    fn test_exact_and_over_payment_complete() {
        let now = Utc::now();
        let o = order(now);
        let exact = payload(&o, WebhookStatus::Confirmed, o.amount);
        assert_eq!(Settlement::decide(&o, &exact, now), Settlement::Complete);
        let over = payload(&o, WebhookStatus::Confirmed, Decimal::new(25, 0));
        assert_eq!(Settlement::decide(&o, &over, now), Settlement::Complete);
    }

    #[test]
    fn test_underpayment_and_currency_mismatch_fail() {
        let now = Utc::now();
        let o = order(now);
        let under = payload(&o, WebhookStatus::Confirmed, Decimal::new(1998, 2));
        assert_eq!(
            Settlement::decide(&o, &under, now),
            Settlement::Fail("underpaid")
        );

        let mut wrong = payload(&o, WebhookStatus::Confirmed, o.amount);
        wrong.currency = Currency::Btc;
        assert_eq!(
            Settlement::decide(&o, &wrong, now),
            Settlement::Fail("currency mismatch")
        );

        // A larger amount does not make up for the wrong currency
        wrong.amount = Decimal::new(1_000, 0);
        assert_eq!(
            Settlement::decide(&o, &wrong, now),
            Settlement::Fail("currency mismatch")
        );
    }

    #[test]
    fn test_processor_failure_fails() {
        let now = Utc::now();
        let o = order(now);
        let failed = payload(&o, WebhookStatus::Failed, o.amount);
        assert_eq!(
            Settlement::decide(&o, &failed, now),
            Settlement::Fail("processor reported failure")
        );
    }

    #[test]
    fn test_late_delivery_expires() {
        let now = Utc::now();
        let o = order(now);
        let late = now + ChronoDuration::minutes(31);
        let p = payload(&o, WebhookStatus::Confirmed, o.amount);
        assert_eq!(Settlement::decide(&o, &p, late), Settlement::Expire);
    }

    #[test]
    fn test_pay_address_is_deterministic() {
        let id = OrderId::generate();
        let a = pay_address("shopbot", id);
        assert_eq!(a, pay_address("shopbot", id));
        assert!(a.starts_with("shopbot-"));
        assert_eq!(a.len(), "shopbot-".len() + 32);
        assert_ne!(a, pay_address("shopbot", OrderId::generate()));
        assert_ne!(a, pay_address("other", id));
    }
}
