//! Payment order repository.
//!
//! Status changes are guarded in SQL (`WHERE status = 'pending'`) so two
//! concurrent webhook deliveries or a webhook racing the expiry sweep can
//! never move an order out of a terminal state.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use shopbot_core::{Currency, DiscordId, OrderId, Paginated, PaymentOrder, PaymentStatus, ProductId};

use super::{RepositoryError, page_offset};

const ORDER_COLUMNS: &str = "id, product_id, guild_id, discord_user_id, amount, currency, \
     pay_address, status, risk_score, provider_reference, failure_reason, expires_at, paid_at, \
     created_at, updated_at";

/// Values for a new pending order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: OrderId,
    pub product_id: ProductId,
    pub guild_id: DiscordId,
    pub discord_user_id: DiscordId,
    pub amount: Decimal,
    pub currency: Currency,
    pub pay_address: String,
    pub risk_score: i32,
    pub expires_at: DateTime<Utc>,
}

/// Order counts by status, for monitoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, sqlx::FromRow)]
pub struct OrderCounts {
    pub pending: i64,
    pub completed: i64,
    pub expired: i64,
    pub failed: i64,
    pub cancelled: i64,
}

/// Repository for payment order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a pending order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    #[instrument(skip(self, order), fields(order_id = %order.id))]
    pub async fn create(&self, order: &NewOrder) -> Result<PaymentOrder, RepositoryError> {
        let created = sqlx::query_as::<_, PaymentOrder>(&format!(
            "INSERT INTO payment_orders
                (id, product_id, guild_id, discord_user_id, amount, currency, pay_address,
                 status, risk_score, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', $8, $9)
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order.id)
        .bind(order.product_id)
        .bind(&order.guild_id)
        .bind(&order.discord_user_id)
        .bind(order.amount)
        .bind(order.currency)
        .bind(&order.pay_address)
        .bind(order.risk_score)
        .bind(order.expires_at)
        .fetch_one(self.pool)
        .await?;

        Ok(created)
    }

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: OrderId) -> Result<Option<PaymentOrder>, RepositoryError> {
        let order = sqlx::query_as::<_, PaymentOrder>(&format!(
            "SELECT {ORDER_COLUMNS} FROM payment_orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(order)
    }

    /// Lock an order row for the duration of a settlement transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lock(
        conn: &mut PgConnection,
        id: OrderId,
    ) -> Result<Option<PaymentOrder>, RepositoryError> {
        let order = sqlx::query_as::<_, PaymentOrder>(&format!(
            "SELECT {ORDER_COLUMNS} FROM payment_orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?;

        Ok(order)
    }

    /// List a user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn list_by_user(
        &self,
        user: &DiscordId,
        page: u32,
        limit: u32,
    ) -> Result<Paginated<PaymentOrder>, RepositoryError> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM payment_orders WHERE discord_user_id = $1")
                .bind(user)
                .fetch_one(self.pool)
                .await?;

        let items = sqlx::query_as::<_, PaymentOrder>(&format!(
            "SELECT {ORDER_COLUMNS} FROM payment_orders
             WHERE discord_user_id = $1
             ORDER BY created_at DESC
             LIMIT $2 OFFSET $3"
        ))
        .bind(user)
        .bind(i64::from(limit))
        .bind(page_offset(page, limit))
        .fetch_all(self.pool)
        .await?;

        Ok(Paginated {
            items,
            page,
            limit,
            total,
        })
    }

    /// Move a pending order to a terminal status.
    ///
    /// Returns `None` when the order was no longer pending.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn finish(
        conn: &mut PgConnection,
        id: OrderId,
        status: PaymentStatus,
        provider_reference: Option<&str>,
        failure_reason: Option<&str>,
    ) -> Result<Option<PaymentOrder>, RepositoryError> {
        let paid_at = (status == PaymentStatus::Completed).then(Utc::now);
        let order = sqlx::query_as::<_, PaymentOrder>(&format!(
            "UPDATE payment_orders
             SET status = $2,
                 provider_reference = COALESCE($3, provider_reference),
                 failure_reason = $4,
                 paid_at = $5,
                 updated_at = NOW()
             WHERE id = $1 AND status = 'pending'
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .bind(status)
        .bind(provider_reference)
        .bind(failure_reason)
        .bind(paid_at)
        .fetch_optional(conn)
        .await?;

        Ok(order)
    }

    /// Cancel a pending order on behalf of its owner.
    ///
    /// Returns `None` when the order was no longer pending.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    #[instrument(skip(self))]
    pub async fn cancel(&self, id: OrderId) -> Result<Option<PaymentOrder>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        Self::finish(&mut conn, id, PaymentStatus::Cancelled, None, None).await
    }

    /// Mark every overdue pending order expired.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    #[instrument(skip(self))]
    pub async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE payment_orders
             SET status = 'expired', failure_reason = 'payment window elapsed', updated_at = NOW()
             WHERE status = 'pending' AND expires_at < $1",
        )
        .bind(now)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Order counts by status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn counts(&self) -> Result<OrderCounts, RepositoryError> {
        let counts = sqlx::query_as::<_, OrderCounts>(
            "SELECT
                COUNT(*) FILTER (WHERE status = 'pending')   AS pending,
                COUNT(*) FILTER (WHERE status = 'completed') AS completed,
                COUNT(*) FILTER (WHERE status = 'expired')   AS expired,
                COUNT(*) FILTER (WHERE status = 'failed')    AS failed,
                COUNT(*) FILTER (WHERE status = 'cancelled') AS cancelled
             FROM payment_orders",
        )
        .fetch_one(self.pool)
        .await?;

        Ok(counts)
    }
}
