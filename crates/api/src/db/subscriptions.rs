//! User subscription repository.

use chrono::{DateTime, Duration, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use shopbot_core::{DiscordId, PaymentOrder, Product, UserSubscription};

use super::RepositoryError;

const SUBSCRIPTION_COLUMNS: &str =
    "id, discord_user_id, guild_id, product_id, order_id, role_id, starts_at, expires_at, is_active";

/// New expiry when a purchase extends a subscription.
///
/// Time still remaining on an active subscription is kept; a lapsed one
/// restarts from `now`.
#[must_use]
pub fn extended_expiry(current: DateTime<Utc>, now: DateTime<Utc>, days: i32) -> DateTime<Utc> {
    current.max(now) + Duration::days(i64::from(days))
}

/// Repository for subscription database operations.
pub struct SubscriptionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SubscriptionRepository<'a> {
    /// Create a new subscription repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Grant or extend the subscription bought by `order`.
    ///
    /// Runs inside the settlement transaction. One active subscription exists
    /// per user and product; buying again extends it. After a lapse a new row
    /// is inserted and the inactive one is left as history.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if the product carries no
    /// duration.
    pub async fn grant(
        conn: &mut PgConnection,
        order: &PaymentOrder,
        product: &Product,
        now: DateTime<Utc>,
    ) -> Result<UserSubscription, RepositoryError> {
        let days = product.duration_days.ok_or_else(|| {
            RepositoryError::DataCorruption(format!("product {} has no duration", product.id))
        })?;

        let existing = sqlx::query_as::<_, UserSubscription>(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM user_subscriptions
             WHERE discord_user_id = $1 AND product_id = $2 AND is_active
             FOR UPDATE"
        ))
        .bind(&order.discord_user_id)
        .bind(product.id)
        .fetch_optional(&mut *conn)
        .await?;

        let subscription = if let Some(current) = existing {
            sqlx::query_as::<_, UserSubscription>(&format!(
                "UPDATE user_subscriptions
                 SET expires_at = $2, order_id = $3, role_id = $4
                 WHERE id = $1
                 RETURNING {SUBSCRIPTION_COLUMNS}"
            ))
            .bind(current.id)
            .bind(extended_expiry(current.expires_at, now, days))
            .bind(order.id)
            .bind(&product.role_id)
            .fetch_one(&mut *conn)
            .await?
        } else {
            sqlx::query_as::<_, UserSubscription>(&format!(
                "INSERT INTO user_subscriptions
                    (discord_user_id, guild_id, product_id, order_id, role_id, starts_at,
                     expires_at, is_active)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE)
                 RETURNING {SUBSCRIPTION_COLUMNS}"
            ))
            .bind(&order.discord_user_id)
            .bind(&order.guild_id)
            .bind(product.id)
            .bind(order.id)
            .bind(&product.role_id)
            .bind(now)
            .bind(extended_expiry(now, now, days))
            .fetch_one(&mut *conn)
            .await?
        };

        Ok(subscription)
    }

    /// List a user's subscriptions, active first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list_by_user(
        &self,
        user: &DiscordId,
    ) -> Result<Vec<UserSubscription>, RepositoryError> {
        let subscriptions = sqlx::query_as::<_, UserSubscription>(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM user_subscriptions
             WHERE discord_user_id = $1
             ORDER BY is_active DESC, expires_at DESC"
        ))
        .bind(user)
        .fetch_all(self.pool)
        .await?;

        Ok(subscriptions)
    }

    /// Deactivate subscriptions whose expiry has passed.
    ///
    /// Returns the deactivated rows so their roles can be revoked.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    #[instrument(skip(self))]
    pub async fn deactivate_lapsed(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<UserSubscription>, RepositoryError> {
        let lapsed = sqlx::query_as::<_, UserSubscription>(&format!(
            "UPDATE user_subscriptions
             SET is_active = FALSE
             WHERE is_active AND expires_at <= $1
             RETURNING {SUBSCRIPTION_COLUMNS}"
        ))
        .bind(now)
        .fetch_all(self.pool)
        .await?;

        Ok(lapsed)
    }
}
