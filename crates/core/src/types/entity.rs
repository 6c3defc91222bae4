//! Persisted entities shared between the API and the bot.
//!
//! With the `postgres` feature these derive `sqlx::FromRow`, so repositories
//! can `query_as` straight into them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::discord::DiscordId;
use super::id::{CategoryId, OrderId, ProductId, SubscriptionId, TransactionId};
use super::money::{Currency, Money};
use super::status::{PaymentStatus, RiskLevel};

/// A product category scoped to one Discord guild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Category {
    pub id: CategoryId,
    pub guild_id: DiscordId,
    pub name: String,
    pub description: Option<String>,
    pub emoji: Option<String>,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A purchasable item.
///
/// `stock = None` means unlimited. `duration_days = Some(_)` makes the
/// product a subscription that grants `role_id` for that many days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Product {
    pub id: ProductId,
    pub guild_id: DiscordId,
    pub category_id: Option<CategoryId>,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub currency: Currency,
    pub stock: Option<i32>,
    pub role_id: Option<DiscordId>,
    pub duration_days: Option<i32>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Price as validated money.
    #[must_use]
    pub const fn price(&self) -> Money {
        Money {
            amount: self.price,
            currency: self.currency,
        }
    }

    /// Whether at least one unit can be sold.
    #[must_use]
    pub fn in_stock(&self) -> bool {
        self.stock.is_none_or(|s| s > 0)
    }

    /// Whether purchasing grants a time-limited subscription.
    #[must_use]
    pub const fn is_subscription(&self) -> bool {
        self.duration_days.is_some()
    }
}

/// A request to pay for one product, awaiting confirmation from the processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct PaymentOrder {
    pub id: OrderId,
    pub product_id: ProductId,
    pub guild_id: DiscordId,
    pub discord_user_id: DiscordId,
    pub amount: Decimal,
    pub currency: Currency,
    pub pay_address: String,
    pub status: PaymentStatus,
    pub risk_score: i32,
    pub provider_reference: Option<String>,
    pub failure_reason: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentOrder {
    /// Amount owed as money.
    #[must_use]
    pub const fn amount(&self) -> Money {
        Money {
            amount: self.amount,
            currency: self.currency,
        }
    }

    /// Whether the order is still pending but past its deadline.
    #[must_use]
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == PaymentStatus::Pending && now > self.expires_at
    }
}

/// A settled payment. The processor payload is stored encrypted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Transaction {
    pub id: TransactionId,
    pub order_id: OrderId,
    pub discord_user_id: DiscordId,
    pub amount: Decimal,
    pub currency: Currency,
    pub tx_hash: Option<String>,
    pub risk_score: i32,
    pub risk_level: RiskLevel,
    #[serde(skip)]
    pub encrypted_payload: String,
    pub created_at: DateTime<Utc>,
}

/// A time-limited role grant produced by buying a subscription product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct UserSubscription {
    pub id: SubscriptionId,
    pub discord_user_id: DiscordId,
    pub guild_id: DiscordId,
    pub product_id: ProductId,
    pub order_id: OrderId,
    pub role_id: Option<DiscordId>,
    pub starts_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
}

impl UserSubscription {
    /// Days left, rounded down; zero once expired.
    #[must_use]
    pub fn days_remaining(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_days().max(0)
    }
}
