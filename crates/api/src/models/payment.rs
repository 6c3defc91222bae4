//! Payment request and response payloads.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shopbot_core::{
    Currency, DiscordId, OrderId, PaymentOrder, ProductId, RiskLevel, Transaction,
    UserSubscription, ValidationErrors,
};

use super::catalog::{DEFAULT_LIMIT, MAX_LIMIT};

/// Longest processor event ID or transaction hash accepted.
pub const REFERENCE_MAX: usize = 256;

/// `POST /api/payments/orders`
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub guild_id: DiscordId,
    pub discord_user_id: DiscordId,
    pub product_id: ProductId,
}

/// `POST /api/payments/orders/{id}/cancel`
#[derive(Debug, Clone, Deserialize)]
pub struct CancelOrderRequest {
    pub discord_user_id: DiscordId,
}

/// Response to order creation.
#[derive(Debug, Clone, Serialize)]
pub struct OrderCreated {
    pub order: PaymentOrder,
    pub risk_score: u32,
    pub risk_level: RiskLevel,
    /// The attempt scored above the review threshold.
    pub review: bool,
}

/// A settled transaction with its processor payload decrypted.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionView {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub payload: serde_json::Value,
}

/// A subscription plus derived fields for display.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionView {
    #[serde(flatten)]
    pub subscription: UserSubscription,
    pub days_remaining: i64,
}

/// Paging for per-user listings.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

const fn default_page() -> u32 {
    1
}

const fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
        }
    }
}

impl PageQuery {
    /// Validate page bounds.
    ///
    /// # Errors
    ///
    /// Returns every out-of-range field.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.page < 1 {
            errors.add("page", "must be at least 1");
        }
        errors.check_range("limit", i64::from(self.limit), 1, i64::from(MAX_LIMIT));
        errors.into_result()
    }
}

/// Outcome the processor reports for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookStatus {
    Confirmed,
    Failed,
}

/// Normalised processor notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// Processor-side event ID; stored as the order's provider reference.
    pub event_id: String,
    pub order_id: OrderId,
    pub status: WebhookStatus,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub currency: Currency,
    #[serde(default)]
    pub tx_hash: Option<String>,
}

impl WebhookPayload {
    /// Check reference lengths and a non-negative amount.
    ///
    /// # Errors
    ///
    /// Returns every invalid field.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.check_text("event_id", &self.event_id, REFERENCE_MAX);
        errors.check_optional_text("tx_hash", self.tx_hash.as_deref(), REFERENCE_MAX);
        if self.amount.is_sign_negative() {
            errors.add("amount", "must not be negative");
        }
        errors.into_result()
    }
}

/// Response to a webhook delivery.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAck {
    pub order_id: OrderId,
    pub status: shopbot_core::PaymentStatus,
    /// The order was already terminal; nothing changed.
    pub ignored: bool,
}
