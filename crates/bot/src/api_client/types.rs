//! Request and response bodies exchanged with the backend.

use serde::{Deserialize, Serialize};

use shopbot_core::{DiscordId, PaymentOrder, ProductId, RiskLevel, UserSubscription};

#[derive(Debug, Serialize)]
pub(super) struct CreateOrderBody<'a> {
    pub guild_id: &'a DiscordId,
    pub discord_user_id: &'a DiscordId,
    pub product_id: ProductId,
}

#[derive(Debug, Serialize)]
pub(super) struct CancelOrderBody<'a> {
    pub discord_user_id: &'a DiscordId,
}

/// A freshly created payment order with its risk verdict.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderCreated {
    pub order: PaymentOrder,
    pub risk_score: u32,
    pub risk_level: RiskLevel,
    /// Flagged for manual review; the order is still payable.
    pub review: bool,
}

/// A subscription as listed by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionView {
    #[serde(flatten)]
    pub subscription: UserSubscription,
    pub days_remaining: i64,
}
