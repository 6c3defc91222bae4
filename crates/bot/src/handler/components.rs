//! Component (select menu and button) interactions.

use serenity::all::{
    ComponentInteraction, ComponentInteractionDataKind, Context, CreateInteractionResponse,
};
use tracing::{debug, error, info, instrument, warn};

use shopbot_core::{DiscordId, OrderId, ProductId};

use super::{BotError, Handler, log_failure};
use crate::custom_id::{CustomId, CustomIdError};
use crate::flow::{Action, Step};
use crate::render::{self, View};

/// First value picked in a string select menu.
fn selected_value(component: &ComponentInteraction) -> Option<&str> {
    match &component.data.kind {
        ComponentInteractionDataKind::StringSelect { values } => {
            values.first().map(String::as_str)
        }
        _ => None,
    }
}

fn parse_value<T: std::str::FromStr>(
    component: &ComponentInteraction,
    custom_id: &str,
) -> Result<T, BotError> {
    selected_value(component)
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| CustomIdError::Malformed(custom_id.to_string()).into())
}

impl Handler {
    #[instrument(skip(self, component), fields(user = %component.user.id))]
    async fn run_component(
        &self,
        component: &ComponentInteraction,
        id: CustomId,
    ) -> Result<View, BotError> {
        let user = DiscordId::from_u64(component.user.id.get());
        let raw = component.data.custom_id.as_str();

        let action = match id {
            CustomId::CategorySelect => Action::SelectCategory(parse_value(component, raw)?),
            CustomId::ProductSelect => Action::SelectProduct(parse_value(component, raw)?),
            CustomId::Buy(product) => Action::Buy(product),
            CustomId::Back => Action::Back,
            CustomId::Confirm(product) => return self.confirm(&user, product).await,
            CustomId::Cancel => return self.cancel(&user).await,
            CustomId::Status(order) => return self.status(&user, order).await,
        };

        let session = self.sessions.advance(&user, action).await?;
        self.render_step(&user, &session).await
    }

    /// Place the order for the product awaiting confirmation.
    async fn confirm(
        &self,
        user: &DiscordId,
        product: ProductId,
    ) -> Result<View, BotError> {
        // Claims the confirmation; a repeated click fails here
        let session = self
            .sessions
            .advance(user, Action::PlaceOrder(product))
            .await?;

        let created = match self
            .api
            .create_order(&session.guild_id, user, product)
            .await
        {
            Ok(created) => created,
            Err(e) => {
                // Let the user retry from the summary
                let _ = self.sessions.advance(user, Action::OrderFailed).await;
                return Err(e.into());
            }
        };
        info!(
            order_id = %created.order.id,
            risk_score = created.risk_score,
            review = created.review,
            "Order placed"
        );

        let placed = Action::OrderPlaced {
            product,
            order: created.order.id,
        };
        if let Err(e) = self.sessions.advance(user, placed).await {
            // Cancelled or expired meanwhile; the order stays pending and expires
            warn!(order_id = %created.order.id, error = %e, "Session gone after order was placed");
        }
        Ok(render::order_created(&created))
    }

    /// End the flow, cancelling a placed order that is still pending.
    async fn cancel(&self, user: &DiscordId) -> Result<View, BotError> {
        let Some(session) = self.sessions.end(user).await else {
            return Ok(View::text("Nothing to cancel."));
        };

        if let Step::AwaitingPayment { order } = session.step {
            let cancelled = self.api.cancel_order(order, user).await?;
            info!(order_id = %order, "Order cancelled by user");
            return Ok(render::order(&cancelled));
        }
        Ok(View::text("Purchase cancelled."))
    }

    /// Refresh an order; the session ends once the order is settled.
    async fn status(
        &self,
        user: &DiscordId,
        order: OrderId,
    ) -> Result<View, BotError> {
        let order = self.api.get_order(order, user).await?;
        if order.status.is_terminal() {
            debug!(order_id = %order.id, status = %order.status, "Order settled, ending session");
            self.sessions.end(user).await;
        }
        Ok(render::order(&order))
    }

    pub(super) async fn on_component(&self, ctx: &Context, component: &ComponentInteraction) {
        let id = match component.data.custom_id.parse::<CustomId>() {
            Ok(id) => id,
            // Components of other features share the gateway; not ours to answer.
            Err(CustomIdError::UnknownPrefix(_)) => return,
            Err(e) => {
                respond(ctx, component, View::text(BotError::from(e).user_message())).await;
                return;
            }
        };

        let view = self.run_component(component, id).await.unwrap_or_else(|e| {
            log_failure(&e);
            View::text(e.user_message())
        });
        respond(ctx, component, view).await;
    }
}

async fn respond(ctx: &Context, component: &ComponentInteraction, view: View) {
    let response = CreateInteractionResponse::UpdateMessage(view.into_message());
    if let Err(e) = component.create_response(&ctx.http, response).await {
        error!(error = %e, "Failed to respond to component");
    }
}
