//! Discord event handler.
//!
//! Slash commands open a fresh ephemeral message; component clicks update
//! that message in place. Errors are turned into a short user-facing text
//! instead of failing the interaction.

mod components;

use std::sync::Arc;

use serenity::all::{
    CommandInteraction, Context, CreateInteractionResponse, EventHandler, GuildId, Interaction,
    Ready,
};
use serenity::async_trait;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use shopbot_core::{DiscordId, Product, ProductId};

use crate::api_client::{ApiClient, ApiClientError};
use crate::commands::{self, HELP_TEXT, ShopCommand};
use crate::custom_id::CustomIdError;
use crate::flow::{FlowError, Step};
use crate::render::{self, View};
use crate::session::{PurchaseSession, SessionStore};

/// Failures while handling an interaction.
#[derive(Debug, Error)]
pub enum BotError {
    #[error(transparent)]
    Api(#[from] ApiClientError),
    #[error(transparent)]
    Flow(#[from] FlowError),
    #[error(transparent)]
    CustomId(#[from] CustomIdError),
    #[error("command used outside a server")]
    GuildOnly,
    #[error("{0} not found")]
    NotFound(&'static str),
}

impl BotError {
    /// Text shown to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(e) => e.user_message(),
            Self::Flow(FlowError::NoSession) => {
                "Your session expired. Use `/shop` to start again.".to_string()
            }
            Self::Flow(_) | Self::CustomId(_) => {
                "That button is no longer valid. Use `/shop` to start again.".to_string()
            }
            Self::GuildOnly => "The shop only works inside a server.".to_string(),
            Self::NotFound(what) => format!("That {what} is no longer available."),
        }
    }
}

/// Bot event handler.
pub struct Handler {
    api: Arc<ApiClient>,
    sessions: SessionStore,
    command_guild: Option<GuildId>,
}

impl Handler {
    /// Create a handler. Commands are registered for `command_guild` only
    /// when set, globally otherwise.
    #[must_use]
    pub const fn new(api: Arc<ApiClient>, sessions: SessionStore, command_guild: Option<GuildId>) -> Self {
        Self {
            api,
            sessions,
            command_guild,
        }
    }

    /// Render whatever the session's current step shows.
    async fn render_step(&self, user: &DiscordId, session: &PurchaseSession) -> Result<View, BotError> {
        let view = match session.step {
            Step::Categories => {
                let categories = self.api.list_categories(&session.guild_id).await?;
                render::categories(&categories)
            }
            Step::Products { category } => {
                let page = self.api.list_products(&session.guild_id, category).await?;
                let heading = match category {
                    Some(id) => format!("Products in category #{id}"),
                    None => "All products".to_string(),
                };
                render::products(&page, &heading)
            }
            Step::Product { product, .. } => {
                render::product(&self.guild_product(session, product).await?)
            }
            Step::Confirm { product, .. } => {
                render::confirm(&self.guild_product(session, product).await?)
            }
            Step::Placing { .. } => View::text("Placing your order, one moment."),
            Step::AwaitingPayment { order } => render::order(&self.api.get_order(order, user).await?),
        };
        Ok(view)
    }

    /// Load a product of the session's guild; other guilds' products are
    /// reported as missing.
    async fn guild_product(
        &self,
        session: &PurchaseSession,
        id: ProductId,
    ) -> Result<Product, BotError> {
        let product = self.api.get_product(id).await?;
        if product.guild_id != session.guild_id || !product.is_active {
            return Err(BotError::NotFound("product"));
        }
        Ok(product)
    }

    #[instrument(skip(self, command), fields(command = %command.data.name, user = %command.user.id))]
    async fn run_command(&self, command: &CommandInteraction) -> Result<View, BotError> {
        let user = DiscordId::from_u64(command.user.id.get());
        let guild = command.guild_id.map(|g| DiscordId::from_u64(g.get()));

        let Some(parsed) = ShopCommand::from_interaction(command) else {
            warn!("Unknown command");
            return Ok(View::text(HELP_TEXT));
        };

        match parsed {
            ShopCommand::Shop | ShopCommand::Products { .. } => {
                let guild = guild.ok_or(BotError::GuildOnly)?;
                let step = match parsed {
                    ShopCommand::Products { category } => Step::Products { category },
                    _ => Step::Categories,
                };
                let session = self.sessions.start(user.clone(), guild, step).await;
                self.render_step(&user, &session).await
            }
            ShopCommand::Orders => Ok(render::orders(&self.api.user_orders(&user).await?)),
            ShopCommand::Subscriptions => Ok(render::subscriptions(
                &self.api.user_subscriptions(&user).await?,
            )),
            ShopCommand::Help => Ok(View::text(HELP_TEXT)),
        }
    }

    async fn on_command(&self, ctx: &Context, command: &CommandInteraction) {
        let view = self.run_command(command).await.unwrap_or_else(|e| {
            log_failure(&e);
            View::text(e.user_message())
        });

        let response = CreateInteractionResponse::Message(view.into_message().ephemeral(true));
        if let Err(e) = command.create_response(&ctx.http, response).await {
            error!(error = %e, "Failed to respond to command");
        }
    }
}

fn log_failure(e: &BotError) {
    match e {
        BotError::Api(ApiClientError::Api { status, .. }) if *status < 500 => {
            debug!(error = %e, "Interaction rejected");
        }
        BotError::Api(_) => error!(error = %e, "Backend call failed"),
        _ => debug!(error = %e, "Interaction rejected"),
    }
}

#[async_trait]
impl EventHandler for Handler {
    /// Called when the bot is ready and connected to Discord
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("{} is connected to Discord", ready.user.name);
        commands::register(&ctx, self.command_guild).await;
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command) => self.on_command(&ctx, &command).await,
            Interaction::Component(component) => self.on_component(&ctx, &component).await,
            _ => {}
        }
    }
}
