//! Slash command definitions and registration.

use serenity::all::{
    Command, CommandDataOptionValue, CommandInteraction, CommandOptionType, Context,
    CreateCommand, CreateCommandOption, GuildId,
};
use tracing::{error, info};

use shopbot_core::CategoryId;

/// Slash commands the bot understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShopCommand {
    /// `/shop` - start browsing at the category list.
    Shop,
    /// `/products [category]` - jump straight to a product list.
    Products { category: Option<CategoryId> },
    /// `/orders` - recent orders.
    Orders,
    /// `/subscriptions` - active and past subscriptions.
    Subscriptions,
    /// `/help`
    Help,
}

impl ShopCommand {
    /// Resolve an invoked command by name and option.
    #[must_use]
    pub fn from_parts(name: &str, category: Option<i64>) -> Option<Self> {
        let command = match name {
            "shop" => Self::Shop,
            "products" => Self::Products {
                category: category
                    .and_then(|c| i32::try_from(c).ok())
                    .map(CategoryId::new),
            },
            "orders" => Self::Orders,
            "subscriptions" => Self::Subscriptions,
            "help" => Self::Help,
            _ => return None,
        };
        Some(command)
    }

    /// Resolve a command interaction.
    #[must_use]
    pub fn from_interaction(command: &CommandInteraction) -> Option<Self> {
        let category = command
            .data
            .options
            .iter()
            .find(|o| o.name == "category")
            .and_then(|o| match o.value {
                CommandDataOptionValue::Integer(v) => Some(v),
                _ => None,
            });
        Self::from_parts(&command.data.name, category)
    }
}

/// Help text for `/help`.
pub const HELP_TEXT: &str = "\
**Shop commands**
`/shop` browse categories and buy
`/products [category]` list products
`/orders` your recent orders
`/subscriptions` your subscriptions
`/help` this message";

/// Command definitions sent to Discord.
#[must_use]
pub fn definitions() -> Vec<CreateCommand> {
    vec![
        CreateCommand::new("shop").description("Browse the shop"),
        CreateCommand::new("products")
            .description("List products")
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::Integer,
                    "category",
                    "Only products in this category",
                )
                .required(false),
            ),
        CreateCommand::new("orders").description("Your recent orders"),
        CreateCommand::new("subscriptions").description("Your subscriptions"),
        CreateCommand::new("help").description("How to use the shop"),
    ]
}

/// Register commands for one guild, or globally when `guild` is `None`.
///
/// Guild commands appear immediately; global ones can take up to an hour.
pub async fn register(ctx: &Context, guild: Option<GuildId>) {
    let result = match guild {
        Some(guild_id) => guild_id
            .set_commands(&ctx.http, definitions())
            .await
            .map(|c| c.len()),
        None => Command::set_global_commands(&ctx.http, definitions())
            .await
            .map(|c| c.len()),
    };

    match result {
        Ok(count) => info!(count, guild = ?guild, "Registered slash commands"),
        Err(e) => error!(error = %e, "Failed to register slash commands"),
    }
}
