//! Message content and components for each flow step.
//!
//! Text is built by plain functions so it can be tested without Discord;
//! the component builders only wire custom IDs to buttons and menus.

use serenity::all::{
    ButtonStyle, CreateActionRow, CreateButton, CreateInteractionResponseMessage, CreateSelectMenu,
    CreateSelectMenuKind, CreateSelectMenuOption,
};

use shopbot_core::{Category, Paginated, PaymentOrder, PaymentStatus, Product};

use crate::api_client::{OrderCreated, SubscriptionView};
use crate::custom_id::CustomId;

/// Discord's limit on select option labels and descriptions.
const OPTION_TEXT_MAX: usize = 100;
/// Discord's limit on message content.
const CONTENT_MAX: usize = 2000;

/// A rendered message: content plus component rows.
#[derive(Debug, Default)]
pub struct View {
    pub content: String,
    pub components: Vec<CreateActionRow>,
}

impl View {
    /// Text-only view.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: truncate(&content.into(), CONTENT_MAX),
            components: Vec::new(),
        }
    }

    fn with_row(mut self, row: CreateActionRow) -> Self {
        self.components.push(row);
        self
    }

    /// Build the interaction message. Components are always set so an
    /// update clears the previous step's buttons.
    #[must_use]
    pub fn into_message(self) -> CreateInteractionResponseMessage {
        CreateInteractionResponseMessage::new()
            .content(self.content)
            .components(self.components)
    }
}

/// Cut `s` to at most `max` characters, marking the cut with an ellipsis.
#[must_use]
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn button(id: CustomId, label: &str, style: ButtonStyle) -> CreateButton {
    CreateButton::new(id.to_string()).label(label).style(style)
}

fn nav_row(extra: Vec<CreateButton>, back: bool) -> CreateActionRow {
    let mut buttons = extra;
    if back {
        buttons.push(button(CustomId::Back, "Back", ButtonStyle::Secondary));
    }
    buttons.push(button(CustomId::Cancel, "Cancel", ButtonStyle::Danger));
    CreateActionRow::Buttons(buttons)
}

/// Label of a category in menus and headings.
#[must_use]
pub fn category_label(category: &Category) -> String {
    match category.emoji.as_deref().filter(|e| !e.is_empty()) {
        Some(emoji) => format!("{emoji} {}", category.name),
        None => category.name.clone(),
    }
}

/// Category list.
#[must_use]
pub fn categories(categories: &[Category]) -> View {
    if categories.is_empty() {
        return View::text("This shop has no categories yet.")
            .with_row(nav_row(Vec::new(), false));
    }

    let options = categories
        .iter()
        .map(|c| {
            let option = CreateSelectMenuOption::new(
                truncate(&category_label(c), OPTION_TEXT_MAX),
                c.id.to_string(),
            );
            match c.description.as_deref() {
                Some(d) if !d.is_empty() => option.description(truncate(d, OPTION_TEXT_MAX)),
                _ => option,
            }
        })
        .collect();

    let menu = CreateSelectMenu::new(
        CustomId::CategorySelect.to_string(),
        CreateSelectMenuKind::String { options },
    )
    .placeholder("Choose a category");

    View::text("**Shop** - pick a category")
        .with_row(CreateActionRow::SelectMenu(menu))
        .with_row(nav_row(Vec::new(), false))
}

/// One-line product summary used in menus.
#[must_use]
pub fn product_line(product: &Product) -> String {
    let mut line = format!("{} - {}", product.name, product.price());
    if let Some(days) = product.duration_days {
        line.push_str(&format!(" / {days} days"));
    }
    line
}

/// Product list.
#[must_use]
pub fn products(page: &Paginated<Product>, heading: &str) -> View {
    if page.items.is_empty() {
        return View::text(format!("**{heading}**\nNothing for sale here right now."))
            .with_row(nav_row(Vec::new(), true));
    }

    let options = page
        .items
        .iter()
        .map(|p| {
            CreateSelectMenuOption::new(truncate(&product_line(p), OPTION_TEXT_MAX), p.id.to_string())
        })
        .collect();
    let menu = CreateSelectMenu::new(
        CustomId::ProductSelect.to_string(),
        CreateSelectMenuKind::String { options },
    )
    .placeholder("Choose a product");

    let mut content = format!("**{heading}**");
    if page.has_more() {
        content.push_str(&format!(
            "\nShowing {} of {} products.",
            page.items.len(),
            page.total
        ));
    }
    View::text(content)
        .with_row(CreateActionRow::SelectMenu(menu))
        .with_row(nav_row(Vec::new(), true))
}

/// Product detail text.
#[must_use]
pub fn product_text(product: &Product) -> String {
    let mut text = format!("**{}**\n", product.name);
    if let Some(description) = product.description.as_deref().filter(|d| !d.is_empty()) {
        text.push_str(description);
        text.push('\n');
    }
    text.push_str(&format!("Price: {}\n", product.price()));
    match product.duration_days {
        Some(days) => text.push_str(&format!("Access: {days} days\n")),
        None => text.push_str("Access: one-off purchase\n"),
    }
    if let Some(stock) = product.stock {
        text.push_str(&format!("In stock: {stock}\n"));
    }
    text
}

/// Product detail with a Buy button.
#[must_use]
pub fn product(product: &Product) -> View {
    let buy = if product.in_stock() {
        vec![button(CustomId::Buy(product.id), "Buy", ButtonStyle::Success)]
    } else {
        Vec::new()
    };
    let mut content = product_text(product);
    if !product.in_stock() {
        content.push_str("**Sold out**");
    }
    View::text(content).with_row(nav_row(buy, true))
}

/// Order summary awaiting confirmation.
#[must_use]
pub fn confirm(product: &Product) -> View {
    let content = format!(
        "**Confirm your order**\n{}\nYou will get payment instructions after confirming.",
        product_line(product)
    );
    let confirm = button(CustomId::Confirm(product.id), "Confirm", ButtonStyle::Success);
    View::text(content).with_row(nav_row(vec![confirm], true))
}

/// Payment instructions and current status of an order.
#[must_use]
pub fn order_text(order: &PaymentOrder) -> String {
    let mut text = format!(
        "**Order {}**\nAmount: {}\nStatus: {}\n",
        order.id.short(),
        order.amount(),
        order.status
    );
    match order.status {
        PaymentStatus::Pending => text.push_str(&format!(
            "Pay to: `{}`\nExpires <t:{}:R>\n",
            order.pay_address,
            order.expires_at.timestamp()
        )),
        PaymentStatus::Completed => text.push_str("Payment received. Thank you!\n"),
        PaymentStatus::Failed => {
            if let Some(reason) = order.failure_reason.as_deref() {
                text.push_str(&format!("Reason: {reason}\n"));
            }
        }
        PaymentStatus::Expired | PaymentStatus::Cancelled => {}
    }
    text
}

/// Freshly placed order.
#[must_use]
pub fn order_created(created: &OrderCreated) -> View {
    let mut content = order_text(&created.order);
    if created.review {
        content.push_str("This order was flagged for review and may take longer to complete.\n");
    }
    order_view(content, &created.order)
}

/// Order status, refreshable while pending.
#[must_use]
pub fn order(order: &PaymentOrder) -> View {
    order_view(order_text(order), order)
}

fn order_view(content: String, order: &PaymentOrder) -> View {
    let view = View::text(content);
    if order.status.is_terminal() {
        return view;
    }
    let refresh = button(CustomId::Status(order.id), "Check status", ButtonStyle::Primary);
    view.with_row(nav_row(vec![refresh], false))
}

/// Order history.
#[must_use]
pub fn orders(page: &Paginated<PaymentOrder>) -> View {
    if page.items.is_empty() {
        return View::text("You have no orders yet. Use `/shop` to browse.");
    }
    let mut content = String::from("**Your orders**\n");
    for order in &page.items {
        content.push_str(&format!(
            "`{}` {} - {} ({})\n",
            order.id.short(),
            order.created_at.format("%Y-%m-%d"),
            order.amount(),
            order.status
        ));
    }
    View::text(content)
}

/// Subscription list.
#[must_use]
pub fn subscriptions(subscriptions: &[SubscriptionView]) -> View {
    if subscriptions.is_empty() {
        return View::text("You have no subscriptions.");
    }
    let mut content = String::from("**Your subscriptions**\n");
    for view in subscriptions {
        let sub = &view.subscription;
        let state = if sub.is_active && view.days_remaining > 0 {
            format!("{} days left", view.days_remaining)
        } else {
            "expired".to_string()
        };
        content.push_str(&format!(
            "Product #{} - until {} ({state})\n",
            sub.product_id,
            sub.expires_at.format("%Y-%m-%d")
        ));
    }
    View::text(content)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use shopbot_core::{CategoryId, Currency, DiscordId, OrderId, ProductId};

    fn guild() -> DiscordId {
        DiscordId::parse("81384788765712384").unwrap()
    }

    fn sample_product() -> Product {
        Product {
            id: ProductId::new(5),
            guild_id: guild(),
            category_id: Some(CategoryId::new(1)),
            name: "VIP".to_string(),
            description: Some("VIP role".to_string()),
            price: Decimal::new(1999, 2),
            currency: Currency::Usdt,
            stock: None,
            role_id: None,
            duration_days: Some(30),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn sample_order(status: PaymentStatus) -> PaymentOrder {
        PaymentOrder {
            id: OrderId::generate(),
            product_id: ProductId::new(5),
            guild_id: guild(),
            discord_user_id: DiscordId::parse("80351110224678912").unwrap(),
            amount: Decimal::new(1999, 2),
            currency: Currency::Usdt,
            pay_address: "shopbot-abc".to_string(),
            status,
            risk_score: 0,
            provider_reference: None,
            failure_reason: Some("product sold out".to_string()),
            expires_at: Utc::now() + Duration::minutes(30),
            paid_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        let cut = truncate(&"x".repeat(150), OPTION_TEXT_MAX);
        assert_eq!(cut.chars().count(), OPTION_TEXT_MAX);
        assert!(cut.ends_with('…'));
    }

    #[test]
    fn test_product_text() {
        let text = product_text(&sample_product());
        assert!(text.contains("**VIP**"));
        assert!(text.contains("19.99 USDT"));
        assert!(text.contains("30 days"));
        assert!(!text.contains("In stock"));
    }

    #[test]
    fn test_product_line() {
        assert_eq!(product_line(&sample_product()), "VIP - 19.99 USDT / 30 days");
    }

    #[test]
    fn test_pending_order_shows_pay_address() {
        let text = order_text(&sample_order(PaymentStatus::Pending));
        assert!(text.contains("`shopbot-abc`"));
        assert!(text.contains("<t:"));
        assert!(!text.contains("Reason"));
    }

    #[test]
    fn test_failed_order_shows_reason() {
        let text = order_text(&sample_order(PaymentStatus::Failed));
        assert!(text.contains("Reason: product sold out"));
        assert!(!text.contains("Pay to"));
    }

    #[test]
    fn test_terminal_orders_have_no_buttons() {
        assert!(order(&sample_order(PaymentStatus::Completed)).components.is_empty());
        assert_eq!(order(&sample_order(PaymentStatus::Pending)).components.len(), 1);
    }

    #[test]
    fn test_category_label() {
        let mut category = Category {
            id: CategoryId::new(1),
            guild_id: guild(),
            name: "Roles".to_string(),
            description: None,
            emoji: Some("🎭".to_string()),
            sort_order: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(category_label(&category), "🎭 Roles");
        category.emoji = None;
        assert_eq!(category_label(&category), "Roles");
    }
}
