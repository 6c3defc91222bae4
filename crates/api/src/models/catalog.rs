//! Catalog request payloads and their validation rules.

use rust_decimal::Decimal;
use serde::Deserialize;

use shopbot_core::{
    Category, CategoryId, Currency, DiscordId, Money, MoneyError, Product, ValidationErrors,
};

/// Maximum length of names.
pub const NAME_MAX: usize = 100;
/// Maximum length of descriptions.
pub const DESCRIPTION_MAX: usize = 2000;
/// Maximum length of an emoji (custom emoji markup included).
pub const EMOJI_MAX: usize = 64;
/// Longest subscription a product may grant.
pub const DURATION_MAX_DAYS: i32 = 3650;

// =============================================================================
// Categories
// =============================================================================

/// Validated column values for a category insert or update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryFields {
    pub name: String,
    pub description: Option<String>,
    pub emoji: Option<String>,
    pub sort_order: i32,
}

impl CategoryFields {
    /// Check every field, collecting all failures.
    ///
    /// # Errors
    ///
    /// Returns the collected failures when any field is invalid.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.check_text("name", &self.name, NAME_MAX);
        errors.check_optional_text("description", self.description.as_deref(), DESCRIPTION_MAX);
        errors.check_optional_text("emoji", self.emoji.as_deref(), EMOJI_MAX);
        errors.into_result()
    }
}

/// `POST /api/categories`
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCategoryRequest {
    pub guild_id: DiscordId,
    pub name: String,
    pub description: Option<String>,
    pub emoji: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
}

impl CreateCategoryRequest {
    /// Split into guild and validated fields.
    ///
    /// # Errors
    ///
    /// Returns the collected failures when any field is invalid.
    pub fn into_fields(self) -> Result<(DiscordId, CategoryFields), ValidationErrors> {
        let fields = CategoryFields {
            name: self.name.trim().to_owned(),
            description: self.description,
            emoji: self.emoji,
            sort_order: self.sort_order,
        };
        fields.validate()?;
        Ok((self.guild_id, fields))
    }
}

/// `PUT /api/categories/{id}`. Absent fields keep their current value.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateCategoryRequest {
    /// Guild the caller acts for; must own the category.
    pub guild_id: DiscordId,
    pub name: Option<String>,
    pub description: Option<String>,
    pub emoji: Option<String>,
    pub sort_order: Option<i32>,
}

impl UpdateCategoryRequest {
    /// Overlay the changes on `current` and validate the result.
    ///
    /// # Errors
    ///
    /// Returns the collected failures when the merged fields are invalid.
    pub fn merge(self, current: &Category) -> Result<CategoryFields, ValidationErrors> {
        let fields = CategoryFields {
            name: self
                .name
                .map_or_else(|| current.name.clone(), |n| n.trim().to_owned()),
            description: self.description.or_else(|| current.description.clone()),
            emoji: self.emoji.or_else(|| current.emoji.clone()),
            sort_order: self.sort_order.unwrap_or(current.sort_order),
        };
        fields.validate()?;
        Ok(fields)
    }
}

// =============================================================================
// Products
// =============================================================================

/// Validated column values for a product insert or update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductFields {
    pub category_id: Option<CategoryId>,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub currency: Currency,
    pub stock: Option<i32>,
    pub role_id: Option<DiscordId>,
    pub duration_days: Option<i32>,
    pub is_active: bool,
}

impl ProductFields {
    /// Check every field, collecting all failures.
    ///
    /// # Errors
    ///
    /// Returns the collected failures when any field is invalid.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.check_text("name", &self.name, NAME_MAX);
        errors.check_optional_text("description", self.description.as_deref(), DESCRIPTION_MAX);

        if let Err(e) = Money::new(self.price, self.currency) {
            let message = match e {
                MoneyError::NotPositive => "must be greater than zero".to_owned(),
                other => other.to_string(),
            };
            errors.add("price", message);
        }
        if let Some(stock) = self.stock
            && stock < 0
        {
            errors.add("stock", "must not be negative");
        }
        if let Some(days) = self.duration_days {
            errors.check_range(
                "duration_days",
                i64::from(days),
                1,
                i64::from(DURATION_MAX_DAYS),
            );
            if self.role_id.is_none() {
                errors.add("role_id", "is required for subscription products");
            }
        }
        errors.into_result()
    }
}

/// `POST /api/products`
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProductRequest {
    pub guild_id: DiscordId,
    pub category_id: Option<CategoryId>,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub currency: Currency,
    pub stock: Option<i32>,
    pub role_id: Option<DiscordId>,
    pub duration_days: Option<i32>,
}

impl CreateProductRequest {
    /// Split into guild and validated fields.
    ///
    /// # Errors
    ///
    /// Returns the collected failures when any field is invalid.
    pub fn into_fields(self) -> Result<(DiscordId, ProductFields), ValidationErrors> {
        let fields = ProductFields {
            category_id: self.category_id,
            name: self.name.trim().to_owned(),
            description: self.description,
            price: self.price,
            currency: self.currency,
            stock: self.stock,
            role_id: self.role_id,
            duration_days: self.duration_days,
            is_active: true,
        };
        fields.validate()?;
        Ok((self.guild_id, fields))
    }
}

/// `PUT /api/products/{id}`. Absent fields keep their current value.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateProductRequest {
    /// Guild the caller acts for; must own the product.
    pub guild_id: DiscordId,
    pub category_id: Option<CategoryId>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub currency: Option<Currency>,
    pub stock: Option<i32>,
    pub role_id: Option<DiscordId>,
    pub duration_days: Option<i32>,
    pub is_active: Option<bool>,
}

impl UpdateProductRequest {
    /// Overlay the changes on `current` and validate the result.
    ///
    /// # Errors
    ///
    /// Returns the collected failures when the merged fields are invalid.
    pub fn merge(self, current: &Product) -> Result<ProductFields, ValidationErrors> {
        let fields = ProductFields {
            category_id: self.category_id.or(current.category_id),
            name: self
                .name
                .map_or_else(|| current.name.clone(), |n| n.trim().to_owned()),
            description: self.description.or_else(|| current.description.clone()),
            price: self.price.unwrap_or(current.price),
            currency: self.currency.unwrap_or(current.currency),
            stock: self.stock.or(current.stock),
            role_id: self.role_id.or_else(|| current.role_id.clone()),
            duration_days: self.duration_days.or(current.duration_days),
            is_active: self.is_active.unwrap_or(current.is_active),
        };
        fields.validate()?;
        Ok(fields)
    }
}

// =============================================================================
// Listing queries
// =============================================================================

/// Default page size for listings.
pub const DEFAULT_LIMIT: u32 = 20;
/// Largest page size a client may request.
pub const MAX_LIMIT: u32 = 100;

const fn default_page() -> u32 {
    1
}

const fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

/// `GET /api/categories` query string.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryQuery {
    pub guild_id: DiscordId,
}

/// `GET /api/products` query string.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductQuery {
    pub guild_id: DiscordId,
    pub category_id: Option<CategoryId>,
    /// Filter on active flag; defaults to active products only.
    pub active: Option<bool>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

impl ProductQuery {
    /// Check paging bounds.
    ///
    /// # Errors
    ///
    /// Returns the collected failures when `page` or `limit` is out of range.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.page < 1 {
            errors.add("page", "must be at least 1");
        }
        errors.check_range("limit", i64::from(self.limit), 1, i64::from(MAX_LIMIT));
        errors.into_result()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product_request(price: &str) -> CreateProductRequest {
        serde_json::from_value(serde_json::json!({
            "guild_id": "80351110224678912",
            "name": "VIP Role",
            "price": price,
            "currency": "USDT",
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_product() {
        let (guild, fields) = product_request("9.99").into_fields().unwrap();
        assert_eq!(guild.as_str(), "80351110224678912");
        assert!(fields.is_active);
        assert_eq!(fields.price, Decimal::new(999, 2));
    }

    #[test]
    fn test_non_positive_price_rejected() {
        for price in ["0", "-5"] {
            let errors = product_request(price).into_fields().unwrap_err();
            assert_eq!(errors.errors()[0].field, "price");
        }
    }

    #[test]
    fn test_excess_precision_rejected() {
        let errors = product_request("1.001").into_fields().unwrap_err();
        assert_eq!(errors.errors()[0].field, "price");
    }

    #[test]
    fn test_collects_every_failure() {
        let mut request = product_request("0");
        request.name = "   ".to_owned();
        request.stock = Some(-1);
        request.duration_days = Some(0);
        let errors = request.into_fields().unwrap_err();
        let fields: Vec<&str> = errors.errors().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            ["name", "price", "stock", "duration_days", "role_id"]
        );
    }

    #[test]
    fn test_subscription_needs_role() {
        let mut request = product_request("5");
        request.duration_days = Some(30);
        request.role_id = Some(DiscordId::from_u64(80_351_110_224_678_999));
        assert!(request.into_fields().is_ok());
    }

    #[test]
    fn test_category_name_bounds() {
        let request = CreateCategoryRequest {
            guild_id: DiscordId::from_u64(80_351_110_224_678_912),
            name: "x".repeat(NAME_MAX + 1),
            description: None,
            emoji: None,
            sort_order: 0,
        };
        let errors = request.into_fields().unwrap_err();
        assert_eq!(errors.errors()[0].field, "name");
    }

    #[test]
    fn test_product_query_defaults_and_bounds() {
        let query: ProductQuery =
            serde_json::from_value(serde_json::json!({ "guild_id": "80351110224678912" }))
                .unwrap();
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, DEFAULT_LIMIT);
        assert!(query.validate().is_ok());

        let query = ProductQuery {
            page: 0,
            limit: 101,
            ..query
        };
        assert_eq!(query.validate().unwrap_err().errors().len(), 2);
    }
}
