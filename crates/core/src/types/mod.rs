//! Core types for Shopbot.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod api;
pub mod discord;
pub mod entity;
pub mod id;
pub mod money;
pub mod status;
pub mod validation;

pub use api::{ApiError, ApiResponse, Paginated};
pub use discord::{DiscordId, DiscordIdError};
pub use entity::{Category, PaymentOrder, Product, Transaction, UserSubscription};
pub use id::*;
pub use money::{Currency, Money, MoneyError};
pub use status::*;
pub use validation::{FieldError, ValidationErrors};
