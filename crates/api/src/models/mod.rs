//! Request and response payloads.
//!
//! Entities live in `shopbot_core`; this module holds what only the HTTP
//! layer needs: request bodies with their `validate()` rules, query strings
//! and response views.

pub mod catalog;
pub mod payment;

pub use catalog::{
    CategoryQuery, CreateCategoryRequest, CreateProductRequest, ProductQuery,
    UpdateCategoryRequest, UpdateProductRequest,
};
pub use payment::{
    CancelOrderRequest, CreateOrderRequest, OrderCreated, PageQuery, SubscriptionView,
    TransactionView, WebhookAck, WebhookPayload, WebhookStatus,
};
