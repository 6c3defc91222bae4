//! Business logic services for the API.
//!
//! # Services
//!
//! - `payments` - Order creation, settlement, cancellation and expiry
//! - `webhook` - Payment processor signature verification

pub mod payments;
pub mod webhook;

pub use payments::{PaymentService, Settlement, SweepReport, spawn_expiry_sweeper, sweep_expired};
pub use webhook::{WebhookError, WebhookVerifier};
