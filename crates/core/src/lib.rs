//! Shopbot Core - Shared types library.
//!
//! This crate provides common types used across all Shopbot components:
//! - `api` - REST backend (catalog, payments, webhooks, monitoring)
//! - `bot` - Discord client driving the purchase flow
//! - `cli` - Command-line tools for migrations and management
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, money, Discord snowflakes, statuses, entities,
//!   the API envelope and validation errors
//! - `auth` - Service-to-service JWTs (feature `jwt`)

#![cfg_attr(not(test), forbid(unsafe_code))]

#[cfg(feature = "jwt")]
pub mod auth;
pub mod types;

pub use types::*;
