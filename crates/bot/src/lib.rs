//! Shopbot Discord client.
//!
//! Drives the purchase flow from slash commands and message components,
//! talking to the backend API with a service token.
//!
//! # Modules
//!
//! - [`config`] - Environment configuration
//! - [`api_client`] - Typed backend client with cached service tokens
//! - [`session`] - Per-user purchase sessions with an idle TTL
//! - [`flow`] - Pure purchase flow state machine
//! - [`custom_id`] - Component custom ID encoding
//! - [`commands`] - Slash command definitions
//! - [`render`] - Message content and components
//! - [`handler`] - Serenity event handler

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api_client;
pub mod commands;
pub mod config;
pub mod custom_id;
pub mod flow;
pub mod handler;
pub mod render;
pub mod session;
