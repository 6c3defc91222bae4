//! Shopbot Discord bot.
//!
//! Connects to the Discord gateway and serves the shop's slash commands.
//! All catalog and payment state lives in the backend API.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use secrecy::ExposeSecret;
use serenity::all::{Client, GatewayIntents, GuildId};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shopbot_bot::api_client::{ApiClient, TokenCache};
use shopbot_bot::config::BotConfig;
use shopbot_bot::handler::Handler;
use shopbot_bot::session::SessionStore;

#[tokio::main]
async fn main() {
    let config = BotConfig::from_env().expect("Failed to load configuration");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "shopbot_bot=info,serenity=warn".into());
    let json_layer = config
        .log_json
        .then(|| tracing_subscriber::fmt::layer().json().flatten_event(true));
    let text_layer = (!config.log_json).then(tracing_subscriber::fmt::layer);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .init();

    let tokens = TokenCache::new(&config.service_jwt_secret, config.service_name.clone());
    let api = ApiClient::new(&config.api_base_url, tokens).expect("Failed to build API client");
    tracing::info!(api = %config.api_base_url, "Backend API configured");

    let handler = Handler::new(
        Arc::new(api),
        SessionStore::new(config.session_ttl),
        config.guild_id.map(GuildId::new),
    );

    // Slash commands and components arrive as interactions; no privileged intents needed
    let intents = GatewayIntents::GUILDS;
    let mut client = Client::builder(config.discord_token.expose_secret(), intents)
        .event_handler(handler)
        .await
        .expect("Error creating Discord client");

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        shard_manager.shutdown_all().await;
    });

    tracing::info!("Starting Discord bot...");
    if let Err(e) = client.start().await {
        tracing::error!(error = %e, "Discord client stopped with an error");
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, disconnecting");
}
