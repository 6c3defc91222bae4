//! Shopbot CLI - migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! shopbot-cli migrate
//!
//! # Mint a service token for manual API calls
//! shopbot-cli token --subject ops --ttl 3600
//!
//! # Seed a guild's categories
//! shopbot-cli seed categories --guild 81384788765712384 --file categories.yaml
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `token` - Mint a service JWT
//! - `seed categories` - Insert categories from YAML

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "shopbot-cli")]
#[command(author, version, about = "Shopbot CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Mint a service token for the API
    Token {
        /// Token subject (calling service name)
        #[arg(short, long)]
        subject: String,

        /// Lifetime in seconds
        #[arg(short, long, default_value_t = 3600)]
        ttl: i64,
    },
    /// Seed data
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Insert categories for a guild from a YAML file
    Categories {
        /// Discord guild ID
        #[arg(short, long)]
        guild: String,

        /// Path to the YAML file
        #[arg(short, long)]
        file: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Token { subject, ttl } => commands::token::mint(&subject, ttl)?,
        Commands::Seed { target } => match target {
            SeedTarget::Categories { guild, file } => {
                commands::seed::categories(&guild, &file).await?;
            }
        },
    }
    Ok(())
}
