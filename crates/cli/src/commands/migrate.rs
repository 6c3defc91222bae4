//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! shopbot-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `API_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! Migrations live in `crates/api/migrations/` and are embedded at compile
//! time. The API never migrates on startup; run this before deploying.

use thiserror::Error;

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Apply every pending migration.
///
/// # Errors
///
/// Returns `MigrationError` if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), MigrationError> {
    dotenvy::dotenv().ok();

    let database_url =
        super::database_url().ok_or(MigrationError::MissingEnvVar("API_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    let pool = shopbot_api::db::create_pool(&database_url).await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../api/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
