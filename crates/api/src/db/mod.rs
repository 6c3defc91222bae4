//! Database operations for the shop `PostgreSQL`.
//!
//! ## Tables
//!
//! - `categories` - Per-guild product groupings
//! - `products` - Purchasable items (soft-deleted via `is_active`)
//! - `payment_orders` - Pending and settled payment requests
//! - `transactions` - Settled payments with encrypted processor payloads
//! - `user_subscriptions` - Time-limited role grants
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p shopbot-cli -- migrate
//! ```

pub mod categories;
pub mod orders;
pub mod products;
pub mod subscriptions;
pub mod transactions;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use categories::CategoryRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use subscriptions::SubscriptionRepository;
pub use transactions::TransactionRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate category name).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map unique and foreign-key violations to [`RepositoryError::Conflict`].
    pub(crate) fn from_constraint(e: sqlx::Error, message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e
            && (db_err.is_unique_violation() || db_err.is_foreign_key_violation())
        {
            return Self::Conflict(message.to_owned());
        }
        Self::Database(e)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Offset for a 1-based page.
pub(crate) fn page_offset(page: u32, limit: u32) -> i64 {
    i64::from(page.saturating_sub(1)) * i64::from(limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_offset() {
        assert_eq!(page_offset(1, 20), 0);
        assert_eq!(page_offset(3, 20), 40);
        assert_eq!(page_offset(0, 20), 0);
    }

    #[test]
    fn test_non_database_errors_pass_through() {
        let err = RepositoryError::from_constraint(sqlx::Error::RowNotFound, "dup");
        assert!(matches!(err, RepositoryError::Database(_)));
    }
}
