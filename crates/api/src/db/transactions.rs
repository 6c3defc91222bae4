//! Settled transaction repository.

use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use shopbot_core::{OrderId, Transaction, TransactionId};

use super::RepositoryError;

const TRANSACTION_COLUMNS: &str = "id, order_id, discord_user_id, amount, currency, tx_hash, \
     risk_score, risk_level, encrypted_payload, created_at";

/// Repository for transaction database operations.
pub struct TransactionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> TransactionRepository<'a> {
    /// Create a new transaction repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store a settled transaction inside the settlement transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the order already has one.
    pub async fn insert(
        conn: &mut PgConnection,
        transaction: &Transaction,
    ) -> Result<Transaction, RepositoryError> {
        sqlx::query_as::<_, Transaction>(&format!(
            "INSERT INTO transactions
                (id, order_id, discord_user_id, amount, currency, tx_hash, risk_score,
                 risk_level, encrypted_payload, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING {TRANSACTION_COLUMNS}"
        ))
        .bind(transaction.id)
        .bind(transaction.order_id)
        .bind(&transaction.discord_user_id)
        .bind(transaction.amount)
        .bind(transaction.currency)
        .bind(&transaction.tx_hash)
        .bind(transaction.risk_score)
        .bind(transaction.risk_level)
        .bind(&transaction.encrypted_payload)
        .bind(transaction.created_at)
        .fetch_one(conn)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "order already settled"))
    }

    /// Get a transaction by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn get_by_id(
        &self,
        id: TransactionId,
    ) -> Result<Option<Transaction>, RepositoryError> {
        let transaction = sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(transaction)
    }

    /// Get the transaction that settled an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn get_by_order(
        &self,
        order_id: OrderId,
    ) -> Result<Option<Transaction>, RepositoryError> {
        let transaction = sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE order_id = $1"
        ))
        .bind(order_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(transaction)
    }
}
