//! Category repository.

use sqlx::PgPool;
use tracing::instrument;

use shopbot_core::{Category, CategoryId, DiscordId};

use super::RepositoryError;
use crate::models::catalog::CategoryFields;

const CATEGORY_COLUMNS: &str =
    "id, guild_id, name, description, emoji, sort_order, created_at, updated_at";

/// Repository for category database operations.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    /// Create a new category repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a guild's categories in display order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list_by_guild(&self, guild_id: &DiscordId) -> Result<Vec<Category>, RepositoryError> {
        let categories = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE guild_id = $1 ORDER BY sort_order, name"
        ))
        .bind(guild_id)
        .fetch_all(self.pool)
        .await?;

        Ok(categories)
    }

    /// Get a category by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        let category = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(category)
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the guild already has a category
    /// with this name.
    #[instrument(skip(self, fields), fields(name = %fields.name))]
    pub async fn create(
        &self,
        guild_id: &DiscordId,
        fields: &CategoryFields,
    ) -> Result<Category, RepositoryError> {
        sqlx::query_as::<_, Category>(&format!(
            "INSERT INTO categories (guild_id, name, description, emoji, sort_order)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(guild_id)
        .bind(&fields.name)
        .bind(&fields.description)
        .bind(&fields.emoji)
        .bind(fields.sort_order)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "category name already exists"))
    }

    /// Replace a category's editable fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    /// Returns `RepositoryError::Conflict` on a duplicate name.
    #[instrument(skip(self, fields))]
    pub async fn update(
        &self,
        id: CategoryId,
        fields: &CategoryFields,
    ) -> Result<Category, RepositoryError> {
        sqlx::query_as::<_, Category>(&format!(
            "UPDATE categories
             SET name = $2, description = $3, emoji = $4, sort_order = $5, updated_at = NOW()
             WHERE id = $1
             RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(id)
        .bind(&fields.name)
        .bind(&fields.description)
        .bind(&fields.emoji)
        .bind(fields.sort_order)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "category name already exists"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a category that no product references.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if any product (active or not)
    /// still belongs to the category.
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let referenced: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM products WHERE category_id = $1)")
                .bind(id)
                .fetch_one(self.pool)
                .await?;
        if referenced {
            return Err(RepositoryError::Conflict(
                "category still has products".to_owned(),
            ));
        }

        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| RepositoryError::from_constraint(e, "category still has products"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
