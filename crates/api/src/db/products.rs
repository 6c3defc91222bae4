//! Product repository.

use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::instrument;

use shopbot_core::{CategoryId, DiscordId, Paginated, Product, ProductId};

use super::{RepositoryError, page_offset};
use crate::models::catalog::ProductFields;

const PRODUCT_COLUMNS: &str = "id, guild_id, category_id, name, description, price, currency, \
     stock, role_id, duration_days, is_active, created_at, updated_at";

/// Listing filter for [`ProductRepository::list`].
#[derive(Debug, Clone)]
pub struct ProductFilter {
    pub guild_id: DiscordId,
    pub category_id: Option<CategoryId>,
    pub active: Option<bool>,
    pub page: u32,
    pub limit: u32,
}

impl ProductFilter {
    fn push_where(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        builder.push(" WHERE guild_id = ").push_bind(self.guild_id.clone());
        if let Some(category_id) = self.category_id {
            builder.push(" AND category_id = ").push_bind(category_id);
        }
        if let Some(active) = self.active {
            builder.push(" AND is_active = ").push_bind(active);
        }
    }
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List one page of products matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn list(&self, filter: &ProductFilter) -> Result<Paginated<Product>, RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products");
        filter.push_where(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {PRODUCT_COLUMNS} FROM products"));
        filter.push_where(&mut select);
        select
            .push(" ORDER BY name, id LIMIT ")
            .push_bind(i64::from(filter.limit))
            .push(" OFFSET ")
            .push_bind(page_offset(filter.page, filter.limit));
        let items = select
            .build_query_as::<Product>()
            .fetch_all(self.pool)
            .await?;

        Ok(Paginated {
            items,
            page: filter.page,
            limit: filter.limit,
            total,
        })
    }

    /// Get a product by ID, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(product)
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the category does not exist.
    #[instrument(skip(self, fields), fields(name = %fields.name))]
    pub async fn create(
        &self,
        guild_id: &DiscordId,
        fields: &ProductFields,
    ) -> Result<Product, RepositoryError> {
        sqlx::query_as::<_, Product>(&format!(
            "INSERT INTO products
                (guild_id, category_id, name, description, price, currency, stock, role_id,
                 duration_days, is_active)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(guild_id)
        .bind(fields.category_id)
        .bind(&fields.name)
        .bind(&fields.description)
        .bind(fields.price)
        .bind(fields.currency)
        .bind(fields.stock)
        .bind(&fields.role_id)
        .bind(fields.duration_days)
        .bind(fields.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "category does not exist"))
    }

    /// Replace a product's editable fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    #[instrument(skip(self, fields))]
    pub async fn update(
        &self,
        id: ProductId,
        fields: &ProductFields,
    ) -> Result<Product, RepositoryError> {
        sqlx::query_as::<_, Product>(&format!(
            "UPDATE products
             SET category_id = $2, name = $3, description = $4, price = $5, currency = $6,
                 stock = $7, role_id = $8, duration_days = $9, is_active = $10,
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id)
        .bind(fields.category_id)
        .bind(&fields.name)
        .bind(&fields.description)
        .bind(fields.price)
        .bind(fields.currency)
        .bind(fields.stock)
        .bind(&fields.role_id)
        .bind(fields.duration_days)
        .bind(fields.is_active)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "category does not exist"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// Soft-delete a product so existing orders keep their reference.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    #[instrument(skip(self))]
    pub async fn deactivate(&self, id: ProductId) -> Result<Product, RepositoryError> {
        sqlx::query_as::<_, Product>(&format!(
            "UPDATE products SET is_active = FALSE, updated_at = NOW()
             WHERE id = $1
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Decrement limited stock by one inside a settlement transaction.
    ///
    /// Unlimited products (`stock IS NULL`) are left untouched. Returns the
    /// product as updated on `conn`, or `None` when it is sold out.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn take_stock(
        conn: &mut sqlx::PgConnection,
        id: ProductId,
    ) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "UPDATE products
             SET stock = CASE WHEN stock IS NULL THEN NULL ELSE stock - 1 END,
                 updated_at = NOW()
             WHERE id = $1 AND (stock IS NULL OR stock > 0)
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?;

        Ok(product)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(category_id: Option<CategoryId>, active: Option<bool>) -> ProductFilter {
        ProductFilter {
            guild_id: DiscordId::from_u64(80_351_110_224_678_912),
            category_id,
            active,
            page: 1,
            limit: 20,
        }
    }

    #[test]
    fn test_filter_sql() {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1 FROM products");
        filter(Some(CategoryId::new(3)), Some(true)).push_where(&mut builder);
        assert_eq!(
            builder.sql(),
            "SELECT 1 FROM products WHERE guild_id = $1 AND category_id = $2 AND is_active = $3"
        );

        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1 FROM products");
        filter(None, None).push_where(&mut builder);
        assert_eq!(builder.sql(), "SELECT 1 FROM products WHERE guild_id = $1");
    }
}
