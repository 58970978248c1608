//! Product catalog.

use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::RepositoryError;
use crate::domain::aggregates::Product;
use crate::domain::value_objects::Money;

pub struct NewProduct<'a> {
    pub store_id: Uuid,
    pub name: &'a str,
    pub category: Option<&'a str>,
    pub price: Money,
    pub stock: i32,
    pub images: &'a [String],
}

#[derive(Debug, Default)]
pub struct ProductFilter<'a> {
    pub store_id: Option<Uuid>,
    pub category: Option<&'a str>,
    pub limit: i64,
    pub offset: i64,
}

/// Stock levels returned by a name lookup.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StockLevel {
    pub id: Uuid,
    pub store_id: Uuid,
    pub name: String,
    pub stock: i32,
}

impl StockLevel {
    pub fn label(&self) -> String {
        if self.stock == 0 { "low stock".to_string() } else { self.stock.to_string() }
    }
}

pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new: NewProduct<'_>) -> Result<Product, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(
            "INSERT INTO products (id, store_id, name, category, price, stock, images) VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(new.store_id)
        .bind(new.name)
        .bind(new.category)
        .bind(new.price)
        .bind(new.stock)
        .bind(new.images)
        .fetch_one(self.pool)
        .await?;
        Ok(product)
    }

    pub async fn get(&self, id: Uuid) -> Result<Product, RepositoryError> {
        sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound("Product"))
    }

    pub async fn list(&self, filter: &ProductFilter<'_>) -> Result<Vec<Product>, RepositoryError> {
        let products = sqlx::query_as::<_, Product>(
            "SELECT * FROM products
             WHERE ($1::uuid IS NULL OR store_id = $1) AND ($2::text IS NULL OR category = $2)
             ORDER BY created_at DESC LIMIT $3 OFFSET $4",
        )
        .bind(filter.store_id)
        .bind(filter.category)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(self.pool)
        .await?;
        Ok(products)
    }

    /// Case-insensitive lookup of every product with this name.
    pub async fn stock_by_name(&self, name: &str) -> Result<Vec<StockLevel>, RepositoryError> {
        let levels = sqlx::query_as::<_, StockLevel>("SELECT id, store_id, name, stock FROM products WHERE LOWER(name) = LOWER($1)")
            .bind(name)
            .fetch_all(self.pool)
            .await?;
        if levels.is_empty() {
            return Err(RepositoryError::NotFound("Product"));
        }
        Ok(levels)
    }

    /// Sets absolute stock on a product.
    pub async fn set_stock(&self, id: Uuid, stock: i32) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut product = lock(&mut tx, id).await?;
        product.set_stock(stock)?;
        sqlx::query("UPDATE products SET stock = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(product.stock)
            .bind(product.updated_at)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(product)
    }
}

/// Loads a product row under `FOR UPDATE`.
pub(crate) async fn lock(conn: &mut PgConnection, id: Uuid) -> Result<Product, RepositoryError> {
    sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or(RepositoryError::NotFound("Product"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_label() {
        let mut level = StockLevel { id: Uuid::nil(), store_id: Uuid::nil(), name: "Keyboard".into(), stock: 0 };
        assert_eq!(level.label(), "low stock");
        level.stock = 12;
        assert_eq!(level.label(), "12");
    }
}
