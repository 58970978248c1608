//! Stores and their ownership.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::RepositoryError;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Store {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub struct StoreRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StoreRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, seller_id: Uuid, name: &str, address: Option<&str>) -> Result<Store, RepositoryError> {
        let store = sqlx::query_as::<_, Store>("INSERT INTO stores (id, seller_id, name, address) VALUES ($1, $2, $3, $4) RETURNING *")
            .bind(Uuid::now_v7())
            .bind(seller_id)
            .bind(name)
            .bind(address)
            .fetch_one(self.pool)
            .await?;
        Ok(store)
    }

    pub async fn get(&self, id: Uuid) -> Result<Store, RepositoryError> {
        sqlx::query_as::<_, Store>("SELECT * FROM stores WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound("Store"))
    }

    /// The store, if `seller_id` owns it.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown store, `Forbidden` when another seller owns it.
    pub async fn owned_by(&self, id: Uuid, seller_id: Uuid) -> Result<Store, RepositoryError> {
        let store = self.get(id).await?;
        if store.seller_id != seller_id {
            return Err(RepositoryError::Forbidden("Access denied: You do not own this store".to_string()));
        }
        Ok(store)
    }

    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Store>, RepositoryError> {
        let stores = sqlx::query_as::<_, Store>("SELECT * FROM stores ORDER BY created_at DESC LIMIT $1 OFFSET $2")
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool)
            .await?;
        Ok(stores)
    }

    pub async fn list_for_seller(&self, seller_id: Uuid) -> Result<Vec<Store>, RepositoryError> {
        let stores = sqlx::query_as::<_, Store>("SELECT * FROM stores WHERE seller_id = $1 ORDER BY created_at")
            .bind(seller_id)
            .fetch_all(self.pool)
            .await?;
        Ok(stores)
    }
}
