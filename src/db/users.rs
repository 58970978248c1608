//! Users and seller profiles.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::RepositoryError;
use crate::domain::value_objects::Role;

/// A platform account. `password_hash` never leaves the service.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    #[serde(skip)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Seller {
    pub id: Uuid,
    pub user_id: Uuid,
    pub business_name: String,
    pub created_at: DateTime<Utc>,
}

pub struct NewUser<'a> {
    pub email: &'a str,
    pub name: &'a str,
    pub phone: Option<&'a str>,
    pub password_hash: String,
    pub role: Role,
}

/// Repository for users and seller profiles.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Creates an account. Emails are stored lower-cased.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email is already registered.
    pub async fn create(&self, new: NewUser<'_>) -> Result<User, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        insert_user(&mut conn, &new).await
    }

    /// Creates an account and, when `business_name` is given, its seller
    /// profile. Either both rows are written or neither is.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email is already registered.
    pub async fn register(&self, new: NewUser<'_>, business_name: Option<&str>) -> Result<(User, Option<Seller>), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let user = insert_user(&mut tx, &new).await?;
        let seller = match business_name {
            Some(name) => Some(insert_seller(&mut tx, user.id, name).await?),
            None => None,
        };
        tx.commit().await?;
        Ok((user, seller))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = LOWER($1)")
            .bind(email)
            .fetch_optional(self.pool)
            .await?;
        Ok(user)
    }

    pub async fn get(&self, id: Uuid) -> Result<User, RepositoryError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound("User"))
    }

    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, RepositoryError> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2")
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool)
            .await?;
        Ok(users)
    }

    /// Updates name and phone; `None` keeps the stored value.
    pub async fn update_profile(&self, id: Uuid, name: Option<&str>, phone: Option<&str>) -> Result<User, RepositoryError> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET name = COALESCE($2, name), phone = COALESCE($3, phone), updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(name)
        .bind(phone)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound("User"))
    }

    pub async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound("User"));
        }
        Ok(())
    }

    /// Creates the seller profile for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already has one.
    pub async fn create_seller(&self, user_id: Uuid, business_name: &str) -> Result<Seller, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        insert_seller(&mut conn, user_id, business_name).await
    }

    pub async fn seller_for_user(&self, user_id: Uuid) -> Result<Seller, RepositoryError> {
        sqlx::query_as::<_, Seller>("SELECT * FROM sellers WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound("Seller profile"))
    }
}

async fn insert_user(conn: &mut PgConnection, new: &NewUser<'_>) -> Result<User, RepositoryError> {
    sqlx::query_as::<_, User>(
        "INSERT INTO users (id, email, name, phone, password_hash, role) VALUES ($1, LOWER($2), $3, $4, $5, $6) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(new.email)
    .bind(new.name)
    .bind(new.phone)
    .bind(&new.password_hash)
    .bind(new.role)
    .fetch_one(conn)
    .await
    .map_err(|e| RepositoryError::conflict_on_unique(e, "Email already registered"))
}

async fn insert_seller(conn: &mut PgConnection, user_id: Uuid, business_name: &str) -> Result<Seller, RepositoryError> {
    sqlx::query_as::<_, Seller>("INSERT INTO sellers (id, user_id, business_name) VALUES ($1, $2, $3) RETURNING *")
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(business_name)
        .fetch_one(conn)
        .await
        .map_err(|e| RepositoryError::conflict_on_unique(e, "Seller profile already exists"))
}
