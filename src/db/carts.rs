//! Cart persistence.
//!
//! Every mutation loads the cart aggregate under `FOR UPDATE`, applies the change
//! in memory, and writes the full line set and re-derived total back in the same
//! transaction.
//!
//! Lock order is the cart row first, then product rows in ascending id, the
//! same order checkout takes them.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::{products, RepositoryError};
use crate::domain::aggregates::{Cart, CartLine};
use crate::domain::value_objects::Quantity;

pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The user's active carts, one per store, with their lines.
    pub async fn view(&self, user_id: Uuid) -> Result<Vec<Cart>, RepositoryError> {
        let mut carts = sqlx::query_as::<_, Cart>("SELECT * FROM carts WHERE user_id = $1 AND status = 'active' ORDER BY updated_at DESC")
            .bind(user_id)
            .fetch_all(self.pool)
            .await?;
        let mut conn = self.pool.acquire().await?;
        for cart in &mut carts {
            cart.lines = load_lines(&mut conn, cart.id).await?;
        }
        Ok(carts)
    }

    /// Adds `quantity` of a product to the user's active cart for `store_id`,
    /// opening the cart if there is none.
    ///
    /// # Errors
    ///
    /// `NotFound` if the product does not exist in that store, `Cart` on a stock shortage.
    pub async fn add_item(&self, user_id: Uuid, store_id: Uuid, product_id: Uuid, quantity: Quantity) -> Result<Cart, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut cart = open_or_lock(&mut tx, user_id, store_id).await?;
        let product = products::lock(&mut tx, product_id).await?;
        // Dropping `tx` rolls back a cart opened for a foreign product.
        if product.store_id != store_id {
            return Err(RepositoryError::NotFound("Product"));
        }
        cart.add_item(&product, quantity)?;
        persist(&mut tx, &cart).await?;
        tx.commit().await?;

        tracing::debug!(cart_id = %cart.id, product_id = %product_id, total = %cart.total_amount, "cart item added");
        Ok(cart)
    }

    pub async fn update_quantity(&self, user_id: Uuid, line_id: Uuid, quantity: i32) -> Result<Cart, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut cart = lock_by_line(&mut tx, line_id, user_id).await?;
        let product_id = cart.line(line_id).map(|l| l.product_id).ok_or(RepositoryError::NotFound("Cart item"))?;
        let product = products::lock(&mut tx, product_id).await?;
        cart.update_quantity(line_id, quantity, product.stock)?;
        persist(&mut tx, &cart).await?;
        tx.commit().await?;
        Ok(cart)
    }

    pub async fn remove_line(&self, user_id: Uuid, line_id: Uuid) -> Result<Cart, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut cart = lock_by_line(&mut tx, line_id, user_id).await?;
        cart.remove_line(line_id)?;
        persist(&mut tx, &cart).await?;
        tx.commit().await?;
        Ok(cart)
    }

    /// Empties the user's active cart for `store_id`, or every active cart when no store is given.
    pub async fn clear(&self, user_id: Uuid, store_id: Option<Uuid>) -> Result<Vec<Cart>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut carts = sqlx::query_as::<_, Cart>(
            "SELECT * FROM carts WHERE user_id = $1 AND status = 'active' AND ($2::uuid IS NULL OR store_id = $2) FOR UPDATE",
        )
        .bind(user_id)
        .bind(store_id)
        .fetch_all(&mut *tx)
        .await?;
        if carts.is_empty() {
            return Err(RepositoryError::NotFound("Cart"));
        }
        for cart in &mut carts {
            cart.lines = load_lines(&mut tx, cart.id).await?;
            cart.clear();
            persist(&mut tx, cart).await?;
        }
        tx.commit().await?;
        Ok(carts)
    }
}

/// Locks the active cart for (user, store) with its lines, if there is one.
pub(crate) async fn lock_active(conn: &mut PgConnection, user_id: Uuid, store_id: Uuid) -> Result<Option<Cart>, RepositoryError> {
    let cart = sqlx::query_as::<_, Cart>("SELECT * FROM carts WHERE user_id = $1 AND store_id = $2 AND status = 'active' FOR UPDATE")
        .bind(user_id)
        .bind(store_id)
        .fetch_optional(&mut *conn)
        .await?;
    match cart {
        Some(mut cart) => {
            cart.lines = load_lines(conn, cart.id).await?;
            Ok(Some(cart))
        }
        None => Ok(None),
    }
}

async fn open_or_lock(conn: &mut PgConnection, user_id: Uuid, store_id: Uuid) -> Result<Cart, RepositoryError> {
    if let Some(cart) = lock_active(conn, user_id, store_id).await? {
        return Ok(cart);
    }
    let fresh = Cart::open(user_id, store_id);
    // a concurrent request may have opened the cart first; the partial index keeps one
    sqlx::query(
        "INSERT INTO carts (id, user_id, store_id, status, total_amount, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         ON CONFLICT (user_id, store_id) WHERE status = 'active' DO NOTHING",
    )
    .bind(fresh.id)
    .bind(fresh.user_id)
    .bind(fresh.store_id)
    .bind(fresh.status)
    .bind(fresh.total_amount)
    .bind(fresh.created_at)
    .bind(fresh.updated_at)
    .execute(&mut *conn)
    .await?;
    lock_active(conn, user_id, store_id)
        .await?
        .ok_or_else(|| RepositoryError::DataCorruption("active cart vanished after insert".into()))
}

/// Locks the cart owning `line_id` and checks it belongs to `user_id`.
async fn lock_by_line(conn: &mut PgConnection, line_id: Uuid, user_id: Uuid) -> Result<Cart, RepositoryError> {
    let mut cart = sqlx::query_as::<_, Cart>(
        "SELECT c.* FROM carts c JOIN cart_lines l ON l.cart_id = c.id WHERE l.id = $1 FOR UPDATE OF c",
    )
    .bind(line_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(RepositoryError::NotFound("Cart item"))?;
    cart.ensure_owner(user_id)?;
    cart.lines = load_lines(conn, cart.id).await?;
    Ok(cart)
}

async fn load_lines(conn: &mut PgConnection, cart_id: Uuid) -> Result<Vec<CartLine>, RepositoryError> {
    let lines = sqlx::query_as::<_, CartLine>("SELECT * FROM cart_lines WHERE cart_id = $1 ORDER BY id")
        .bind(cart_id)
        .fetch_all(conn)
        .await?;
    Ok(lines)
}

/// Writes the cart's lines, status and total. Lines missing from the aggregate are deleted.
pub(crate) async fn persist(conn: &mut PgConnection, cart: &Cart) -> Result<(), RepositoryError> {
    let keep: Vec<Uuid> = cart.lines.iter().map(|l| l.id).collect();
    sqlx::query("DELETE FROM cart_lines WHERE cart_id = $1 AND NOT (id = ANY($2))")
        .bind(cart.id)
        .bind(&keep)
        .execute(&mut *conn)
        .await?;

    for line in &cart.lines {
        sqlx::query(
            "INSERT INTO cart_lines (id, cart_id, product_id, quantity, price_at_time) VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (id) DO UPDATE SET quantity = EXCLUDED.quantity, price_at_time = EXCLUDED.price_at_time",
        )
        .bind(line.id)
        .bind(line.cart_id)
        .bind(line.product_id)
        .bind(line.quantity)
        .bind(line.price_at_time)
        .execute(&mut *conn)
        .await?;
    }

    sqlx::query("UPDATE carts SET status = $2, total_amount = $3, updated_at = $4 WHERE id = $1")
        .bind(cart.id)
        .bind(cart.status)
        .bind(cart.total_amount)
        .bind(cart.updated_at)
        .execute(conn)
        .await?;
    Ok(())
}
