//! Orders: checkout, status progression and reviews.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::{carts, dashboard, notifications, products, RepositoryError};
use crate::domain::aggregates::{Order, OrderError, OrderItem, OrderStatus, Party, Product};
use crate::domain::value_objects::Role;

#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

/// Who is acting on an order.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Turns the user's active cart for `store_id` into a pending order.
    ///
    /// Cart, products and stock change together or not at all. Products left at
    /// or below `low_stock_threshold` get an inventory alert, and the store owner
    /// is notified of the new order.
    ///
    /// # Errors
    ///
    /// `NotFound` without an active cart, `Order(EmptyCart)` for an empty one,
    /// `Product(InsufficientInventory)` when any line exceeds current stock.
    pub async fn checkout(&self, user_id: Uuid, store_id: Uuid, low_stock_threshold: i32) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut cart = carts::lock_active(&mut tx, user_id, store_id).await?.ok_or(RepositoryError::NotFound("Cart"))?;
        let order = Order::place(&cart)?;

        // lock in id order so concurrent checkouts cannot deadlock on shared products
        let mut lines: Vec<_> = cart.lines.iter().collect();
        lines.sort_by_key(|l| l.product_id);
        let mut touched: Vec<Product> = Vec::with_capacity(lines.len());
        for line in lines {
            let mut product = products::lock(&mut tx, line.product_id).await?;
            product.remove_inventory(line.quantity)?;
            touched.push(product);
        }

        cart.mark_checked_out()?;

        for product in &touched {
            sqlx::query("UPDATE products SET stock = $2, updated_at = $3 WHERE id = $1")
                .bind(product.id)
                .bind(product.stock)
                .bind(product.updated_at)
                .execute(&mut *tx)
                .await?;
        }
        insert_order(&mut tx, &order).await?;
        carts::persist(&mut tx, &cart).await?;

        for product in &touched {
            if let Some(alert) = product.stock_alert(low_stock_threshold) {
                if dashboard::raise_stock_alert(&mut tx, store_id, product.id, &alert).await? {
                    tracing::info!(product_id = %product.id, stock = product.stock, "inventory alert raised");
                }
            }
        }
        notifications::notify_store_owner(
            &mut tx,
            store_id,
            "New order received",
            &format!("Order {} for {} is waiting to be accepted", order.order_number, order.total_amount),
            "ORDER",
            false,
        )
        .await?;

        tx.commit().await?;
        tracing::info!(order_id = %order.id, order_number = %order.order_number, total = %order.total_amount, "order placed");
        Ok(order)
    }

    pub async fn list_for_user(&self, user_id: Uuid, page: Page) -> Result<Vec<Order>, RepositoryError> {
        let orders = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE user_id = $1 ORDER BY placed_at DESC LIMIT $2 OFFSET $3")
            .bind(user_id)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(self.pool)
            .await?;
        Ok(orders)
    }

    pub async fn list_for_store(&self, store_id: Uuid, status: Option<OrderStatus>, page: Page) -> Result<Vec<Order>, RepositoryError> {
        let orders = sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE store_id = $1 AND ($2::order_status IS NULL OR status = $2)
             ORDER BY placed_at DESC LIMIT $3 OFFSET $4",
        )
        .bind(store_id)
        .bind(status)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(self.pool)
        .await?;
        Ok(orders)
    }

    /// The order with its items, visible to its buyer, the store's seller and admins.
    pub async fn get(&self, id: Uuid, actor: Actor) -> Result<Order, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let mut order = fetch(&mut conn, id, false).await?;
        party_for(&mut conn, &order, actor, None).await?;
        order.items = items(&mut conn, id).await?;
        Ok(order)
    }

    /// Moves the order to `next` on behalf of `actor`.
    pub async fn transition(&self, id: Uuid, next: OrderStatus, actor: Actor) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut order = fetch(&mut tx, id, true).await?;
        let party = party_for(&mut tx, &order, actor, Some(next)).await?;
        order.transition(next, party)?;

        sqlx::query("UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(order.id)
            .bind(order.status)
            .bind(order.updated_at)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(order_id = %order.id, status = ?order.status, "order status changed");
        Ok(order)
    }

    /// Leaves the buyer's review of a delivered order on its store.
    pub async fn review(&self, id: Uuid, user_id: Uuid, rating: i16, comment: Option<&str>) -> Result<Uuid, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let order = fetch(&mut conn, id, false).await?;
        if order.user_id != user_id {
            return Err(RepositoryError::Forbidden("Only the buyer can review this order".to_string()));
        }
        if !order.is_reviewable() {
            return Err(OrderError::NotReviewable.into());
        }
        dashboard::insert_review(&mut conn, order.store_id, user_id, order.id, rating, comment).await
    }
}

async fn fetch(conn: &mut PgConnection, id: Uuid, for_update: bool) -> Result<Order, RepositoryError> {
    let sql = if for_update { "SELECT * FROM orders WHERE id = $1 FOR UPDATE" } else { "SELECT * FROM orders WHERE id = $1" };
    sqlx::query_as::<_, Order>(sql)
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or(RepositoryError::NotFound("Order"))
}

async fn items(conn: &mut PgConnection, order_id: Uuid) -> Result<Vec<OrderItem>, RepositoryError> {
    let items = sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(items)
}

/// Works out how `actor` relates to the order. A seller buying from their own
/// store acts as the owner unless they are disputing.
async fn party_for(conn: &mut PgConnection, order: &Order, actor: Actor, next: Option<OrderStatus>) -> Result<Party, RepositoryError> {
    if actor.role == Role::Admin {
        return Ok(Party::Admin);
    }
    let (owner_user,): (Uuid,) = sqlx::query_as("SELECT s.user_id FROM stores st JOIN sellers s ON s.id = st.seller_id WHERE st.id = $1")
        .bind(order.store_id)
        .fetch_one(conn)
        .await?;
    let is_owner = actor.role == Role::Seller && owner_user == actor.user_id;
    let is_buyer = order.user_id == actor.user_id;

    match (is_owner, is_buyer) {
        (true, true) if next == Some(OrderStatus::Disputed) => Ok(Party::Buyer),
        (true, _) => Ok(Party::StoreOwner),
        (false, true) => Ok(Party::Buyer),
        (false, false) => Err(RepositoryError::Forbidden("Access denied: not your order".to_string())),
    }
}

async fn insert_order(conn: &mut PgConnection, order: &Order) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO orders (id, order_number, user_id, store_id, cart_id, status, total_amount, placed_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(order.id)
    .bind(&order.order_number)
    .bind(order.user_id)
    .bind(order.store_id)
    .bind(order.cart_id)
    .bind(order.status)
    .bind(order.total_amount)
    .bind(order.placed_at)
    .bind(order.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| RepositoryError::conflict_on_unique(e, "Order number collision, please retry"))?;

    for item in &order.items {
        sqlx::query("INSERT INTO order_items (id, order_id, product_id, quantity, unit_price, total) VALUES ($1, $2, $3, $4, $5, $6)")
            .bind(item.id)
            .bind(item.order_id)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.total)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}
