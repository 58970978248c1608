//! Settlements, seller payments and seller balances.
//!
//! Generation and status changes lock the store's `seller_balances` row first,
//! which serializes settlement work per store. An order belongs to at most one
//! settlement that has not failed.

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::RepositoryError;
use crate::domain::aggregates::{OrderAmount, PaymentMethod, Settlement, SettlementDetail, SettlementRates, SettlementRequest};
use crate::domain::value_objects::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "payment_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SellerPayment {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub store_id: Uuid,
    pub settlement_id: Uuid,
    pub amount: Money,
    pub payment_method: PaymentMethod,
    pub status: PaymentStatus,
    pub transaction_reference: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// `available_amount` is delivered sales not yet in a live settlement; it is
/// computed on read. The other columns are kept by settlement bookkeeping.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SellerBalance {
    pub store_id: Uuid,
    pub available_amount: Money,
    pub pending_amount: Money,
    pub total_withdrawals: Money,
    pub last_settlement_date: Option<DateTime<Utc>>,
}

const UNSETTLED: &str = "NOT EXISTS (
    SELECT 1 FROM settlement_details d JOIN settlements s ON s.id = d.settlement_id
    WHERE d.order_id = o.id AND s.status <> 'FAILED'
)";

pub struct SettlementRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SettlementRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Settles the store's delivered, not yet settled orders placed in the period.
    ///
    /// # Errors
    ///
    /// `Settlement(NoOrders)` when nothing is eligible, `Settlement(DeductionsExceedSales)`
    /// when deductions would make the payout negative.
    pub async fn generate(&self, req: &SettlementRequest, rates: SettlementRates) -> Result<Settlement, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        lock_balance(&mut tx, req.store_id, req.seller_id).await?;

        let rows: Vec<(Uuid, Money)> = sqlx::query_as(&format!(
            "SELECT o.id, o.total_amount FROM orders o
             WHERE o.store_id = $1 AND o.status = 'DELIVERED' AND o.placed_at BETWEEN $2 AND $3 AND {UNSETTLED}
             ORDER BY o.placed_at, o.id"
        ))
        .bind(req.store_id)
        .bind(req.period_start)
        .bind(req.period_end)
        .fetch_all(&mut *tx)
        .await?;
        let orders: Vec<OrderAmount> = rows.into_iter().map(|(order_id, amount)| OrderAmount { order_id, amount }).collect();

        let settlement = Settlement::generate(req, &orders, rates)?;
        insert_settlement(&mut tx, &settlement).await?;
        sqlx::query("UPDATE seller_balances SET pending_amount = pending_amount + $2, updated_at = NOW() WHERE store_id = $1")
            .bind(req.store_id)
            .bind(settlement.net_settlement_amount)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(
            settlement_id = %settlement.id,
            store_id = %settlement.store_id,
            orders = settlement.details.len(),
            net = %settlement.net_settlement_amount,
            "settlement generated"
        );
        Ok(settlement)
    }

    /// Marks the settlement paid and records the payout.
    pub async fn complete(&self, id: Uuid, reference: Option<String>) -> Result<Settlement, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut settlement = lock_settlement(&mut tx, id).await?;
        settlement.complete(reference.unwrap_or_else(new_transaction_reference))?;

        update_status(&mut tx, &settlement).await?;
        sqlx::query(
            "UPDATE seller_balances SET pending_amount = pending_amount - $2, total_withdrawals = total_withdrawals + $2,
                 last_settlement_date = $3, updated_at = NOW()
             WHERE store_id = $1",
        )
        .bind(settlement.store_id)
        .bind(settlement.net_settlement_amount)
        .bind(settlement.settled_at)
        .execute(&mut *tx)
        .await?;
        insert_payment(&mut tx, &settlement, PaymentStatus::Completed).await?;
        tx.commit().await?;

        tracing::info!(settlement_id = %id, reference = ?settlement.transaction_reference, "settlement completed");
        Ok(settlement)
    }

    /// Marks the settlement failed. Its orders become eligible for settlement again.
    pub async fn fail(&self, id: Uuid, reason: String) -> Result<Settlement, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut settlement = lock_settlement(&mut tx, id).await?;
        settlement.fail(reason)?;

        update_status(&mut tx, &settlement).await?;
        sqlx::query("UPDATE seller_balances SET pending_amount = pending_amount - $2, updated_at = NOW() WHERE store_id = $1")
            .bind(settlement.store_id)
            .bind(settlement.net_settlement_amount)
            .execute(&mut *tx)
            .await?;
        insert_payment(&mut tx, &settlement, PaymentStatus::Failed).await?;
        tx.commit().await?;

        tracing::warn!(settlement_id = %id, reason = ?settlement.failure_reason, "settlement failed");
        Ok(settlement)
    }

    pub async fn list_for_store(&self, store_id: Uuid) -> Result<Vec<Settlement>, RepositoryError> {
        let mut settlements = sqlx::query_as::<_, Settlement>("SELECT * FROM settlements WHERE store_id = $1 ORDER BY created_at DESC")
            .bind(store_id)
            .fetch_all(self.pool)
            .await?;
        let mut conn = self.pool.acquire().await?;
        for s in &mut settlements {
            s.details = details(&mut conn, s.id).await?;
        }
        Ok(settlements)
    }

    pub async fn balance(&self, store_id: Uuid) -> Result<SellerBalance, RepositoryError> {
        let balance = sqlx::query_as::<_, SellerBalance>(&format!(
            "SELECT st.id AS store_id,
                    COALESCE((SELECT SUM(o.total_amount) FROM orders o
                              WHERE o.store_id = st.id AND o.status = 'DELIVERED' AND {UNSETTLED}), 0) AS available_amount,
                    COALESCE(b.pending_amount, 0) AS pending_amount,
                    COALESCE(b.total_withdrawals, 0) AS total_withdrawals,
                    b.last_settlement_date
             FROM stores st LEFT JOIN seller_balances b ON b.store_id = st.id
             WHERE st.id = $1"
        ))
        .bind(store_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound("Store"))?;
        Ok(balance)
    }

    pub async fn payments(&self, store_id: Uuid) -> Result<Vec<SellerPayment>, RepositoryError> {
        let payments = sqlx::query_as::<_, SellerPayment>("SELECT * FROM seller_payments WHERE store_id = $1 ORDER BY created_at DESC")
            .bind(store_id)
            .fetch_all(self.pool)
            .await?;
        Ok(payments)
    }
}

/// Ensures the store has a balance row and locks it.
async fn lock_balance(conn: &mut PgConnection, store_id: Uuid, seller_id: Uuid) -> Result<(), RepositoryError> {
    sqlx::query("INSERT INTO seller_balances (store_id, seller_id) VALUES ($1, $2) ON CONFLICT (store_id) DO NOTHING")
        .bind(store_id)
        .bind(seller_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("SELECT store_id FROM seller_balances WHERE store_id = $1 FOR UPDATE")
        .bind(store_id)
        .execute(conn)
        .await?;
    Ok(())
}

async fn lock_settlement(conn: &mut PgConnection, id: Uuid) -> Result<Settlement, RepositoryError> {
    let (store_id, seller_id): (Uuid, Uuid) = sqlx::query_as("SELECT store_id, seller_id FROM settlements WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(RepositoryError::NotFound("Settlement"))?;
    lock_balance(conn, store_id, seller_id).await?;

    let mut settlement = sqlx::query_as::<_, Settlement>("SELECT * FROM settlements WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
    settlement.details = details(conn, id).await?;
    Ok(settlement)
}

async fn details(conn: &mut PgConnection, settlement_id: Uuid) -> Result<Vec<SettlementDetail>, RepositoryError> {
    let details = sqlx::query_as::<_, SettlementDetail>("SELECT * FROM settlement_details WHERE settlement_id = $1 ORDER BY id")
        .bind(settlement_id)
        .fetch_all(conn)
        .await?;
    Ok(details)
}

async fn insert_settlement(conn: &mut PgConnection, s: &Settlement) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO settlements (id, seller_id, store_id, settlement_period_start, settlement_period_end, total_sales_amount,
             platform_commission, tax_deduction, other_deductions, net_settlement_amount, status, payment_method, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
    )
    .bind(s.id)
    .bind(s.seller_id)
    .bind(s.store_id)
    .bind(s.settlement_period_start)
    .bind(s.settlement_period_end)
    .bind(s.total_sales_amount)
    .bind(s.platform_commission)
    .bind(s.tax_deduction)
    .bind(s.other_deductions)
    .bind(s.net_settlement_amount)
    .bind(s.status)
    .bind(s.payment_method)
    .bind(s.created_at)
    .execute(&mut *conn)
    .await?;

    for d in &s.details {
        sqlx::query(
            "INSERT INTO settlement_details (id, settlement_id, order_id, order_amount, commission_rate, commission_amount,
                 tax_amount, other_deduction, net_amount)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(d.id)
        .bind(d.settlement_id)
        .bind(d.order_id)
        .bind(d.order_amount)
        .bind(d.commission_rate)
        .bind(d.commission_amount)
        .bind(d.tax_amount)
        .bind(d.other_deduction)
        .bind(d.net_amount)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn update_status(conn: &mut PgConnection, s: &Settlement) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE settlements SET status = $2, transaction_reference = $3, failure_reason = $4, settled_at = $5 WHERE id = $1")
        .bind(s.id)
        .bind(s.status)
        .bind(&s.transaction_reference)
        .bind(&s.failure_reason)
        .bind(s.settled_at)
        .execute(conn)
        .await?;
    Ok(())
}

async fn insert_payment(conn: &mut PgConnection, s: &Settlement, status: PaymentStatus) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO seller_payments (id, seller_id, store_id, settlement_id, amount, payment_method, status,
             transaction_reference, failure_reason)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(Uuid::now_v7())
    .bind(s.seller_id)
    .bind(s.store_id)
    .bind(s.id)
    .bind(s.net_settlement_amount)
    .bind(s.payment_method)
    .bind(status)
    .bind(&s.transaction_reference)
    .bind(&s.failure_reason)
    .execute(conn)
    .await?;
    Ok(())
}

/// `TXN-` followed by twelve upper-case alphanumerics.
fn new_transaction_reference() -> String {
    let suffix: String = rand::thread_rng().sample_iter(&Alphanumeric).take(12).map(char::from).collect();
    format!("TXN-{}", suffix.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_reference_format() {
        let reference = new_transaction_reference();
        assert!(reference.starts_with("TXN-"));
        assert_eq!(reference.len(), 16);
        assert!(reference[4..].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }
}
