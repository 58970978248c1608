//! Settlement Aggregate
//!
//! Settlement-level commission and tax are `total_sales × rate`, rounded to cents
//! half-to-even. Each settlement-level amount is then split across the orders in
//! proportion to their value using largest-remainder allocation, so every detail
//! column sums exactly to its settlement column.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::events::{DomainEvent, SettlementEvent};
use crate::domain::value_objects::{Money, Rate};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "settlement_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettlementStatus { Pending, Completed, Failed }

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "payment_method", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod { BankTransfer, Upi, Wallet }

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SettlementRates { pub commission: Rate, pub tax: Rate }

/// An order's contribution to a settlement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderAmount { pub order_id: Uuid, pub amount: Money }

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Settlement {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub store_id: Uuid,
    pub settlement_period_start: DateTime<Utc>,
    pub settlement_period_end: DateTime<Utc>,
    pub total_sales_amount: Money,
    pub platform_commission: Money,
    pub tax_deduction: Money,
    pub other_deductions: Money,
    pub net_settlement_amount: Money,
    pub status: SettlementStatus,
    pub payment_method: PaymentMethod,
    pub transaction_reference: Option<String>,
    pub failure_reason: Option<String>,
    pub settled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub details: Vec<SettlementDetail>,
    #[sqlx(skip)]
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SettlementDetail {
    pub id: Uuid,
    pub settlement_id: Uuid,
    pub order_id: Uuid,
    pub order_amount: Money,
    pub commission_rate: Decimal,
    pub commission_amount: Money,
    pub tax_amount: Money,
    pub other_deduction: Money,
    pub net_amount: Money,
}

/// Input for generating a settlement over a period.
#[derive(Clone, Debug)]
pub struct SettlementRequest {
    pub seller_id: Uuid,
    pub store_id: Uuid,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub other_deductions: Money,
    pub payment_method: PaymentMethod,
}

/// `net = total − commission − tax − other`.
pub fn net_amount(total_sales: Money, commission: Money, tax: Money, other: Money) -> Money {
    total_sales - commission - tax - other
}

impl Settlement {
    pub fn generate(req: &SettlementRequest, orders: &[OrderAmount], rates: SettlementRates) -> Result<Self, SettlementError> {
        if req.period_end < req.period_start { return Err(SettlementError::InvalidPeriod); }
        if orders.is_empty() { return Err(SettlementError::NoOrders); }
        if req.other_deductions.is_negative() { return Err(SettlementError::NegativeDeduction); }

        let other = req.other_deductions.round_cents();
        let total_sales: Money = orders.iter().map(|o| o.amount).sum();
        let commission = total_sales.apply_rate(rates.commission);
        let tax = total_sales.apply_rate(rates.tax);
        let net = net_amount(total_sales, commission, tax, other);
        if net.is_negative() { return Err(SettlementError::DeductionsExceedSales); }

        let id = Uuid::now_v7();
        let weights: Vec<i64> = orders.iter().map(|o| o.amount.round_cents().cents()).collect();
        let commissions = allocate(commission.cents(), &weights)?;
        let taxes = allocate(tax.cents(), &weights)?;
        let others = allocate(other.cents(), &weights)?;

        let details = orders.iter().enumerate().map(|(i, o)| {
            let (c, t, d) = (Money::from_cents(commissions[i]), Money::from_cents(taxes[i]), Money::from_cents(others[i]));
            SettlementDetail {
                id: Uuid::now_v7(), settlement_id: id, order_id: o.order_id, order_amount: o.amount,
                commission_rate: rates.commission.percent(), commission_amount: c, tax_amount: t,
                other_deduction: d, net_amount: net_amount(o.amount, c, t, d),
            }
        }).collect();

        let mut settlement = Self {
            id, seller_id: req.seller_id, store_id: req.store_id,
            settlement_period_start: req.period_start, settlement_period_end: req.period_end,
            total_sales_amount: total_sales, platform_commission: commission, tax_deduction: tax,
            other_deductions: other, net_settlement_amount: net, status: SettlementStatus::Pending,
            payment_method: req.payment_method, transaction_reference: None, failure_reason: None,
            settled_at: None, created_at: Utc::now(), details, events: vec![],
        };
        settlement.raise_event(DomainEvent::Settlement(SettlementEvent::Generated { settlement_id: id, store_id: req.store_id, net }));
        Ok(settlement)
    }

    /// Whether the detail rows add up to the settlement's own columns.
    pub fn is_reconciled(&self) -> bool {
        let d = &self.details;
        self.net_settlement_amount == net_amount(self.total_sales_amount, self.platform_commission, self.tax_deduction, self.other_deductions)
            && column(d, |x| x.order_amount) == self.total_sales_amount
            && column(d, |x| x.commission_amount) == self.platform_commission
            && column(d, |x| x.tax_amount) == self.tax_deduction
            && column(d, |x| x.other_deduction) == self.other_deductions
            && column(d, |x| x.net_amount) == self.net_settlement_amount
    }

    pub fn complete(&mut self, transaction_reference: String) -> Result<(), SettlementError> {
        self.ensure_pending()?;
        self.status = SettlementStatus::Completed;
        self.transaction_reference = Some(transaction_reference);
        self.settled_at = Some(Utc::now());
        self.raise_event(DomainEvent::Settlement(SettlementEvent::Completed { settlement_id: self.id, store_id: self.store_id, net: self.net_settlement_amount }));
        Ok(())
    }

    pub fn fail(&mut self, reason: String) -> Result<(), SettlementError> {
        self.ensure_pending()?;
        self.status = SettlementStatus::Failed;
        self.failure_reason = Some(reason.clone());
        self.raise_event(DomainEvent::Settlement(SettlementEvent::Failed { settlement_id: self.id, store_id: self.store_id, reason }));
        Ok(())
    }

    fn ensure_pending(&self) -> Result<(), SettlementError> {
        if self.status != SettlementStatus::Pending { return Err(SettlementError::AlreadyFinalized(self.status)); }
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

fn column(details: &[SettlementDetail], f: fn(&SettlementDetail) -> Money) -> Money {
    details.iter().map(f).sum()
}

/// Splits `total` cents across `weights` proportionally (Hamilton method).
/// Leftover cents go to the largest fractional remainders; ties go to the earlier entry.
pub fn allocate(total: i64, weights: &[i64]) -> Result<Vec<i64>, SettlementError> {
    let weight_sum: i128 = weights.iter().map(|&w| i128::from(w)).sum();
    if weight_sum <= 0 || weights.iter().any(|&w| w < 0) {
        if total == 0 { return Ok(vec![0; weights.len()]); }
        return Err(SettlementError::ZeroSales);
    }
    let total = i128::from(total);
    let mut shares = Vec::with_capacity(weights.len());
    let mut remainders = Vec::with_capacity(weights.len());
    for (i, &w) in weights.iter().enumerate() {
        let exact = total * i128::from(w);
        shares.push(exact / weight_sum);
        remainders.push((i, exact % weight_sum));
    }
    let leftover = total - shares.iter().sum::<i128>();
    remainders.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    for &(i, _) in remainders.iter().take(usize::try_from(leftover).unwrap_or(0)) {
        shares[i] += 1;
    }
    Ok(shares.into_iter().map(|s| i64::try_from(s).unwrap_or(i64::MAX)).collect())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementError { NoOrders, ZeroSales, InvalidPeriod, NegativeDeduction, DeductionsExceedSales, AlreadyFinalized(SettlementStatus) }
impl std::error::Error for SettlementError {}
impl std::fmt::Display for SettlementError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoOrders => write!(f, "No unsettled delivered orders in this period"),
            Self::ZeroSales => write!(f, "Orders in this period have no value"),
            Self::InvalidPeriod => write!(f, "Settlement period ends before it starts"),
            Self::NegativeDeduction => write!(f, "Deductions cannot be negative"),
            Self::DeductionsExceedSales => write!(f, "Deductions exceed the settlement amount"),
            Self::AlreadyFinalized(s) => write!(f, "Settlement is already {s:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn rates() -> SettlementRates {
        SettlementRates { commission: "0.05".parse().unwrap(), tax: "0.03".parse().unwrap() }
    }

    fn request(other_cents: i64) -> SettlementRequest {
        SettlementRequest {
            seller_id: Uuid::now_v7(), store_id: Uuid::now_v7(),
            period_start: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
            period_end: Utc.with_ymd_and_hms(2024, 6, 7, 23, 59, 59).unwrap(),
            other_deductions: Money::from_cents(other_cents), payment_method: PaymentMethod::BankTransfer,
        }
    }

    fn orders(cents: &[i64]) -> Vec<OrderAmount> {
        cents.iter().map(|&c| OrderAmount { order_id: Uuid::now_v7(), amount: Money::from_cents(c) }).collect()
    }

    #[test]
    fn test_net_formula() {
        let net = net_amount(Money::from_cents(100_000), Money::from_cents(5_000), Money::from_cents(3_000), Money::from_cents(500));
        assert_eq!(net, Money::from_cents(91_500));
    }

    #[test]
    fn test_generate_single_order() {
        let s = Settlement::generate(&request(500), &orders(&[100_000]), rates()).unwrap();
        assert_eq!(s.total_sales_amount, Money::from_cents(100_000));
        assert_eq!(s.platform_commission, Money::from_cents(5_000));
        assert_eq!(s.tax_deduction, Money::from_cents(3_000));
        assert_eq!(s.net_settlement_amount, Money::from_cents(91_500));
        assert_eq!(s.status, SettlementStatus::Pending);
        assert!(s.is_reconciled());
    }

    #[test]
    fn test_weekly_settlement_matches_ledger() {
        // 299 + 149 + ... summing to 12500 with 50 of manual deductions
        let s = Settlement::generate(&request(5_000), &orders(&[29_900, 14_900, 1_205_200]), rates()).unwrap();
        assert_eq!(s.total_sales_amount, Money::from_cents(1_250_000));
        assert_eq!(s.platform_commission, Money::from_cents(62_500));
        assert_eq!(s.tax_deduction, Money::from_cents(37_500));
        assert_eq!(s.net_settlement_amount, Money::from_cents(1_145_000));
        assert_eq!(s.details[0].commission_amount, Money::from_cents(1_495));
        assert_eq!(s.details[0].tax_amount, Money::from_cents(897));
        assert!(s.is_reconciled());
    }

    #[test]
    fn test_penny_split_reconciles() {
        let s = Settlement::generate(&request(1), &orders(&[3_333, 3_333, 3_333]), rates()).unwrap();
        // 99.99 * 5% = 4.9995 -> 5.00
        assert_eq!(s.platform_commission, Money::from_cents(500));
        let commissions: Vec<_> = s.details.iter().map(|d| d.commission_amount.cents()).collect();
        assert_eq!(commissions, vec![167, 167, 166]);
        assert!(s.is_reconciled());
    }

    #[test]
    fn test_allocate_largest_remainder() {
        assert_eq!(allocate(100, &[1, 1, 1]).unwrap(), vec![34, 33, 33]);
        assert_eq!(allocate(10, &[70, 20, 10]).unwrap(), vec![7, 2, 1]);
        assert_eq!(allocate(5, &[1, 2]).unwrap(), vec![2, 3]);
        assert_eq!(allocate(0, &[0, 0]).unwrap(), vec![0, 0]);
        assert_eq!(allocate(7, &[0, 0]), Err(SettlementError::ZeroSales));
        let parts = allocate(12_345, &[17, 3, 999, 41]).unwrap();
        assert_eq!(parts.iter().sum::<i64>(), 12_345);
    }

    #[test]
    fn test_generate_rejections() {
        assert_eq!(Settlement::generate(&request(0), &[], rates()).unwrap_err(), SettlementError::NoOrders);
        assert_eq!(Settlement::generate(&request(10_000), &orders(&[5_000]), rates()).unwrap_err(), SettlementError::DeductionsExceedSales);
        assert_eq!(Settlement::generate(&request(-1), &orders(&[5_000]), rates()).unwrap_err(), SettlementError::NegativeDeduction);
        let mut bad = request(0);
        std::mem::swap(&mut bad.period_start, &mut bad.period_end);
        assert_eq!(Settlement::generate(&bad, &orders(&[5_000]), rates()).unwrap_err(), SettlementError::InvalidPeriod);
    }

    #[test]
    fn test_status_machine() {
        let mut s = Settlement::generate(&request(0), &orders(&[10_000]), rates()).unwrap();
        s.complete("TXN-2024-001".into()).unwrap();
        assert_eq!(s.status, SettlementStatus::Completed);
        assert!(s.settled_at.is_some());
        assert_eq!(s.fail("late".into()), Err(SettlementError::AlreadyFinalized(SettlementStatus::Completed)));

        let mut f = Settlement::generate(&request(0), &orders(&[10_000]), rates()).unwrap();
        f.fail("Bank account details incorrect".into()).unwrap();
        assert_eq!(f.failure_reason.as_deref(), Some("Bank account details incorrect"));
        assert!(f.complete("x".into()).is_err());
        assert_eq!(f.take_events().len(), 2);
    }
}
