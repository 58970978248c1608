//! Value Objects for the marketplace

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Sub};
use std::str::FromStr;

/// Monetary amount in the platform currency, stored as `NUMERIC(14,2)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self { Self(amount) }
    pub fn from_cents(cents: i64) -> Self { Self(Decimal::new(cents, 2)) }
    pub fn amount(&self) -> Decimal { self.0 }
    pub fn is_negative(&self) -> bool { self.0.is_sign_negative() && !self.0.is_zero() }

    pub fn times(&self, qty: Quantity) -> Money { Money(self.0 * Decimal::from(qty.value())) }

    /// Applies a fractional rate and rounds the result to cents, half to even.
    pub fn apply_rate(&self, rate: Rate) -> Money {
        Money(self.0 * rate.value()).round_cents()
    }

    pub fn round_cents(&self) -> Money {
        Money(self.0.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven))
    }

    /// Whole cents. Callers round first; any sub-cent digits are truncated.
    pub fn cents(&self) -> i64 {
        let scaled = (self.0 * Decimal::ONE_HUNDRED).trunc();
        scaled.to_i64().unwrap_or(i64::MAX)
    }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money { Money(self.0 + rhs.0) }
}

impl Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money { Money(self.0 - rhs.0) }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money { iter.fold(Money::ZERO, Add::add) }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money { iter.copied().sum() }
}

impl From<Decimal> for Money {
    fn from(d: Decimal) -> Self { Money(d) }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{:.2}", self.0) }
}

/// Quantity of a product on a cart or order line. Always at least one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(try_from = "i32", into = "i32")]
#[sqlx(transparent)]
pub struct Quantity(i32);

impl Quantity {
    pub fn new(value: i32) -> Result<Self, QuantityError> {
        if value < 1 { return Err(QuantityError::BelowOne(value)); }
        Ok(Self(value))
    }
    pub fn value(&self) -> i32 { self.0 }
    pub fn add(&self, other: Quantity) -> Self { Self(self.0.saturating_add(other.0)) }
    pub fn exceeds(&self, stock: i32) -> bool { self.0 > stock }
}

impl TryFrom<i32> for Quantity {
    type Error = QuantityError;
    fn try_from(value: i32) -> Result<Self, Self::Error> { Quantity::new(value) }
}

impl From<Quantity> for i32 {
    fn from(q: Quantity) -> i32 { q.0 }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum QuantityError { BelowOne(i32) }
impl std::error::Error for QuantityError {}
impl fmt::Display for QuantityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::BelowOne(v) => write!(f, "quantity must be at least 1 (got {v})") }
    }
}

/// A fraction between zero and one, e.g. `0.05` for a 5% commission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rate(Decimal);

impl Rate {
    pub fn new(value: Decimal) -> Result<Self, RateError> {
        if value < Decimal::ZERO || value > Decimal::ONE { return Err(RateError::OutOfRange(value)); }
        Ok(Self(value))
    }
    pub fn value(&self) -> Decimal { self.0 }
    /// The rate expressed in percent, as stored on settlement details.
    pub fn percent(&self) -> Decimal { self.0 * Decimal::ONE_HUNDRED }
}

impl FromStr for Rate {
    type Err = RateError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim()).map_err(|_| RateError::Unparseable(s.to_string()))?;
        Rate::new(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum RateError { OutOfRange(Decimal), Unparseable(String) }
impl std::error::Error for RateError {}
impl fmt::Display for RateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange(v) => write!(f, "rate {v} is outside 0..=1"),
            Self::Unparseable(s) => write!(f, "rate '{s}' is not a decimal"),
        }
    }
}

/// Account role carried in access tokens.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum Role {
    User,
    Seller,
    Admin,
}

impl Role {
    /// Whether a caller holding `self` may use an endpoint restricted to `required`.
    pub fn satisfies(self, required: Role) -> bool {
        match (self, required) {
            (Role::Admin, _) => true,
            (Role::User, Role::User) | (Role::Seller, Role::Seller) => true,
            (Role::User, Role::Seller | Role::Admin) | (Role::Seller, Role::User | Role::Admin) => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self { Role::User => "user", Role::Seller => "seller", Role::Admin => "admin" }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Role {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "seller" => Ok(Role::Seller),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_sum_and_times() {
        let a = Money::new(Decimal::new(100, 0)).times(Quantity::new(2).unwrap());
        let b = Money::new(Decimal::new(50, 0));
        assert_eq!([a, b].iter().sum::<Money>(), Money::new(Decimal::new(250, 0)));
    }

    #[test]
    fn test_apply_rate_uses_bankers_rounding() {
        // 0.125 and 0.135 are exact midpoints at two places
        let rate = Rate::new(Decimal::new(5, 2)).unwrap();
        assert_eq!(Money::new(Decimal::new(250, 2)).apply_rate(rate), Money::from_cents(12));
        assert_eq!(Money::new(Decimal::new(270, 2)).apply_rate(rate), Money::from_cents(14));
        assert_eq!(Money::new(Decimal::new(12500, 0)).apply_rate(rate), Money::from_cents(62_500));
    }

    #[test]
    fn test_quantity_rejects_zero() {
        assert_eq!(Quantity::new(0), Err(QuantityError::BelowOne(0)));
        assert!(Quantity::new(3).unwrap().exceeds(2));
    }

    #[test]
    fn test_rate_parse() {
        assert_eq!("0.03".parse::<Rate>().unwrap().percent(), Decimal::new(300, 2));
        assert!("1.5".parse::<Rate>().is_err());
        assert!("abc".parse::<Rate>().is_err());
    }

    #[test]
    fn test_role_matrix() {
        assert!(Role::Admin.satisfies(Role::Seller));
        assert!(Role::Seller.satisfies(Role::Seller));
        assert!(!Role::User.satisfies(Role::Seller));
        assert!(!Role::Seller.satisfies(Role::Admin));
        assert_eq!("Seller".parse::<Role>().unwrap(), Role::Seller);
    }
}
