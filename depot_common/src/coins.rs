use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

//--------------------------------------       Coins        ----------------------------------------------------------
/// An integer amount of in-game currency. The unit is the smallest denomination of whichever
/// currency the surrounding context refers to, so amounts never carry fractional parts.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Coins(i64);

op!(binary Coins, Add, add);
op!(binary Coins, Sub, sub);
op!(inplace Coins, SubAssign, sub_assign);
op!(unary Coins, Neg, neg);

impl Mul<i64> for Coins {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Coins {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a coin amount: {0}")]
pub struct CoinsConversionError(String);

impl From<i64> for Coins {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Coins {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Coins {}

impl TryFrom<u64> for Coins {
    type Error = CoinsConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(CoinsConversionError(format!("Value {value} is too large to convert to Coins")))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Coins {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}¢", self.0)
    }
}

impl Coins {
    pub const ZERO: Coins = Coins(0);

    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Subtraction that never goes below zero. Used for "remaining balance due" style
    /// calculations where an overpaid deposit must not produce a negative charge.
    pub fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0).max(0))
    }

    /// `self * pct / 100`, truncated towards zero.
    pub fn percent(self, pct: i64) -> Self {
        Self(self.0 * pct / 100)
    }

    /// Multiplication that surfaces overflow instead of wrapping. Callers pricing
    /// caller-supplied quantities must use this rather than `*`.
    pub fn checked_mul(self, rhs: i64) -> Option<Self> {
        self.0.checked_mul(rhs).map(Self)
    }
}

#[cfg(test)]
mod test {
    use super::Coins;

    #[test]
    fn arithmetic() {
        let a = Coins::from(250);
        let b = Coins::from(100);
        assert_eq!(a + b, Coins::from(350));
        assert_eq!(a - b, Coins::from(150));
        assert_eq!(-a, Coins::from(-250));
        assert_eq!(a * 4, Coins::from(1000));
        assert_eq!([a, b].into_iter().sum::<Coins>(), Coins::from(350));
    }

    #[test]
    fn saturating_sub_floors_at_zero() {
        let a = Coins::from(100);
        let b = Coins::from(250);
        assert_eq!(a.saturating_sub(b), Coins::ZERO);
        assert_eq!(b.saturating_sub(a), Coins::from(150));
    }

    #[test]
    fn checked_mul_surfaces_overflow() {
        assert_eq!(Coins::from(250).checked_mul(4), Some(Coins::from(1000)));
        assert_eq!(Coins::from(2).checked_mul(i64::MAX), None);
    }

    #[test]
    fn percent_truncates() {
        assert_eq!(Coins::from(200).percent(40), Coins::from(80));
        assert_eq!(Coins::from(99).percent(50), Coins::from(49));
        assert_eq!(Coins::from(7).percent(10), Coins::ZERO);
    }
}
