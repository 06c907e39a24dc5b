//! Whole-unit currency amounts.
//!
//! The payment gateway deals in whole Toman, never fractions, so amounts
//! are plain 64-bit integers rather than decimals. Derived fractional
//! values (averages in reports) are computed with `rust_decimal` at the
//! point of use.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

/// An amount of money in whole Toman.
///
/// Line totals are computed with checked arithmetic; quantities are
/// bounded upstream (1..=100 per line item) so overflow is a programming
/// error, but it is still surfaced rather than wrapped.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Toman(i64);

impl Toman {
    /// Zero Toman.
    pub const ZERO: Self = Self(0);

    /// Create an amount from a whole-Toman value.
    #[must_use]
    pub const fn new(amount: i64) -> Self {
        Self(amount)
    }

    /// Get the underlying i64 value.
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }

    /// Line total: unit price times quantity.
    ///
    /// Returns `None` on overflow.
    #[must_use]
    pub const fn times(self, quantity: u32) -> Option<Self> {
        match self.0.checked_mul(quantity as i64) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Saturating addition, used when folding line totals.
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl Add for Toman {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Toman {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sum for Toman {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, t| acc.saturating_add(t))
    }
}

impl fmt::Display for Toman {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Toman {
    fn from(amount: i64) -> Self {
        Self(amount)
    }
}

impl From<Toman> for i64 {
    fn from(amount: Toman) -> Self {
        amount.0
    }
}

// SQLx support (with postgres feature)
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Toman {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <i64 as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Toman {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let v = <i64 as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self(v))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Toman {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <i64 as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_times() {
        assert_eq!(Toman::new(100_000).times(2), Some(Toman::new(200_000)));
        assert_eq!(Toman::new(i64::MAX).times(2), None);
    }

    #[test]
    fn test_sum() {
        let total: Toman = [Toman::new(1), Toman::new(2), Toman::new(3)]
            .into_iter()
            .sum();
        assert_eq!(total, Toman::new(6));
    }

    #[test]
    fn test_serde_transparent() {
        let json = serde_json::to_string(&Toman::new(250_000)).unwrap();
        assert_eq!(json, "250000");
        let parsed: Toman = serde_json::from_str("250000").unwrap();
        assert_eq!(parsed, Toman::new(250_000));
    }
}
