//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Decimal Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In binary floating point:                                              │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  Integer cents fix sums, but not the ledger's ratios:                  │
//! │    2500 / 3000 × 12 USD must come out as 10.00, not 9.96               │
//! │                                                                         │
//! │  OUR SOLUTION: base-10 Decimal, full precision internally,             │
//! │  rounded to 2 places only at the point of display.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `Money` carries no currency tag. Field names (`*_local`, `*_reference`)
//! say which currency an amount is in.
//!
//! ## Usage
//! ```rust
//! use barber_core::money::Money;
//!
//! let haircut = Money::new(250000, 2); // 2500.00
//! let tip = Money::new(5000, 2);       // 50.00
//! assert_eq!((haircut + tip).to_string(), "2550.00");
//! ```

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use ts_rs::TS;

/// Decimal places used for display rounding.
pub const DISPLAY_DECIMALS: u32 = 2;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary amount at full decimal precision.
///
/// ## Design Decisions
/// - **Signed**: negative payables are a legitimate outcome
/// - **No implicit rounding**: arithmetic never rounds, `round_display` does
/// - **Serialized as a string**: JSON consumers never see a float
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(transparent)]
pub struct Money(#[ts(type = "string")] Decimal);

impl Money {
    /// Creates a Money value from a mantissa and a scale.
    ///
    /// ## Example
    /// ```rust
    /// use barber_core::money::Money;
    ///
    /// let price = Money::new(1099, 2); // 10.99
    /// assert_eq!(price.to_string(), "10.99");
    /// ```
    #[inline]
    pub fn new(mantissa: i64, scale: u32) -> Self {
        Money(Decimal::new(mantissa, scale))
    }

    /// Wraps an existing decimal.
    #[inline]
    pub const fn from_decimal(amount: Decimal) -> Self {
        Money(amount)
    }

    /// Whole units (no fractional part).
    #[inline]
    pub fn from_units(units: i64) -> Self {
        Money(Decimal::from(units))
    }

    /// Returns the underlying decimal at full precision.
    #[inline]
    pub const fn as_decimal(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub(crate) const fn from_stored(amount: Decimal) -> Self {
        Money(amount)
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Strictly greater than zero.
    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Rounds half away from zero to 2 decimals.
    ///
    /// Only for display and for values that leave the ledger; stored
    /// amounts keep full precision.
    pub fn round_display(&self) -> Money {
        Money(
            self.0
                .round_dp_with_strategy(DISPLAY_DECIMALS, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Drops the fractional part toward negative infinity.
    ///
    /// ```rust
    /// use barber_core::money::Money;
    ///
    /// assert_eq!(Money::new(1099, 2).floor_units(), Money::from_units(10));
    /// ```
    pub fn floor_units(&self) -> Money {
        Money(self.0.floor())
    }

    /// Multiplies by an arbitrary ratio (share, rate, ...).
    #[inline]
    pub fn scale(&self, factor: Decimal) -> Money {
        Money(self.0 * factor)
    }

    /// Divides by a non-zero divisor; `None` when the divisor is zero.
    pub fn checked_div(&self, divisor: Decimal) -> Option<Money> {
        self.0.checked_div(divisor).map(Money)
    }

    /// Applies an integer percentage: `amount × percent / 100`.
    ///
    /// ```rust
    /// use barber_core::money::Money;
    ///
    /// assert_eq!(Money::from_units(200).percent(60), Money::from_units(120));
    /// ```
    pub fn percent(&self, percent: u32) -> Money {
        Money(self.0 * Decimal::from(percent) / Decimal::ONE_HUNDRED)
    }

    /// Multiplies by a whole quantity.
    #[inline]
    pub fn multiply_quantity(&self, qty: i64) -> Money {
        Money(self.0 * Decimal::from(qty))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Shows the amount rounded for display, e.g. `2550.00`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.round_display().0)
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Money(amount)
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// SQLite Storage
// =============================================================================
// Decimals are stored as TEXT so SQLite never coerces them to REAL.

macro_rules! impl_decimal_text {
    ($ty:ty) => {
        #[cfg(feature = "sqlx")]
        impl sqlx::Type<sqlx::Sqlite> for $ty {
            fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
                <String as sqlx::Type<sqlx::Sqlite>>::type_info()
            }

            fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
                <String as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
            }
        }

        #[cfg(feature = "sqlx")]
        impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for $ty {
            fn encode_by_ref(
                &self,
                buf: &mut <sqlx::Sqlite as sqlx::Database>::ArgumentBuffer<'q>,
            ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
                <String as sqlx::Encode<'q, sqlx::Sqlite>>::encode(
                    self.as_decimal().to_string(),
                    buf,
                )
            }
        }

        #[cfg(feature = "sqlx")]
        impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for $ty {
            fn decode(
                value: sqlx::sqlite::SqliteValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let raw = <&str as sqlx::Decode<'r, sqlx::Sqlite>>::decode(value)?;
                let amount = raw.trim().parse::<rust_decimal::Decimal>()?;
                Ok(<$ty>::from_stored(amount))
            }
        }
    };
}

pub(crate) use impl_decimal_text;

impl_decimal_text!(Money);

// =============================================================================
// Unit Tests
// =============================================================================
