//! # Exchange-Rate Resolver
//!
//! Local-currency units per reference-currency unit, recorded by hand.
//!
//! ## Same-Day Corrections
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  day 2024-05-02                                                         │
//! │    seq 17  rate 36.50   (morning entry)                                 │
//! │    seq 18  rate 36.80   (afternoon correction)  ◄── effective rate      │
//! │                                                                         │
//! │  Rows are never updated in place: payrolls computed before the         │
//! │  correction keep the numbers they were computed with.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A missing rate is never replaced by `1.0`. Callers get `None` and
//! decide, see [`crate::payroll`] and [`crate::reconcile`].

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::{impl_decimal_text, Money};

// =============================================================================
// Rate
// =============================================================================

/// A strictly positive exchange rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(transparent)]
pub struct Rate(#[ts(type = "string")] Decimal);

impl Rate {
    /// Validates and wraps a rate.
    ///
    /// ```rust
    /// use barber_core::rate::Rate;
    /// use rust_decimal::Decimal;
    ///
    /// assert!(Rate::new(Decimal::new(365, 1)).is_ok());
    /// assert!(Rate::new(Decimal::ZERO).is_err());
    /// ```
    pub fn new(rate: Decimal) -> Result<Rate, ValidationError> {
        if rate <= Decimal::ZERO {
            return Err(ValidationError::MustBePositive {
                field: "rate".to_string(),
            });
        }
        Ok(Rate(rate))
    }

    #[inline]
    pub const fn as_decimal(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub(crate) const fn from_stored(rate: Decimal) -> Self {
        Rate(rate)
    }

    /// Reference amount → local amount.
    #[inline]
    pub fn to_local(&self, reference: Money) -> Money {
        reference.scale(self.0)
    }

    /// Local amount → reference amount.
    pub fn to_reference(&self, local: Money) -> Money {
        // Rate is validated positive, division cannot fail.
        local.checked_div(self.0).unwrap_or_default()
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl_decimal_text!(Rate);

// =============================================================================
// Exchange Rate Row
// =============================================================================

/// One manually entered rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ExchangeRate {
    /// Insertion order; higher wins within a day.
    pub sequence: i64,
    #[ts(as = "String")]
    pub day: NaiveDate,
    pub rate: Rate,
    #[ts(as = "String")]
    pub recorded_at: NaiveDateTime,
}

/// Returns the effective rate for `day`: the highest sequence among that
/// day's rows, or `None` if nothing was recorded for it.
///
/// Rows for other days are ignored; the resolver never falls back to an
/// earlier day.
pub fn effective_rate<'a, I>(rates: I, day: NaiveDate) -> Option<&'a ExchangeRate>
where
    I: IntoIterator<Item = &'a ExchangeRate>,
{
    rates
        .into_iter()
        .filter(|r| r.day == day)
        .max_by_key(|r| r.sequence)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(sequence: i64, day: &str, rate: i64) -> ExchangeRate {
        let day = NaiveDate::parse_from_str(day, "%Y-%m-%d").unwrap();
        ExchangeRate {
            sequence,
            day,
            rate: Rate::new(Decimal::from(rate)).unwrap(),
            recorded_at: day.and_hms_opt(9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_last_entry_of_the_day_wins() {
        let rates = vec![row(1, "2024-05-02", 36), row(3, "2024-05-02", 38), row(2, "2024-05-02", 37)];
        let day = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        let effective = effective_rate(&rates, day).unwrap();
        assert_eq!(effective.sequence, 3);
        assert_eq!(effective.rate.as_decimal(), Decimal::from(38));
    }

    #[test]
    fn test_other_days_are_not_used() {
        let rates = vec![row(1, "2024-05-01", 36), row(2, "2024-05-03", 37)];
        let day = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        assert!(effective_rate(&rates, day).is_none());
    }

    #[test]
    fn test_conversions() {
        let rate = Rate::new(Decimal::from(40)).unwrap();
        assert_eq!(rate.to_local(Money::from_units(12)), Money::from_units(480));
        assert_eq!(rate.to_reference(Money::from_units(480)), Money::from_units(12));
    }

    #[test]
    fn test_rejects_non_positive() {
        assert!(Rate::new(Decimal::from(-1)).is_err());
    }
}
