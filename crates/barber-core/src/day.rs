//! # Calendar Days
//!
//! Every filter in the ledger compares calendar days in the shop's local
//! time zone, never UTC instants. Inputs may arrive as a bare date or as a
//! date with a time; both normalize to a [`NaiveDate`] here, at the edge,
//! so nothing downstream has to guess a format.
//!
//! ```rust
//! use barber_core::day::parse_day;
//!
//! let a = parse_day("2024-05-02").unwrap();
//! let b = parse_day("2024-05-02 18:45:10").unwrap();
//! assert_eq!(a, b);
//! ```

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};

use crate::error::ValidationError;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Date-with-time layouts accepted besides RFC 3339.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

/// Parses a bare date or a date-with-time into its local calendar day.
///
/// Timestamps carrying an offset (RFC 3339) are converted to the local
/// zone first; naive timestamps are already local.
pub fn parse_day(raw: &str) -> Result<NaiveDate, ValidationError> {
    let raw = raw.trim();

    if raw.is_empty() {
        return Err(ValidationError::Required {
            field: "date".to_string(),
        });
    }

    if let Ok(day) = NaiveDate::parse_from_str(raw, DATE_FORMAT) {
        return Ok(day);
    }

    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Ok(instant.with_timezone(&Local).date_naive());
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|ts| ts.date())
        .ok_or_else(|| ValidationError::InvalidFormat {
            field: "date".to_string(),
            reason: format!("'{raw}' is neither a date nor a date-time"),
        })
}

/// Calendar day of a local timestamp.
#[inline]
pub fn local_day_of(at: NaiveDateTime) -> NaiveDate {
    at.date()
}

/// Current wall-clock time in the local zone.
pub fn now_local() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Today's local calendar day.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn may_2() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 2).unwrap()
    }

    #[test]
    fn test_bare_and_timestamped_forms_agree() {
        for raw in [
            "2024-05-02",
            "2024-05-02 00:00:00",
            "2024-05-02 23:59:59.999",
            "2024-05-02T13:05",
            "  2024-05-02T13:05:44  ",
        ] {
            assert_eq!(parse_day(raw).unwrap(), may_2(), "input {raw:?}");
        }
    }

    #[test]
    fn test_rfc3339_uses_local_zone() {
        let raw = "2024-05-02T12:00:00+00:00";
        let expected = DateTime::parse_from_rfc3339(raw)
            .unwrap()
            .with_timezone(&Local)
            .date_naive();
        assert_eq!(parse_day(raw).unwrap(), expected);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(parse_day(""), Err(ValidationError::Required { .. })));
        assert!(matches!(
            parse_day("02/05/2024"),
            Err(ValidationError::InvalidFormat { .. })
        ));
    }
}
