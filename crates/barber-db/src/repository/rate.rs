//! # Exchange Rate Repository
//!
//! Append-only storage of manually entered rates and the effective-rate
//! resolver.
//!
//! ## Same-Day Corrections
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  09:00  record_rate(today, 36.50)   → sequence 41                       │
//! │  11:30  record_rate(today, 36.80)   → sequence 42  ← effective          │
//! │                                                                         │
//! │  Rows are never updated: payrolls computed at 10:00 keep 36.50 in       │
//! │  their rate_used, later ones get 36.80.                                 │
//! │                                                                         │
//! │  A rate for TODAY also reprices the local prices of products and        │
//! │  services, in the same storage transaction.                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::DbResult;
use crate::repository::begin_write;
use crate::repository::catalog::reprice_services;
use crate::repository::product::reprice_products;
use barber_core::day::{now_local, today};
use barber_core::rate::{effective_rate, ExchangeRate, Rate};

/// Repository for exchange rates.
#[derive(Debug, Clone)]
pub struct RateRepository {
    pool: SqlitePool,
}

impl RateRepository {
    pub fn new(pool: SqlitePool) -> Self {
        RateRepository { pool }
    }

    /// Appends a rate for `day`.
    ///
    /// When `day` is today, product and service local prices are
    /// recomputed from their reference prices before commit.
    pub async fn record_rate(&self, day: NaiveDate, rate: Rate) -> DbResult<ExchangeRate> {
        let recorded_at = now_local();
        let mut tx = begin_write(&self.pool).await?;

        let sequence = sqlx::query(
            "INSERT INTO exchange_rates (day, rate, recorded_at) VALUES (?1, ?2, ?3)",
        )
        .bind(day)
        .bind(rate)
        .bind(recorded_at)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        if day == today() {
            let products = reprice_products(&mut *tx, rate, recorded_at).await?;
            let services = reprice_services(&mut *tx, rate).await?;
            info!(%rate, products, services, "Repriced catalog for today's rate");
        }

        tx.commit().await?;

        debug!(%day, %rate, sequence, "Recorded exchange rate");

        Ok(ExchangeRate {
            sequence,
            day,
            rate,
            recorded_at,
        })
    }

    /// Every entry recorded for `day`, oldest first.
    pub async fn rates_for_day(&self, day: NaiveDate) -> DbResult<Vec<ExchangeRate>> {
        let mut conn = self.pool.acquire().await?;
        rates_for_day(&mut *conn, day).await
    }

    /// The rate in force on `day`: the most recently entered one.
    ///
    /// `None` when nothing was recorded for that day. There is no fallback
    /// to an earlier day and no default of 1.
    pub async fn effective_rate(&self, day: NaiveDate) -> DbResult<Option<ExchangeRate>> {
        let rows = self.rates_for_day(day).await?;
        Ok(effective_rate(&rows, day).cloned())
    }
}

pub(crate) async fn rates_for_day(
    conn: &mut SqliteConnection,
    day: NaiveDate,
) -> DbResult<Vec<ExchangeRate>> {
    let rows = sqlx::query_as::<_, ExchangeRate>(
        r#"
        SELECT sequence, day, rate, recorded_at
        FROM exchange_rates
        WHERE day = ?1
        ORDER BY sequence
        "#,
    )
    .bind(day)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

/// Effective rate lookup usable inside a storage transaction.
pub(crate) async fn effective_rate_on(
    conn: &mut SqliteConnection,
    day: NaiveDate,
) -> DbResult<Option<Rate>> {
    let rows = rates_for_day(conn, day).await?;
    Ok(effective_rate(&rows, day).map(|row| row.rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use barber_core::money::Money;
    use rust_decimal::Decimal;

    fn rate(mantissa: i64, scale: u32) -> Rate {
        Rate::new(Decimal::new(mantissa, scale)).unwrap()
    }

    fn may(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    #[tokio::test]
    async fn test_last_rate_of_the_day_wins() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let rates = db.rates();

        rates.record_rate(may(2), rate(3650, 2)).await.unwrap();
        rates.record_rate(may(2), rate(3680, 2)).await.unwrap();
        rates.record_rate(may(3), rate(3700, 2)).await.unwrap();

        let effective = rates.effective_rate(may(2)).await.unwrap().unwrap();
        assert_eq!(effective.rate, rate(3680, 2));
        assert_eq!(rates.rates_for_day(may(2)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_day_has_no_rate() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.rates().record_rate(may(1), rate(36, 0)).await.unwrap();

        // No fallback to the previous day
        assert!(db.rates().effective_rate(may(2)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_todays_rate_reprices_catalog() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db
            .products()
            .create("Pomade", Money::from_units(5), Money::zero(), 10)
            .await
            .unwrap();
        let service = db
            .service_catalog()
            .create("Haircut", Money::from_units(8), Money::zero())
            .await
            .unwrap();

        db.rates().record_rate(may(1), rate(30, 0)).await.unwrap();
        let untouched = db.products().get(&product.id).await.unwrap().unwrap();
        assert!(untouched.price_local.is_zero());

        db.rates().record_rate(today(), rate(40, 0)).await.unwrap();
        let product = db.products().get(&product.id).await.unwrap().unwrap();
        let service = db.service_catalog().get(&service.id).await.unwrap().unwrap();
        assert_eq!(product.price_local, Money::from_units(200));
        assert_eq!(service.price_local, Money::from_units(320));
    }
}
