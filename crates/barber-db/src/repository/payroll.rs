//! # Payroll Repository
//!
//! Gathers an employee's day, runs the payroll calculator and commits the
//! result together with the consumption settlement.
//!
//! ## compute_payroll
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. employee exists?            no  → EmployeeNotFound                  │
//! │  2. payroll for (employee, day)? yes → Duplicate   (nothing computed)   │
//! │                                                                         │
//! │  BEGIN IMMEDIATE   (write lock held from here)                          │
//! │  3. completed services of the day + ALL pending consumption + rate      │
//! │  4. barber_core::payroll::compute_payroll                               │
//! │  5. re-check (employee, day)     yes → ROLLBACK, Duplicate              │
//! │  6. INSERT payroll               UNIQUE hit → ROLLBACK, Duplicate       │
//! │  7. consumptions → paid, payroll_id = new id   (each must still be     │
//! │     pending, otherwise ROLLBACK)                                        │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Concurrent writers queue on the write lock, so the loser's step 5 sees
//! the winner's row. The UNIQUE index on `payrolls(employee_id, pay_day)`
//! backs this up for writers outside this repository.

use chrono::NaiveDate;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult, PayrollError};
use crate::repository::begin_write;
use crate::repository::consumption::{for_payroll, pending_for};
use crate::repository::product::adjust_stock;
use crate::repository::rate::effective_rate_on;
use crate::repository::transaction::completed_services_for;
use barber_core::day::now_local;
use barber_core::payroll::compute_payroll;
use barber_core::{ConsumptionStatus, PaymentCurrency, PaymentStatus, Payroll};

const PAYROLL_COLUMNS: &str = r#"
    id, employee_id, pay_day,
    commission_local, commission_reference, tip_local, tip_reference,
    consumption_deduction_local, payout_percent,
    total_payable_local, total_payable_reference, rate_used,
    payment_currency, payment_status, created_at, paid_at
"#;

/// Repository for payrolls.
#[derive(Debug, Clone)]
pub struct PayrollRepository {
    pool: SqlitePool,
}

impl PayrollRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PayrollRepository { pool }
    }

    /// Computes and stores the payroll of `employee_id` for `pay_day`.
    ///
    /// `payout_percent` is clamped to 1..=100. A missing rate is not an
    /// error: reference amounts are zero and `rate_used` is `None`.
    pub async fn compute_payroll(
        &self,
        employee_id: &str,
        pay_day: NaiveDate,
        payout_percent: i64,
    ) -> Result<Payroll, PayrollError> {
        {
            let mut conn = self.pool.acquire().await?;

            let employee: Option<String> =
                sqlx::query_scalar("SELECT id FROM employees WHERE id = ?1")
                    .bind(employee_id)
                    .fetch_optional(&mut *conn)
                    .await?;
            if employee.is_none() {
                return Err(PayrollError::EmployeeNotFound(employee_id.to_string()));
            }

            if payroll_exists(&mut *conn, employee_id, pay_day).await? {
                return Err(duplicate(employee_id, pay_day));
            }
        }

        let mut tx = begin_write(&self.pool).await?;

        let services = completed_services_for(&mut *tx, employee_id, pay_day).await?;
        let consumptions = pending_for(&mut *tx, employee_id).await?;
        let rate = effective_rate_on(&mut *tx, pay_day).await?;

        let draft = compute_payroll(
            employee_id,
            pay_day,
            payout_percent,
            &services,
            &consumptions,
            rate,
        );

        if draft.percent_was_clamped() {
            warn!(
                employee_id = %employee_id,
                requested = draft.requested_percent,
                applied = draft.payout_percent,
                "Payout percent clamped"
            );
        }
        if draft.rate_missing() {
            warn!(%pay_day, "No exchange rate for pay day, reference amounts set to zero");
        }

        if payroll_exists(&mut *tx, employee_id, pay_day).await? {
            return Err(duplicate(employee_id, pay_day));
        }

        let consumption_ids = draft.consumption_ids.clone();
        let service_count = draft.service_ids.len();
        let payroll = draft.into_payroll(Uuid::new_v4().to_string(), now_local());

        insert_payroll(&mut *tx, &payroll).await.map_err(|err| {
            if err.is_unique_violation_on("payrolls") {
                duplicate(employee_id, pay_day)
            } else {
                PayrollError::from(err)
            }
        })?;

        for consumption_id in &consumption_ids {
            settle_consumption(&mut *tx, consumption_id, &payroll.id).await?;
        }

        tx.commit().await?;

        info!(
            id = %payroll.id,
            employee_id = %employee_id,
            %pay_day,
            services = service_count,
            consumptions = consumption_ids.len(),
            total_local = %payroll.total_payable_local,
            "Payroll created"
        );

        Ok(payroll)
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Payroll>> {
        let mut conn = self.pool.acquire().await?;
        get_payroll(&mut *conn, id).await
    }

    /// Payrolls of a day, any status.
    pub async fn for_day(&self, pay_day: NaiveDate) -> DbResult<Vec<Payroll>> {
        let rows = sqlx::query_as::<_, Payroll>(&format!(
            "SELECT {PAYROLL_COLUMNS} FROM payrolls WHERE pay_day = ?1 ORDER BY created_at"
        ))
        .bind(pay_day)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Marks a pending payroll as paid in the given currency.
    pub async fn mark_paid(&self, id: &str, currency: PaymentCurrency) -> DbResult<Payroll> {
        let mut tx = begin_write(&self.pool).await?;

        let result = sqlx::query(
            r#"
            UPDATE payrolls
            SET payment_status = ?2, payment_currency = ?3, paid_at = ?4
            WHERE id = ?1 AND payment_status = ?5
            "#,
        )
        .bind(id)
        .bind(PaymentStatus::Paid)
        .bind(currency)
        .bind(now_local())
        .bind(PaymentStatus::Pending)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Payroll (pending)", id));
        }

        let payroll = get_payroll(&mut *tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Payroll", id))?;
        tx.commit().await?;

        debug!(id = %id, ?currency, "Payroll marked paid");
        Ok(payroll)
    }

    /// Deletes a payroll and reverses its settlement.
    ///
    /// Linked consumptions go back to pending with no payroll, and the
    /// stock they took is returned. All or nothing.
    pub async fn delete_payroll(&self, id: &str) -> DbResult<()> {
        let mut tx = begin_write(&self.pool).await?;

        if get_payroll(&mut *tx, id).await?.is_none() {
            return Err(DbError::not_found("Payroll", id));
        }

        let consumptions = for_payroll(&mut *tx, id).await?;
        for consumption in &consumptions {
            adjust_stock(&mut *tx, &consumption.product_id, consumption.quantity).await?;
        }

        sqlx::query(
            r#"
            UPDATE product_consumptions
            SET status = ?2, payroll_id = NULL
            WHERE payroll_id = ?1
            "#,
        )
        .bind(id)
        .bind(ConsumptionStatus::Pending)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM payrolls WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(id = %id, reverted = consumptions.len(), "Payroll deleted");
        Ok(())
    }
}

/// Moves one pending consumption onto a payroll.
///
/// The payroll already deducts it, so a row that is no longer pending
/// fails the whole storage transaction.
async fn settle_consumption(
    conn: &mut SqliteConnection,
    consumption_id: &str,
    payroll_id: &str,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE product_consumptions
        SET status = ?3, payroll_id = ?2
        WHERE id = ?1 AND status = ?4
        "#,
    )
    .bind(consumption_id)
    .bind(payroll_id)
    .bind(ConsumptionStatus::Paid)
    .bind(ConsumptionStatus::Pending)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() != 1 {
        return Err(DbError::not_found("ProductConsumption (pending)", consumption_id));
    }

    Ok(())
}

fn duplicate(employee_id: &str, pay_day: NaiveDate) -> PayrollError {
    PayrollError::Duplicate {
        employee_id: employee_id.to_string(),
        pay_day,
    }
}

async fn payroll_exists(
    conn: &mut SqliteConnection,
    employee_id: &str,
    pay_day: NaiveDate,
) -> DbResult<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM payrolls WHERE employee_id = ?1 AND pay_day = ?2")
            .bind(employee_id)
            .bind(pay_day)
            .fetch_one(&mut *conn)
            .await?;

    Ok(count > 0)
}

/// Payrolls of `pay_day` already paid out.
pub(crate) async fn paid_on(conn: &mut SqliteConnection, pay_day: NaiveDate) -> DbResult<Vec<Payroll>> {
    let rows = sqlx::query_as::<_, Payroll>(&format!(
        "SELECT {PAYROLL_COLUMNS} FROM payrolls WHERE pay_day = ?1 AND payment_status = ?2 ORDER BY created_at"
    ))
    .bind(pay_day)
    .bind(PaymentStatus::Paid)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

async fn get_payroll(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Payroll>> {
    let payroll = sqlx::query_as::<_, Payroll>(&format!(
        "SELECT {PAYROLL_COLUMNS} FROM payrolls WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(payroll)
}

async fn insert_payroll(conn: &mut SqliteConnection, payroll: &Payroll) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO payrolls (
            id, employee_id, pay_day,
            commission_local, commission_reference, tip_local, tip_reference,
            consumption_deduction_local, payout_percent,
            total_payable_local, total_payable_reference, rate_used,
            payment_currency, payment_status, created_at, paid_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
        "#,
    )
    .bind(&payroll.id)
    .bind(&payroll.employee_id)
    .bind(payroll.pay_day)
    .bind(payroll.commission_local)
    .bind(payroll.commission_reference)
    .bind(payroll.tip_local)
    .bind(payroll.tip_reference)
    .bind(payroll.consumption_deduction_local)
    .bind(payroll.payout_percent)
    .bind(payroll.total_payable_local)
    .bind(payroll.total_payable_reference)
    .bind(payroll.rate_used)
    .bind(payroll.payment_currency)
    .bind(payroll.payment_status)
    .bind(payroll.created_at)
    .bind(payroll.paid_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::transaction::NewService;
    use barber_core::money::Money;
    use barber_core::rate::Rate;
    use rust_decimal::Decimal;

    fn may(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    struct Fixture {
        db: Database,
        employee_id: String,
        haircut_id: String,
        pomade_id: String,
    }

    async fn fixture() -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let employee = db.employees().create("Ana").await.unwrap();
        let haircut = db
            .service_catalog()
            .create("Haircut", Money::from_units(10), Money::from_units(400))
            .await
            .unwrap();
        let pomade = db
            .products()
            .create("Pomade", Money::new(125, 2), Money::from_units(50), 10)
            .await
            .unwrap();
        Fixture {
            db,
            employee_id: employee.id,
            haircut_id: haircut.id,
            pomade_id: pomade.id,
        }
    }

    async fn render(f: &Fixture, day: NaiveDate, charged: i64, tip: i64) {
        let tickets = f.db.transactions();
        let ticket = tickets
            .open_at("client", day.and_hms_opt(10, 0, 0).unwrap())
            .await
            .unwrap();
        tickets
            .add_service(
                &ticket.id,
                &NewService {
                    employee_id: f.employee_id.clone(),
                    service_id: f.haircut_id.clone(),
                    charged_local: Money::from_units(charged),
                    tip_local: Money::from_units(tip),
                    tip_reference: Money::zero(),
                },
            )
            .await
            .unwrap();
    }

    async fn consume(f: &Fixture, day: NaiveDate, quantity: i64) -> String {
        f.db.consumptions()
            .record_consumption(&f.employee_id, &f.pomade_id, quantity, day)
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_payroll_settles_pending_consumption() {
        let f = fixture().await;
        f.db.rates()
            .record_rate(may(2), Rate::new(Decimal::from(40)).unwrap())
            .await
            .unwrap();
        render(&f, may(2), 1000, 100).await;
        render(&f, may(3), 9999, 0).await;
        let old = consume(&f, may(1), 1).await;
        let new = consume(&f, may(2), 2).await;

        let payroll = f
            .db
            .payrolls()
            .compute_payroll(&f.employee_id, may(2), 60)
            .await
            .unwrap();

        assert_eq!(payroll.commission_local, Money::from_units(1000));
        assert_eq!(payroll.tip_local, Money::from_units(100));
        assert_eq!(payroll.consumption_deduction_local, Money::from_units(150));
        assert_eq!(payroll.total_payable_local, Money::from_units(570));
        assert_eq!(payroll.total_payable_reference, Money::new(1425, 2));
        assert_eq!(payroll.commission_reference, Money::from_units(25));
        assert_eq!(payroll.tip_reference, Money::new(25, 1));
        assert_eq!(payroll.payment_status, PaymentStatus::Pending);

        for id in [old, new] {
            let c = f.db.consumptions().get(&id).await.unwrap().unwrap();
            assert_eq!(c.status, ConsumptionStatus::Paid);
            assert_eq!(c.payroll_id.as_deref(), Some(payroll.id.as_str()));
        }
        assert!(f.db.consumptions().pending_for(&f.employee_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_second_payroll_is_rejected_without_side_effects() {
        let f = fixture().await;
        render(&f, may(2), 500, 0).await;
        let first = f
            .db
            .payrolls()
            .compute_payroll(&f.employee_id, may(2), 100)
            .await
            .unwrap();

        let late = consume(&f, may(2), 1).await;
        let err = f
            .db
            .payrolls()
            .compute_payroll(&f.employee_id, may(2), 100)
            .await
            .unwrap_err();

        assert!(matches!(err, PayrollError::Duplicate { .. }));
        assert_eq!(f.db.payrolls().for_day(may(2)).await.unwrap().len(), 1);
        let late = f.db.consumptions().get(&late).await.unwrap().unwrap();
        assert_eq!(late.status, ConsumptionStatus::Pending);
        assert!(late.payroll_id.is_none());
        assert!(f.db.payrolls().get(&first.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_storage_rejects_duplicate_insert() {
        let f = fixture().await;
        let payroll = f
            .db
            .payrolls()
            .compute_payroll(&f.employee_id, may(2), 100)
            .await
            .unwrap();

        let mut copy = payroll.clone();
        copy.id = Uuid::new_v4().to_string();
        let mut conn = f.db.pool().acquire().await.unwrap();
        let err = insert_payroll(&mut *conn, &copy).await.unwrap_err();
        assert!(err.is_unique_violation_on("payrolls"));
    }

    #[tokio::test]
    async fn test_payout_percent_clamped_on_store() {
        let f = fixture().await;
        render(&f, may(2), 100, 0).await;
        render(&f, may(3), 100, 0).await;

        let high = f
            .db
            .payrolls()
            .compute_payroll(&f.employee_id, may(2), 150)
            .await
            .unwrap();
        let low = f
            .db
            .payrolls()
            .compute_payroll(&f.employee_id, may(3), 0)
            .await
            .unwrap();

        let high = f.db.payrolls().get(&high.id).await.unwrap().unwrap();
        let low = f.db.payrolls().get(&low.id).await.unwrap().unwrap();
        assert_eq!(high.payout_percent, 100);
        assert_eq!(low.payout_percent, 1);
        assert_eq!(low.total_payable_local, Money::from_units(1));
    }

    #[tokio::test]
    async fn test_negative_payable_is_stored() {
        let f = fixture().await;
        consume(&f, may(1), 1).await;

        let payroll = f
            .db
            .payrolls()
            .compute_payroll(&f.employee_id, may(2), 100)
            .await
            .unwrap();

        let stored = f.db.payrolls().get(&payroll.id).await.unwrap().unwrap();
        assert_eq!(stored.total_payable_local, Money::from_units(-50));
        assert!(stored.rate_used.is_none());
        assert!(stored.total_payable_reference.is_zero());
    }

    #[tokio::test]
    async fn test_delete_reverts_consumption_and_stock() {
        let f = fixture().await;
        let taken = consume(&f, may(1), 3).await;
        assert_eq!(f.db.products().get(&f.pomade_id).await.unwrap().unwrap().stock, 7);

        let payroll = f
            .db
            .payrolls()
            .compute_payroll(&f.employee_id, may(2), 100)
            .await
            .unwrap();
        f.db.payrolls().delete_payroll(&payroll.id).await.unwrap();

        let taken = f.db.consumptions().get(&taken).await.unwrap().unwrap();
        assert_eq!(taken.status, ConsumptionStatus::Pending);
        assert!(taken.payroll_id.is_none());
        assert_eq!(f.db.products().get(&f.pomade_id).await.unwrap().unwrap().stock, 10);
        assert!(f.db.payrolls().get(&payroll.id).await.unwrap().is_none());

        // The day is free again
        assert!(f
            .db
            .payrolls()
            .compute_payroll(&f.employee_id, may(2), 100)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_mark_paid_once() {
        let f = fixture().await;
        let payroll = f
            .db
            .payrolls()
            .compute_payroll(&f.employee_id, may(2), 100)
            .await
            .unwrap();

        let paid = f
            .db
            .payrolls()
            .mark_paid(&payroll.id, PaymentCurrency::Reference)
            .await
            .unwrap();
        assert!(paid.is_paid());
        assert_eq!(paid.payment_currency, PaymentCurrency::Reference);
        assert!(paid.paid_at.is_some());

        let again = f.db.payrolls().mark_paid(&payroll.id, PaymentCurrency::Local).await;
        assert!(matches!(again, Err(DbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_settled_consumption_keeps_its_payroll() {
        let f = fixture().await;
        let earlier = consume(&f, may(1), 1).await;
        let first = f
            .db
            .payrolls()
            .compute_payroll(&f.employee_id, may(1), 100)
            .await
            .unwrap();

        let later = consume(&f, may(2), 2).await;
        let second = f
            .db
            .payrolls()
            .compute_payroll(&f.employee_id, may(2), 100)
            .await
            .unwrap();

        assert_eq!(second.consumption_deduction_local, Money::from_units(100));
        let earlier = f.db.consumptions().get(&earlier).await.unwrap().unwrap();
        assert_eq!(earlier.payroll_id.as_deref(), Some(first.id.as_str()));
        assert_eq!(earlier.status, ConsumptionStatus::Paid);
        let later = f.db.consumptions().get(&later).await.unwrap().unwrap();
        assert_eq!(later.payroll_id.as_deref(), Some(second.id.as_str()));
        assert_eq!(f.db.consumptions().for_payroll(&first.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_settling_a_non_pending_consumption_fails() {
        let f = fixture().await;
        let taken = consume(&f, may(1), 1).await;
        let payroll = f
            .db
            .payrolls()
            .compute_payroll(&f.employee_id, may(1), 100)
            .await
            .unwrap();

        let mut tx = begin_write(f.db.pool()).await.unwrap();
        let err = settle_consumption(&mut *tx, &taken, "other-payroll")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
        drop(tx);

        let taken = f.db.consumptions().get(&taken).await.unwrap().unwrap();
        assert_eq!(taken.payroll_id.as_deref(), Some(payroll.id.as_str()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_payrolls_fail_as_duplicates() {
        let path = std::env::temp_dir().join(format!("barber-payroll-{}.db", Uuid::new_v4()));
        let db = Database::new(DbConfig::new(path.clone()).max_connections(8))
            .await
            .unwrap();
        let employee = db.employees().create("Ana").await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let payrolls = db.payrolls();
            let employee_id = employee.id.clone();
            handles.push(tokio::spawn(async move {
                payrolls.compute_payroll(&employee_id, may(2), 100).await
            }));
        }

        let mut created = 0;
        let mut duplicates = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(PayrollError::Duplicate { .. }) => duplicates += 1,
                Err(other) => panic!("unexpected payroll error: {other}"),
            }
        }

        assert_eq!(created, 1);
        assert_eq!(duplicates, 7);
        assert_eq!(db.payrolls().for_day(may(2)).await.unwrap().len(), 1);

        db.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }

    #[tokio::test]
    async fn test_unknown_employee() {
        let f = fixture().await;
        let err = f
            .db
            .payrolls()
            .compute_payroll("ghost", may(2), 100)
            .await
            .unwrap_err();
        assert!(matches!(err, PayrollError::EmployeeNotFound(_)));
    }
}
