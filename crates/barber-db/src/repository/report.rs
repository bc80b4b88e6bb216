//! # Report Repository
//!
//! Generates, stores and reads the one-per-day financial summary.
//!
//! ## generate_report
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  report for day exists?  ── yes, no force ──►  AlreadyExists            │
//! │         │                                      (stored report intact)   │
//! │         ▼                                                               │
//! │  BEGIN IMMEDIATE                                                        │
//! │    rate of the day (may be absent)                                      │
//! │    paid payrolls · tickets of the day · completed services · sales      │
//! │    every line of the tickets closed on the day                          │
//! │    barber_core::reconcile::reconcile_day                                │
//! │    force? DELETE old report                                             │
//! │    INSERT report (+ snapshot JSON)                                      │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbResult, ReportError};
use crate::repository::begin_write;
use crate::repository::payroll::paid_on;
use crate::repository::rate::effective_rate_on;
use crate::repository::transaction::{
    completed_services_on, sales_of_tickets_closed_on, sales_on, services_of_tickets_closed_on,
    tickets_for_day,
};
use barber_core::day::now_local;
use barber_core::reconcile::{reconcile_day, DayActivity};
use barber_core::DailyReport;

const REPORT_COLUMNS: &str = r#"
    id, report_day, generated_at, rate_used,
    payroll_paid_count, payroll_local, payroll_reference,
    services_count, products_sold_count, transactions_count,
    revenue_local, revenue_reference, balance_local, balance_reference, summary
"#;

/// Repository for daily reports.
#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    /// Reconciles `day` and stores the report.
    ///
    /// An existing report is only replaced when `force_replace` is set;
    /// otherwise [`ReportError::AlreadyExists`] and nothing changes.
    pub async fn generate_report(
        &self,
        day: NaiveDate,
        force_replace: bool,
    ) -> Result<DailyReport, ReportError> {
        {
            let mut conn = self.pool.acquire().await?;
            if report_exists(&mut *conn, day).await? && !force_replace {
                return Err(ReportError::AlreadyExists(day));
            }
        }

        let mut tx = begin_write(&self.pool).await?;

        let rate = effective_rate_on(&mut *tx, day).await?;
        let payrolls = paid_on(&mut *tx, day).await?;
        let transactions = tickets_for_day(&mut *tx, day).await?;
        let services = completed_services_on(&mut *tx, day).await?;
        let product_sales = sales_on(&mut *tx, day).await?;
        let ticket_services = services_of_tickets_closed_on(&mut *tx, day).await?;
        let ticket_sales = sales_of_tickets_closed_on(&mut *tx, day).await?;

        if rate.is_none() {
            warn!(%day, "No exchange rate for report day, reference revenue degraded to zero");
        }

        let reconciliation = reconcile_day(DayActivity {
            day,
            rate,
            payrolls: &payrolls,
            transactions: &transactions,
            services: &services,
            product_sales: &product_sales,
            ticket_services: &ticket_services,
            ticket_sales: &ticket_sales,
        });
        let report = reconciliation.into_report(Uuid::new_v4().to_string(), now_local());
        let summary = serde_json::to_string(&report.summary)?;

        if force_replace {
            let replaced = sqlx::query("DELETE FROM daily_reports WHERE report_day = ?1")
                .bind(day)
                .execute(&mut *tx)
                .await?
                .rows_affected();
            if replaced > 0 {
                debug!(%day, "Replacing existing report");
            }
        }

        insert_report(&mut *tx, &report, &summary)
            .await
            .map_err(|err| {
                if err.is_unique_violation_on("daily_reports") {
                    ReportError::AlreadyExists(day)
                } else {
                    ReportError::Storage(err)
                }
            })?;

        tx.commit().await?;

        info!(
            %day,
            revenue_local = %report.revenue_local,
            revenue_reference = %report.revenue_reference,
            payroll_local = %report.payroll_local,
            payroll_reference = %report.payroll_reference,
            transactions = report.transactions_count,
            "Daily report generated"
        );

        Ok(report)
    }

    pub async fn get_by_day(&self, day: NaiveDate) -> DbResult<Option<DailyReport>> {
        let report = sqlx::query_as::<_, DailyReport>(&format!(
            "SELECT {REPORT_COLUMNS} FROM daily_reports WHERE report_day = ?1"
        ))
        .bind(day)
        .fetch_optional(&self.pool)
        .await?;

        Ok(report)
    }

    /// Deletes the report of `day`. Returns whether one existed.
    pub async fn delete_report(&self, day: NaiveDate) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM daily_reports WHERE report_day = ?1")
            .bind(day)
            .execute(&self.pool)
            .await?;

        debug!(%day, deleted = result.rows_affected(), "Deleted report");
        Ok(result.rows_affected() > 0)
    }
}

async fn report_exists(conn: &mut SqliteConnection, day: NaiveDate) -> DbResult<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM daily_reports WHERE report_day = ?1")
        .bind(day)
        .fetch_one(&mut *conn)
        .await?;

    Ok(count > 0)
}

async fn insert_report(conn: &mut SqliteConnection, report: &DailyReport, summary: &str) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO daily_reports (
            id, report_day, generated_at, rate_used,
            payroll_paid_count, payroll_local, payroll_reference,
            services_count, products_sold_count, transactions_count,
            revenue_local, revenue_reference, balance_local, balance_reference, summary
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
        "#,
    )
    .bind(&report.id)
    .bind(report.report_day)
    .bind(report.generated_at)
    .bind(report.rate_used)
    .bind(report.payroll_paid_count)
    .bind(report.payroll_local)
    .bind(report.payroll_reference)
    .bind(report.services_count)
    .bind(report.products_sold_count)
    .bind(report.transactions_count)
    .bind(report.revenue_local)
    .bind(report.revenue_reference)
    .bind(report.balance_local)
    .bind(report.balance_reference)
    .bind(summary)
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
    use barber_core::reconcile::AllocationRule;
    use barber_core::{PaymentCurrency, Transaction, TransactionPayment};
    use rust_decimal::Decimal;

    fn may(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    struct Shop {
        db: Database,
        haircut_id: String,
        product_id: String,
    }

    async fn shop(rate: Option<i64>) -> Shop {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        if let Some(rate) = rate {
            db.rates()
                .record_rate(may(2), Rate::new(Decimal::from(rate)).unwrap())
                .await
                .unwrap();
        }
        let haircut = db
            .service_catalog()
            .create("Haircut", Money::from_units(10), Money::from_units(400))
            .await
            .unwrap();
        let product = db
            .products()
            .create("Hair spray", Money::new(1250, 2), Money::from_units(500), 50)
            .await
            .unwrap();
        Shop {
            db,
            haircut_id: haircut.id,
            product_id: product.id,
        }
    }

    async fn ticket(shop: &Shop, employee_id: &str, charged: Money, products: i64) -> Transaction {
        let repo = shop.db.transactions();
        let ticket = repo
            .open_at("client", may(2).and_hms_opt(10, 0, 0).unwrap())
            .await
            .unwrap();
        repo.add_service(
            &ticket.id,
            &NewService {
                employee_id: employee_id.to_string(),
                service_id: shop.haircut_id.clone(),
                charged_local: charged,
                tip_local: Money::zero(),
                tip_reference: Money::zero(),
            },
        )
        .await
        .unwrap();
        if products > 0 {
            repo.add_product_sale(&ticket.id, &shop.product_id, products)
                .await
                .unwrap();
        }
        ticket
    }

    async fn close(shop: &Shop, ticket: &Transaction, paid_local: i64, paid_reference: i64) {
        shop.db
            .transactions()
            .close_at(
                &ticket.id,
                &TransactionPayment {
                    paid_local: Money::from_units(paid_local),
                    paid_reference: Money::from_units(paid_reference),
                    payment_methods: vec!["cash".into()],
                    payment_entities: Vec::new(),
                    reference_number: None,
                },
                may(2).and_hms_opt(18, 0, 0).unwrap(),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_mixed_and_reference_only_allocation() {
        let shop = shop(Some(40)).await;
        let barber = shop.db.employees().create("Ana").await.unwrap();

        let mixed = ticket(&shop, &barber.id, Money::from_units(2500), 1).await;
        close(&shop, &mixed, 2500, 10).await;
        let reference_only = ticket(&shop, &barber.id, Money::from_units(2500), 1).await;
        close(&shop, &reference_only, 0, 12).await;

        let report = shop.db.reports().generate_report(may(2), false).await.unwrap();

        // 2500 + 12 × 1/6 × 40
        assert_eq!(report.revenue_local.round_display(), Money::from_units(2580));
        // 10 × 5/6 + 12 × 5/6
        assert_eq!(report.revenue_reference.round_display(), Money::new(1833, 2));
        assert_eq!(report.transactions_count, 2);
        assert_eq!(report.services_count, 2);
        assert_eq!(report.products_sold_count, 2);
        assert_eq!(report.balance_local, report.revenue_local);

        let rules: Vec<AllocationRule> = report.summary.transactions.iter().map(|t| t.rule).collect();
        assert!(rules.contains(&AllocationRule::Mixed));
        assert!(rules.contains(&AllocationRule::ReferenceOnly));
        assert_eq!(report.summary.payment_methods.get("cash"), Some(&2));
    }

    #[tokio::test]
    async fn test_payroll_reference_floored_per_row() {
        let shop = shop(Some(40)).await;
        let payrolls = shop.db.payrolls();

        // 439.60 / 40 = 10.99 and 239.60 / 40 = 5.99
        for (name, charged) in [("Ana", 43960), ("Luis", 23960)] {
            let barber = shop.db.employees().create(name).await.unwrap();
            ticket(&shop, &barber.id, Money::new(charged, 2), 0).await;
            let payroll = payrolls.compute_payroll(&barber.id, may(2), 100).await.unwrap();
            payrolls
                .mark_paid(&payroll.id, PaymentCurrency::Reference)
                .await
                .unwrap();
        }

        let report = shop.db.reports().generate_report(may(2), false).await.unwrap();

        assert_eq!(report.payroll_paid_count, 2);
        assert_eq!(report.payroll_reference, Money::from_units(15));
        assert!(report.payroll_local.is_zero());
    }

    #[tokio::test]
    async fn test_open_ticket_estimate_and_loose_products() {
        let shop = shop(Some(40)).await;
        let barber = shop.db.employees().create("Ana").await.unwrap();

        // Still open: 400 of services (10 reference) and 500 of products
        let open = ticket(&shop, &barber.id, Money::from_units(400), 1).await;
        shop.db
            .transactions()
            .add_tip(&open.id, &barber.id, Money::from_units(30), Money::zero())
            .await
            .unwrap();

        let report = shop.db.reports().generate_report(may(2), false).await.unwrap();

        // 400 × 500/900 + 500
        assert_eq!(report.revenue_local.round_display(), Money::new(72222, 2));
        // (400 − 222.22…) / 40
        assert_eq!(report.revenue_reference.round_display(), Money::new(444, 2));
        assert_eq!(report.transactions_count, 0);
        assert_eq!(report.services_count, 1);
        assert_eq!(report.summary.tips_local, Money::from_units(30));
        assert!(report.summary.products[0].counted_unconditionally);
    }

    #[tokio::test]
    async fn test_second_generation_requires_force() {
        let shop = shop(Some(40)).await;
        let barber = shop.db.employees().create("Ana").await.unwrap();
        let first_ticket = ticket(&shop, &barber.id, Money::from_units(800), 0).await;
        close(&shop, &first_ticket, 800, 0).await;

        let reports = shop.db.reports();
        let first = reports.generate_report(may(2), false).await.unwrap();

        let again = reports.generate_report(may(2), false).await;
        assert!(matches!(again, Err(ReportError::AlreadyExists(day)) if day == may(2)));

        let stored = reports.get_by_day(may(2)).await.unwrap().unwrap();
        assert_eq!(stored.id, first.id);
        assert_eq!(stored.revenue_local, Money::from_units(800));
        assert_eq!(stored.summary, first.summary);

        let late = ticket(&shop, &barber.id, Money::from_units(200), 0).await;
        close(&shop, &late, 200, 0).await;

        let replaced = reports.generate_report(may(2), true).await.unwrap();
        assert_ne!(replaced.id, first.id);
        assert_eq!(replaced.revenue_local, Money::from_units(1000));
        assert_eq!(
            reports.get_by_day(may(2)).await.unwrap().unwrap().id,
            replaced.id
        );
    }

    #[tokio::test]
    async fn test_missing_rate_is_flagged() {
        let shop = shop(None).await;
        let barber = shop.db.employees().create("Ana").await.unwrap();
        let t = ticket(&shop, &barber.id, Money::from_units(300), 1).await;
        close(&shop, &t, 0, 10).await;

        let report = shop.db.reports().generate_report(may(2), false).await.unwrap();

        assert!(report.rate_used.is_none());
        assert!(report.summary.rate_missing);
        // Products share of a reference payment cannot be converted
        assert!(report.revenue_local.is_zero());
        assert_eq!(report.revenue_reference.round_display(), Money::new(375, 2));
    }

    #[tokio::test]
    async fn test_ticket_closed_after_midnight_is_allocated_once() {
        let shop = shop(Some(40)).await;
        shop.db
            .rates()
            .record_rate(may(3), Rate::new(Decimal::from(40)).unwrap())
            .await
            .unwrap();
        let barber = shop.db.employees().create("Ana").await.unwrap();
        let repo = shop.db.transactions();

        let late = repo
            .open_at("client", may(2).and_hms_opt(23, 30, 0).unwrap())
            .await
            .unwrap();
        repo.add_service(
            &late.id,
            &NewService {
                employee_id: barber.id.clone(),
                service_id: shop.haircut_id.clone(),
                charged_local: Money::from_units(2500),
                tip_local: Money::zero(),
                tip_reference: Money::zero(),
            },
        )
        .await
        .unwrap();
        repo.add_product_sale(&late.id, &shop.product_id, 1).await.unwrap();
        repo.close_at(
            &late.id,
            &TransactionPayment {
                paid_local: Money::from_units(2500),
                paid_reference: Money::from_units(10),
                payment_methods: vec!["cash".into()],
                payment_entities: Vec::new(),
                reference_number: None,
            },
            may(3).and_hms_opt(0, 15, 0).unwrap(),
        )
        .await
        .unwrap();

        let reports = shop.db.reports();
        let opening_day = reports.generate_report(may(2), false).await.unwrap();
        let closing_day = reports.generate_report(may(3), false).await.unwrap();

        // The lines are dated May 2 but belong to the May 3 close
        assert!(opening_day.revenue_local.is_zero());
        assert!(opening_day.revenue_reference.is_zero());
        assert!(!opening_day.summary.products[0].counted_unconditionally);
        assert_eq!(opening_day.transactions_count, 0);

        assert_eq!(closing_day.transactions_count, 1);
        assert_eq!(closing_day.summary.transactions[0].rule, AllocationRule::Mixed);
        assert_eq!(closing_day.revenue_local, Money::from_units(2500));
        assert_eq!(closing_day.revenue_reference.round_display(), Money::new(833, 2));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_generation_yields_one_report() {
        let path = std::env::temp_dir().join(format!("barber-report-{}.db", Uuid::new_v4()));
        let db = Database::new(DbConfig::new(path.clone()).max_connections(6))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..6 {
            let reports = db.reports();
            handles.push(tokio::spawn(async move {
                reports.generate_report(may(2), false).await
            }));
        }

        let mut created = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(ReportError::AlreadyExists(_)) => rejected += 1,
                Err(other) => panic!("unexpected report error: {other}"),
            }
        }

        assert_eq!(created, 1);
        assert_eq!(rejected, 5);

        db.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }

    #[tokio::test]
    async fn test_delete_report() {
        let shop = shop(None).await;
        let reports = shop.db.reports();
        reports.generate_report(may(2), false).await.unwrap();

        assert!(reports.delete_report(may(2)).await.unwrap());
        assert!(!reports.delete_report(may(2)).await.unwrap());
        assert!(reports.get_by_day(may(2)).await.unwrap().is_none());
    }
}
