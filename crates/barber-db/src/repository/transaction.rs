//! # Transaction Repository
//!
//! Client tickets: rendered services, independent tips and product sales,
//! closed with a payment in one or both currencies.
//!
//! ## Ticket Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. OPEN                                                                │
//! │     └── open(client) → Transaction { status: Open }                     │
//! │                                                                         │
//! │  2. ADD LINES (ticket must be open)                                     │
//! │     └── add_service()       → ServiceRendered { completed }             │
//! │     └── add_tip()           → ServiceRendered { service_id: None }      │
//! │     └── add_product_sale()  → ProductSale  (+ stock decrement)          │
//! │     └── cancel_service()    → ServiceRendered { cancelled }             │
//! │     └── running totals refreshed after every change                     │
//! │                                                                         │
//! │  3. CLOSE                                                               │
//! │     └── close(payment) → Transaction { status: Closed, closed_day }     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Running Totals
//! Services are billed in the reference currency, products in local:
//! - `total_reference = Σ service charges / rate of the ticket's day`
//! - `total_local     = Σ product sales`
//!
//! Without a rate for that day nothing can be converted and the whole
//! ticket sits in `total_local`.
//!
//! All lines of a ticket are dated by the day it was opened.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::begin_write;
use crate::repository::product::{adjust_stock, get_product};
use crate::repository::rate::effective_rate_on;
use barber_core::day::{local_day_of, now_local};
use barber_core::money::Money;
use barber_core::validation::{validate_amount, validate_quantity};
use barber_core::{
    CoreError, ProductSale, ServiceRendered, ServiceStatus, Transaction, TransactionPayment,
    TransactionStatus, ValidationError,
};

const TRANSACTION_COLUMNS: &str = r#"
    id, client_id, opened_at, closed_at, closed_day, status,
    total_local, total_reference, paid_local, paid_reference,
    payment_methods, payment_entities, reference_number
"#;

const SERVICE_COLUMNS: &str = r#"
    id, employee_id, service_id, transaction_id, day,
    charged_local, tip_local, tip_reference, status, created_at
"#;

const SALE_COLUMNS: &str = r#"
    id, transaction_id, product_id, day, quantity, unit_price_local, total_local, created_at
"#;

/// A service performed on a ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewService {
    pub employee_id: String,
    /// Catalog entry performed.
    pub service_id: String,
    pub charged_local: Money,
    #[serde(default)]
    pub tip_local: Money,
    #[serde(default)]
    pub tip_reference: Money,
}

/// Repository for tickets and their lines.
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    pool: SqlitePool,
}

impl TransactionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TransactionRepository { pool }
    }

    /// Opens a ticket now.
    pub async fn open(&self, client_id: &str) -> DbResult<Transaction> {
        self.open_at(client_id, now_local()).await
    }

    /// Opens a ticket at a given local time (back-dated entry).
    pub async fn open_at(&self, client_id: &str, opened_at: NaiveDateTime) -> DbResult<Transaction> {
        let ticket = Transaction {
            id: Uuid::new_v4().to_string(),
            client_id: client_id.to_string(),
            opened_at,
            closed_at: None,
            closed_day: None,
            status: TransactionStatus::Open,
            total_local: Money::zero(),
            total_reference: Money::zero(),
            paid_local: Money::zero(),
            paid_reference: Money::zero(),
            payment_methods: Vec::new(),
            payment_entities: Vec::new(),
            reference_number: None,
        };

        debug!(id = %ticket.id, client_id = %client_id, "Opening transaction");

        sqlx::query(
            r#"
            INSERT INTO transactions (id, client_id, opened_at, status)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&ticket.id)
        .bind(&ticket.client_id)
        .bind(ticket.opened_at)
        .bind(ticket.status)
        .execute(&self.pool)
        .await?;

        Ok(ticket)
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Transaction>> {
        let mut conn = self.pool.acquire().await?;
        get_transaction(&mut *conn, id).await
    }

    /// Service and tip lines of a ticket, any status.
    pub async fn services(&self, transaction_id: &str) -> DbResult<Vec<ServiceRendered>> {
        let mut conn = self.pool.acquire().await?;
        services_of(&mut *conn, transaction_id).await
    }

    pub async fn product_sales(&self, transaction_id: &str) -> DbResult<Vec<ProductSale>> {
        let mut conn = self.pool.acquire().await?;
        sales_of(&mut *conn, transaction_id).await
    }

    /// Records a completed service on an open ticket.
    pub async fn add_service(
        &self,
        transaction_id: &str,
        service: &NewService,
    ) -> DbResult<ServiceRendered> {
        if service.service_id.trim().is_empty() || service.service_id.trim() == "0" {
            return Err(CoreError::from(ValidationError::Required {
                field: "service_id".to_string(),
            })
            .into());
        }
        validate_amount("charged_local", service.charged_local).map_err(CoreError::from)?;
        validate_amount("tip_local", service.tip_local).map_err(CoreError::from)?;
        validate_amount("tip_reference", service.tip_reference).map_err(CoreError::from)?;

        let mut tx = begin_write(&self.pool).await?;
        let ticket = require_open(&mut *tx, transaction_id).await?;
        require_employee(&mut *tx, &service.employee_id).await?;

        let offering: Option<String> =
            sqlx::query_scalar("SELECT id FROM service_offerings WHERE id = ?1")
                .bind(&service.service_id)
                .fetch_optional(&mut *tx)
                .await?;
        if offering.is_none() {
            return Err(DbError::not_found("Service", &service.service_id));
        }

        let row = ServiceRendered {
            id: Uuid::new_v4().to_string(),
            employee_id: service.employee_id.clone(),
            service_id: Some(service.service_id.clone()),
            transaction_id: ticket.id.clone(),
            day: local_day_of(ticket.opened_at),
            charged_local: service.charged_local,
            tip_local: service.tip_local,
            tip_reference: service.tip_reference,
            status: ServiceStatus::Completed,
            created_at: now_local(),
        };

        insert_service(&mut *tx, &row).await?;
        refresh_totals(&mut *tx, &ticket).await?;
        tx.commit().await?;

        debug!(
            id = %row.id,
            transaction_id = %row.transaction_id,
            employee_id = %row.employee_id,
            charged = %row.charged_local,
            "Added service"
        );

        Ok(row)
    }

    /// Records a tip with no underlying service.
    pub async fn add_tip(
        &self,
        transaction_id: &str,
        employee_id: &str,
        tip_local: Money,
        tip_reference: Money,
    ) -> DbResult<ServiceRendered> {
        validate_amount("tip_local", tip_local).map_err(CoreError::from)?;
        validate_amount("tip_reference", tip_reference).map_err(CoreError::from)?;
        if tip_local.is_zero() && tip_reference.is_zero() {
            return Err(CoreError::from(ValidationError::MustBePositive {
                field: "tip".to_string(),
            })
            .into());
        }

        let mut tx = begin_write(&self.pool).await?;
        let ticket = require_open(&mut *tx, transaction_id).await?;
        require_employee(&mut *tx, employee_id).await?;

        let row = ServiceRendered {
            id: Uuid::new_v4().to_string(),
            employee_id: employee_id.to_string(),
            service_id: None,
            transaction_id: ticket.id.clone(),
            day: local_day_of(ticket.opened_at),
            charged_local: Money::zero(),
            tip_local,
            tip_reference,
            status: ServiceStatus::Completed,
            created_at: now_local(),
        };

        insert_service(&mut *tx, &row).await?;
        tx.commit().await?;

        debug!(id = %row.id, employee_id = %employee_id, %tip_local, %tip_reference, "Added tip");

        Ok(row)
    }

    /// Sells `quantity` units of a product on an open ticket.
    ///
    /// The unit price is frozen at the product's current local price. The
    /// stock decrement and the sale row commit together or not at all.
    pub async fn add_product_sale(
        &self,
        transaction_id: &str,
        product_id: &str,
        quantity: i64,
    ) -> DbResult<ProductSale> {
        validate_quantity(quantity).map_err(CoreError::from)?;

        let mut tx = begin_write(&self.pool).await?;
        let ticket = require_open(&mut *tx, transaction_id).await?;
        let product = get_product(&mut *tx, product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

        adjust_stock(&mut *tx, product_id, -quantity).await?;

        let sale = ProductSale {
            id: Uuid::new_v4().to_string(),
            transaction_id: ticket.id.clone(),
            product_id: product.id.clone(),
            day: local_day_of(ticket.opened_at),
            quantity,
            unit_price_local: product.price_local,
            total_local: product.price_local.multiply_quantity(quantity),
            created_at: now_local(),
        };

        sqlx::query(
            r#"
            INSERT INTO product_sales (
                id, transaction_id, product_id, day,
                quantity, unit_price_local, total_local, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.transaction_id)
        .bind(&sale.product_id)
        .bind(sale.day)
        .bind(sale.quantity)
        .bind(sale.unit_price_local)
        .bind(sale.total_local)
        .bind(sale.created_at)
        .execute(&mut *tx)
        .await?;

        refresh_totals(&mut *tx, &ticket).await?;
        tx.commit().await?;

        debug!(
            id = %sale.id,
            transaction_id = %sale.transaction_id,
            product_id = %sale.product_id,
            quantity,
            "Added product sale"
        );

        Ok(sale)
    }

    /// Cancels a service line of an open ticket.
    pub async fn cancel_service(&self, service_rendered_id: &str) -> DbResult<()> {
        let mut tx = begin_write(&self.pool).await?;

        let transaction_id: Option<String> =
            sqlx::query_scalar("SELECT transaction_id FROM services_rendered WHERE id = ?1")
                .bind(service_rendered_id)
                .fetch_optional(&mut *tx)
                .await?;
        let transaction_id =
            transaction_id.ok_or_else(|| DbError::not_found("ServiceRendered", service_rendered_id))?;

        let ticket = require_open(&mut *tx, &transaction_id).await?;

        sqlx::query("UPDATE services_rendered SET status = ?2 WHERE id = ?1")
            .bind(service_rendered_id)
            .bind(ServiceStatus::Cancelled)
            .execute(&mut *tx)
            .await?;

        refresh_totals(&mut *tx, &ticket).await?;
        tx.commit().await?;

        debug!(id = %service_rendered_id, transaction_id = %transaction_id, "Cancelled service");
        Ok(())
    }

    /// Closes a ticket now with the given payment.
    pub async fn close(&self, id: &str, payment: &TransactionPayment) -> DbResult<Transaction> {
        self.close_at(id, payment, now_local()).await
    }

    /// Closes a ticket at a given local time. Its revenue belongs to the
    /// calendar day of `closed_at`.
    pub async fn close_at(
        &self,
        id: &str,
        payment: &TransactionPayment,
        closed_at: NaiveDateTime,
    ) -> DbResult<Transaction> {
        payment.validate().map_err(CoreError::from)?;

        let mut tx = begin_write(&self.pool).await?;
        require_open(&mut *tx, id).await?;

        sqlx::query(
            r#"
            UPDATE transactions SET
                status = ?2,
                closed_at = ?3,
                closed_day = ?4,
                paid_local = ?5,
                paid_reference = ?6,
                payment_methods = ?7,
                payment_entities = ?8,
                reference_number = ?9
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(TransactionStatus::Closed)
        .bind(closed_at)
        .bind(local_day_of(closed_at))
        .bind(payment.paid_local)
        .bind(payment.paid_reference)
        .bind(Json(&payment.payment_methods))
        .bind(Json(&payment.payment_entities))
        .bind(payment.reference_number.as_deref())
        .execute(&mut *tx)
        .await?;

        let ticket = get_transaction(&mut *tx, id)
            .await?
            .ok_or_else(|| CoreError::TransactionNotFound(id.to_string()))?;
        tx.commit().await?;

        info!(
            id = %id,
            paid_local = %payment.paid_local,
            paid_reference = %payment.paid_reference,
            "Closed transaction"
        );

        Ok(ticket)
    }
}

// =============================================================================
// Connection-level helpers
// =============================================================================

pub(crate) async fn get_transaction(
    conn: &mut SqliteConnection,
    id: &str,
) -> DbResult<Option<Transaction>> {
    let ticket = sqlx::query_as::<_, Transaction>(&format!(
        "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(ticket)
}

async fn require_open(conn: &mut SqliteConnection, id: &str) -> DbResult<Transaction> {
    let ticket = get_transaction(conn, id)
        .await?
        .ok_or_else(|| CoreError::TransactionNotFound(id.to_string()))?;

    if ticket.is_closed() {
        return Err(CoreError::InvalidTransactionStatus {
            transaction_id: id.to_string(),
            current_status: "closed".to_string(),
        }
        .into());
    }

    Ok(ticket)
}

pub(crate) async fn require_employee(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
    let found: Option<String> = sqlx::query_scalar("SELECT id FROM employees WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match found {
        Some(_) => Ok(()),
        None => Err(CoreError::EmployeeNotFound(id.to_string()).into()),
    }
}

async fn insert_service(conn: &mut SqliteConnection, row: &ServiceRendered) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO services_rendered (
            id, employee_id, service_id, transaction_id, day,
            charged_local, tip_local, tip_reference, status, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&row.id)
    .bind(&row.employee_id)
    .bind(row.service_id.as_deref())
    .bind(&row.transaction_id)
    .bind(row.day)
    .bind(row.charged_local)
    .bind(row.tip_local)
    .bind(row.tip_reference)
    .bind(row.status)
    .bind(row.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn services_of(
    conn: &mut SqliteConnection,
    transaction_id: &str,
) -> DbResult<Vec<ServiceRendered>> {
    let rows = sqlx::query_as::<_, ServiceRendered>(&format!(
        "SELECT {SERVICE_COLUMNS} FROM services_rendered WHERE transaction_id = ?1 ORDER BY created_at"
    ))
    .bind(transaction_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

async fn sales_of(conn: &mut SqliteConnection, transaction_id: &str) -> DbResult<Vec<ProductSale>> {
    let rows = sqlx::query_as::<_, ProductSale>(&format!(
        "SELECT {SALE_COLUMNS} FROM product_sales WHERE transaction_id = ?1 ORDER BY created_at"
    ))
    .bind(transaction_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

/// Recomputes `total_local` / `total_reference` of an open ticket.
async fn refresh_totals(conn: &mut SqliteConnection, ticket: &Transaction) -> DbResult<()> {
    let rate = effective_rate_on(conn, local_day_of(ticket.opened_at)).await?;

    let services_local: Money = services_of(conn, &ticket.id)
        .await?
        .iter()
        .filter(|s| s.is_completed() && !s.is_independent_tip())
        .map(|s| s.charged_local)
        .sum();
    let products_local: Money = sales_of(conn, &ticket.id)
        .await?
        .iter()
        .map(|s| s.total_local)
        .sum();

    let (total_local, total_reference) = match rate {
        Some(rate) => (products_local, rate.to_reference(services_local)),
        None => (services_local + products_local, Money::zero()),
    };

    sqlx::query("UPDATE transactions SET total_local = ?2, total_reference = ?3 WHERE id = ?1")
        .bind(&ticket.id)
        .bind(total_local)
        .bind(total_reference)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

// =============================================================================
// Day gathering (reports and payroll)
// =============================================================================

/// Completed services and tips of `day`, all employees.
pub(crate) async fn completed_services_on(
    conn: &mut SqliteConnection,
    day: NaiveDate,
) -> DbResult<Vec<ServiceRendered>> {
    let rows = sqlx::query_as::<_, ServiceRendered>(&format!(
        "SELECT {SERVICE_COLUMNS} FROM services_rendered WHERE day = ?1 AND status = ?2 ORDER BY created_at"
    ))
    .bind(day)
    .bind(ServiceStatus::Completed)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

/// Completed services and tips of one employee on `day`.
pub(crate) async fn completed_services_for(
    conn: &mut SqliteConnection,
    employee_id: &str,
    day: NaiveDate,
) -> DbResult<Vec<ServiceRendered>> {
    let rows = sqlx::query_as::<_, ServiceRendered>(&format!(
        r#"
        SELECT {SERVICE_COLUMNS} FROM services_rendered
        WHERE employee_id = ?1 AND day = ?2 AND status = ?3
        ORDER BY created_at
        "#
    ))
    .bind(employee_id)
    .bind(day)
    .bind(ServiceStatus::Completed)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

pub(crate) async fn sales_on(conn: &mut SqliteConnection, day: NaiveDate) -> DbResult<Vec<ProductSale>> {
    let rows = sqlx::query_as::<_, ProductSale>(&format!(
        "SELECT {SALE_COLUMNS} FROM product_sales WHERE day = ?1 ORDER BY created_at"
    ))
    .bind(day)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

/// Completed lines of the tickets closed on `day`, whatever day they are
/// dated. A ticket closed after midnight still carries its itemization.
pub(crate) async fn services_of_tickets_closed_on(
    conn: &mut SqliteConnection,
    day: NaiveDate,
) -> DbResult<Vec<ServiceRendered>> {
    let rows = sqlx::query_as::<_, ServiceRendered>(&format!(
        r#"
        SELECT {SERVICE_COLUMNS} FROM services_rendered
        WHERE status = ?3
          AND transaction_id IN (
              SELECT id FROM transactions WHERE status = ?2 AND closed_day = ?1
          )
        ORDER BY created_at
        "#
    ))
    .bind(day)
    .bind(TransactionStatus::Closed)
    .bind(ServiceStatus::Completed)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

pub(crate) async fn sales_of_tickets_closed_on(
    conn: &mut SqliteConnection,
    day: NaiveDate,
) -> DbResult<Vec<ProductSale>> {
    let rows = sqlx::query_as::<_, ProductSale>(&format!(
        r#"
        SELECT {SALE_COLUMNS} FROM product_sales
        WHERE transaction_id IN (
            SELECT id FROM transactions WHERE status = ?2 AND closed_day = ?1
        )
        ORDER BY created_at
        "#
    ))
    .bind(day)
    .bind(TransactionStatus::Closed)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

/// Tickets closed on `day`, plus every ticket a line of `day` belongs to
/// (open parents are needed for estimates).
pub(crate) async fn tickets_for_day(
    conn: &mut SqliteConnection,
    day: NaiveDate,
) -> DbResult<Vec<Transaction>> {
    let rows = sqlx::query_as::<_, Transaction>(&format!(
        r#"
        SELECT {TRANSACTION_COLUMNS} FROM transactions
        WHERE (status = ?2 AND closed_day = ?1)
           OR id IN (SELECT transaction_id FROM services_rendered WHERE day = ?1 AND status = ?3)
           OR id IN (SELECT transaction_id FROM product_sales WHERE day = ?1)
        ORDER BY opened_at
        "#
    ))
    .bind(day)
    .bind(TransactionStatus::Closed)
    .bind(ServiceStatus::Completed)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use barber_core::rate::Rate;
    use barber_core::day::today;
    use rust_decimal::Decimal;

    struct Shop {
        db: Database,
        employee_id: String,
        haircut_id: String,
        pomade_id: String,
    }

    async fn shop() -> Shop {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let employee = db.employees().create("Ana").await.unwrap();
        let haircut = db
            .service_catalog()
            .create("Haircut", Money::from_units(8), Money::from_units(320))
            .await
            .unwrap();
        let pomade = db
            .products()
            .create("Pomade", Money::from_units(5), Money::from_units(200), 4)
            .await
            .unwrap();
        Shop {
            db,
            employee_id: employee.id,
            haircut_id: haircut.id,
            pomade_id: pomade.id,
        }
    }

    fn haircut(shop: &Shop, charged: i64) -> NewService {
        NewService {
            employee_id: shop.employee_id.clone(),
            service_id: shop.haircut_id.clone(),
            charged_local: Money::from_units(charged),
            tip_local: Money::zero(),
            tip_reference: Money::zero(),
        }
    }

    #[tokio::test]
    async fn test_running_totals_split_by_billing_currency() {
        let shop = shop().await;
        shop.db
            .rates()
            .record_rate(today(), Rate::new(Decimal::from(40)).unwrap())
            .await
            .unwrap();
        let repo = shop.db.transactions();

        let ticket = repo.open("client-1").await.unwrap();
        repo.add_service(&ticket.id, &haircut(&shop, 320)).await.unwrap();
        repo.add_product_sale(&ticket.id, &shop.pomade_id, 2).await.unwrap();

        let ticket = repo.get(&ticket.id).await.unwrap().unwrap();
        assert_eq!(ticket.total_reference, Money::from_units(8));
        assert_eq!(ticket.total_local, Money::from_units(400));

        let pomade = shop.db.products().get(&shop.pomade_id).await.unwrap().unwrap();
        assert_eq!(pomade.stock, 2);
    }

    #[tokio::test]
    async fn test_totals_without_rate_stay_local() {
        let shop = shop().await;
        let repo = shop.db.transactions();

        let ticket = repo.open("client-1").await.unwrap();
        let line = repo.add_service(&ticket.id, &haircut(&shop, 300)).await.unwrap();
        repo.add_product_sale(&ticket.id, &shop.pomade_id, 1).await.unwrap();

        let refreshed = repo.get(&ticket.id).await.unwrap().unwrap();
        assert_eq!(refreshed.total_local, Money::from_units(500));
        assert!(refreshed.total_reference.is_zero());

        repo.cancel_service(&line.id).await.unwrap();
        let refreshed = repo.get(&ticket.id).await.unwrap().unwrap();
        assert_eq!(refreshed.total_local, Money::from_units(200));
    }

    #[tokio::test]
    async fn test_sale_beyond_stock_is_rolled_back() {
        let shop = shop().await;
        let repo = shop.db.transactions();
        let ticket = repo.open("client-1").await.unwrap();

        let err = repo
            .add_product_sale(&ticket.id, &shop.pomade_id, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::InsufficientStock { .. })));

        assert!(repo.product_sales(&ticket.id).await.unwrap().is_empty());
        let pomade = shop.db.products().get(&shop.pomade_id).await.unwrap().unwrap();
        assert_eq!(pomade.stock, 4);
    }

    #[tokio::test]
    async fn test_close_records_payment_and_locks_ticket() {
        let shop = shop().await;
        let repo = shop.db.transactions();
        let ticket = repo.open("client-1").await.unwrap();
        repo.add_service(&ticket.id, &haircut(&shop, 320)).await.unwrap();
        repo.add_tip(&ticket.id, &shop.employee_id, Money::zero(), Money::from_units(2))
            .await
            .unwrap();

        let payment = TransactionPayment {
            paid_local: Money::from_units(120),
            paid_reference: Money::from_units(5),
            payment_methods: vec!["cash".into(), "mobile_payment".into()],
            payment_entities: vec!["Banco Uno".into()],
            reference_number: Some("000123".into()),
        };
        let closed = repo.close(&ticket.id, &payment).await.unwrap();

        assert!(closed.is_closed());
        assert_eq!(closed.closed_day, Some(today()));
        assert_eq!(closed.payment_methods, vec!["cash", "mobile_payment"]);
        assert_eq!(closed.reference_number.as_deref(), Some("000123"));

        let err = repo.add_service(&ticket.id, &haircut(&shop, 1)).await.unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::InvalidTransactionStatus { .. })));
        assert!(repo.close(&ticket.id, &payment).await.is_err());

        let lines = repo.services(&ticket.id).await.unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().any(|s| s.is_independent_tip()));
    }

    #[tokio::test]
    async fn test_unknown_employee_rejected() {
        let shop = shop().await;
        let repo = shop.db.transactions();
        let ticket = repo.open("client-1").await.unwrap();

        let mut line = haircut(&shop, 100);
        line.employee_id = "ghost".to_string();
        let err = repo.add_service(&ticket.id, &line).await.unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::EmployeeNotFound(_))));
    }
}
