//! # Consumption Repository
//!
//! Products taken by employees, deducted from their next payroll.
//!
//! ## Consumption Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  record_consumption()  → pending, stock − quantity   (one transaction) │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  compute_payroll()     → paid, payroll_id = P        (one transaction) │
//! │         │                                                               │
//! │         ▼ (payroll P deleted)                                           │
//! │  delete_payroll()      → pending, payroll_id = NULL, stock + quantity  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use crate::repository::begin_write;
use crate::repository::product::{adjust_stock, get_product};
use crate::repository::transaction::require_employee;
use barber_core::day::now_local;
use barber_core::validation::validate_quantity;
use barber_core::{ConsumptionStatus, CoreError, ProductConsumption};

const CONSUMPTION_COLUMNS: &str = r#"
    id, employee_id, product_id, quantity, day,
    unit_price_local, total_price_local, status, payroll_id, created_at
"#;

/// Repository for employee self-consumption.
#[derive(Debug, Clone)]
pub struct ConsumptionRepository {
    pool: SqlitePool,
}

impl ConsumptionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ConsumptionRepository { pool }
    }

    /// Records `quantity` units of a product taken by an employee on `day`.
    ///
    /// Priced at the product's current local price. The stock is reserved
    /// in the same storage transaction; with too little stock nothing is
    /// written.
    pub async fn record_consumption(
        &self,
        employee_id: &str,
        product_id: &str,
        quantity: i64,
        day: NaiveDate,
    ) -> DbResult<ProductConsumption> {
        validate_quantity(quantity).map_err(CoreError::from)?;

        let mut tx = begin_write(&self.pool).await?;
        require_employee(&mut *tx, employee_id).await?;
        let product = get_product(&mut *tx, product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

        adjust_stock(&mut *tx, product_id, -quantity).await?;

        let consumption = ProductConsumption {
            id: Uuid::new_v4().to_string(),
            employee_id: employee_id.to_string(),
            product_id: product.id.clone(),
            quantity,
            day,
            unit_price_local: product.price_local,
            total_price_local: product.price_local.multiply_quantity(quantity),
            status: ConsumptionStatus::Pending,
            payroll_id: None,
            created_at: now_local(),
        };

        sqlx::query(
            r#"
            INSERT INTO product_consumptions (
                id, employee_id, product_id, quantity, day,
                unit_price_local, total_price_local, status, payroll_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL, ?9)
            "#,
        )
        .bind(&consumption.id)
        .bind(&consumption.employee_id)
        .bind(&consumption.product_id)
        .bind(consumption.quantity)
        .bind(consumption.day)
        .bind(consumption.unit_price_local)
        .bind(consumption.total_price_local)
        .bind(consumption.status)
        .bind(consumption.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(
            id = %consumption.id,
            employee_id = %employee_id,
            product_id = %product_id,
            quantity,
            total = %consumption.total_price_local,
            "Recorded consumption"
        );

        Ok(consumption)
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<ProductConsumption>> {
        let consumption = sqlx::query_as::<_, ProductConsumption>(&format!(
            "SELECT {CONSUMPTION_COLUMNS} FROM product_consumptions WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(consumption)
    }

    /// Everything an employee still owes, whenever it was taken.
    pub async fn pending_for(&self, employee_id: &str) -> DbResult<Vec<ProductConsumption>> {
        let mut conn = self.pool.acquire().await?;
        pending_for(&mut *conn, employee_id).await
    }

    /// Consumptions settled by a payroll.
    pub async fn for_payroll(&self, payroll_id: &str) -> DbResult<Vec<ProductConsumption>> {
        let mut conn = self.pool.acquire().await?;
        for_payroll(&mut *conn, payroll_id).await
    }
}

pub(crate) async fn pending_for(
    conn: &mut SqliteConnection,
    employee_id: &str,
) -> DbResult<Vec<ProductConsumption>> {
    let rows = sqlx::query_as::<_, ProductConsumption>(&format!(
        r#"
        SELECT {CONSUMPTION_COLUMNS} FROM product_consumptions
        WHERE employee_id = ?1 AND status = ?2
        ORDER BY created_at
        "#
    ))
    .bind(employee_id)
    .bind(ConsumptionStatus::Pending)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

pub(crate) async fn for_payroll(
    conn: &mut SqliteConnection,
    payroll_id: &str,
) -> DbResult<Vec<ProductConsumption>> {
    let rows = sqlx::query_as::<_, ProductConsumption>(&format!(
        "SELECT {CONSUMPTION_COLUMNS} FROM product_consumptions WHERE payroll_id = ?1 ORDER BY created_at"
    ))
    .bind(payroll_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};
    use barber_core::money::Money;

    #[tokio::test]
    async fn test_consumption_reserves_stock() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let employee = db.employees().create("Luis").await.unwrap();
        let product = db
            .products()
            .create("Wax", Money::from_units(3), Money::new(11250, 2), 5)
            .await
            .unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();

        let consumption = db
            .consumptions()
            .record_consumption(&employee.id, &product.id, 2, day)
            .await
            .unwrap();

        assert_eq!(consumption.total_price_local, Money::from_units(225));
        assert_eq!(consumption.status, ConsumptionStatus::Pending);
        let product = db.products().get(&product.id).await.unwrap().unwrap();
        assert_eq!(product.stock, 3);
        assert_eq!(db.consumptions().pending_for(&employee.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_insufficient_stock_writes_nothing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let employee = db.employees().create("Luis").await.unwrap();
        let product = db
            .products()
            .create("Wax", Money::from_units(3), Money::from_units(120), 1)
            .await
            .unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();

        let err = db
            .consumptions()
            .record_consumption(&employee.id, &product.id, 2, day)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::Rule(CoreError::InsufficientStock { available: 1, requested: 2, .. })
        ));
        assert!(db.consumptions().pending_for(&employee.id).await.unwrap().is_empty());
        assert_eq!(db.products().get(&product.id).await.unwrap().unwrap().stock, 1);
    }
}
