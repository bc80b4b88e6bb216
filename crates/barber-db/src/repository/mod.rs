//! # Repository Module
//!
//! One repository per table family. Each holds a cloned pool; operations
//! that touch several tables run in one storage transaction.
//!
//! ## Who writes what
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  RateRepository            exchange_rates  (+ reprices the catalog)    │
//! │  EmployeeRepository        employees                                    │
//! │  ProductRepository         products                                     │
//! │  ServiceCatalogRepository  service_offerings                            │
//! │  TransactionRepository     transactions · services_rendered ·          │
//! │                            product_sales   (stock on sale)              │
//! │  ConsumptionRepository     product_consumptions   (stock on take)     │
//! │  PayrollRepository         payrolls   (settles consumptions)           │
//! │  ReportRepository          daily_reports   (read-only elsewhere)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Connection-level helpers (`pub(crate)`, taking `&mut SqliteConnection`)
//! let one repository join another's storage transaction.
//!
//! Every writing transaction starts with `BEGIN IMMEDIATE` ([`begin_write`]):
//! the write lock is taken before the first read, so checks made inside
//! the transaction still hold at commit and concurrent writers queue on
//! the busy timeout instead of failing with `database is locked`.

pub mod catalog;
pub mod consumption;
pub mod employee;
pub mod payroll;
pub mod product;
pub mod rate;
pub mod report;
pub mod transaction;

use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::error::DbResult;

/// Opens a storage transaction holding the write lock from the start.
pub(crate) async fn begin_write(pool: &SqlitePool) -> DbResult<Transaction<'static, Sqlite>> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}
