//! # barber-db: Database Layer for Barber Ledger
//!
//! SQLite storage for the ledger. Repositories gather the rows a day needs,
//! hand them to `barber-core` and persist the result atomically.
//!
//! ## Data Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  caller (UI shell, seed, daily-report)                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    barber-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────────┐   ┌────────────────┐   ┌────────────────┐   │   │
//! │  │   │   Database   │   │  Repositories  │   │   Migrations   │   │   │
//! │  │   │  (pool.rs)   │◄──│ rate, payroll, │   │   (embedded)   │   │   │
//! │  │   │  SqlitePool  │   │ report, ...    │   │ 001_initial    │   │   │
//! │  │   └──────────────┘   └───────┬────────┘   └────────────────┘   │   │
//! │  └──────────────────────────────┼──────────────────────────────────┘   │
//! │                                 ▼                                       │
//! │                   barber-core (pure rules)                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool and repository accessors
//! - [`migrations`] - Embedded schema migrations
//! - [`config`] - Environment configuration and tracing setup
//! - [`error`] - Storage, payroll and report errors
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use barber_db::{Database, LedgerConfig};
//!
//! let config = LedgerConfig::from_env();
//! let db = Database::new(config.db_config()).await?;
//!
//! let payroll = db.payrolls().compute_payroll(&employee_id, day, 60).await?;
//! db.payrolls().mark_paid(&payroll.id, PaymentCurrency::Local).await?;
//!
//! let report = db.reports().generate_report(day, false).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{init_tracing, LedgerConfig, DEFAULT_LOG_FILTER};
pub use error::{DbError, DbResult, PayrollError, ReportError};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::catalog::ServiceCatalogRepository;
pub use repository::consumption::ConsumptionRepository;
pub use repository::employee::EmployeeRepository;
pub use repository::payroll::PayrollRepository;
pub use repository::product::ProductRepository;
pub use repository::rate::RateRepository;
pub use repository::report::ReportRepository;
pub use repository::transaction::{NewService, TransactionRepository};
