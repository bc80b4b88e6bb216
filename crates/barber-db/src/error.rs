//! # Database Error Types
//!
//! Error types for storage operations and for the two committing
//! operations of the ledger (payroll, daily report).
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← constraint / not found / pool categorization  │
//! │       │                                                                 │
//! │       ├──► PayrollError  (UNIQUE employee+day  → Duplicate)            │
//! │       └──► ReportError   (UNIQUE report_day    → AlreadyExists)        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Back-office caller prompts the user; nothing is retried here          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use barber_core::CoreError;
use chrono::NaiveDate;
use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// `field` is the `<table>.<column>` list SQLite reports.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Service rendered for an unknown employee
    /// - Consumption of an unknown product
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// A stored value could not be decoded (bad decimal, unknown status).
    #[error("Corrupt stored value: {0}")]
    Corrupt(String),

    /// A business rule rejected the write.
    #[error(transparent)]
    Rule(#[from] CoreError),

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// True for a UNIQUE violation on the given table.
    pub fn is_unique_violation_on(&self, table: &str) -> bool {
        match self {
            DbError::UniqueViolation { field, .. } => field
                .split(',')
                .any(|col| col.trim().starts_with(&format!("{table}."))),
            _ => false,
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::ColumnDecode   → DbError::Corrupt
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite reports constraints as text:
                // "UNIQUE constraint failed: payrolls.employee_id, payrolls.pay_day"
                // "FOREIGN KEY constraint failed"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::ColumnDecode { index, source } => {
                DbError::Corrupt(format!("column {index}: {source}"))
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Payroll Error
// =============================================================================

/// Why a payroll could not be created.
#[derive(Debug, Error)]
pub enum PayrollError {
    /// A payroll already exists for this employee and day. There is no
    /// overwrite path: delete the existing one first.
    #[error("Payroll already exists for employee {employee_id} on {pay_day}")]
    Duplicate {
        employee_id: String,
        pay_day: NaiveDate,
    },

    #[error("Employee not found: {0}")]
    EmployeeNotFound(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Storage failure: {0}")]
    Storage(DbError),
}

impl From<DbError> for PayrollError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Rule(core) => PayrollError::Core(core),
            other => PayrollError::Storage(other),
        }
    }
}

impl From<sqlx::Error> for PayrollError {
    fn from(err: sqlx::Error) -> Self {
        PayrollError::Storage(DbError::from(err))
    }
}

// =============================================================================
// Report Error
// =============================================================================

/// Why a daily report could not be generated.
#[derive(Debug, Error)]
pub enum ReportError {
    /// A report for this day exists and replacement was not requested.
    #[error("Report already exists for {0}")]
    AlreadyExists(NaiveDate),

    /// The snapshot blob could not be serialized.
    #[error("Report snapshot could not be serialized: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("Storage failure: {0}")]
    Storage(#[from] DbError),
}

impl From<sqlx::Error> for ReportError {
    fn from(err: sqlx::Error) -> Self {
        ReportError::Storage(DbError::from(err))
    }
}
