//! # Employee Repository
//!
//! Staff records, the minimum the payroll needs.

use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use barber_core::day::now_local;
use barber_core::validation::validate_name;
use barber_core::{CoreError, Employee};

/// Repository for employees.
#[derive(Debug, Clone)]
pub struct EmployeeRepository {
    pool: SqlitePool,
}

impl EmployeeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        EmployeeRepository { pool }
    }

    /// Creates an active employee.
    pub async fn create(&self, name: &str) -> DbResult<Employee> {
        validate_name(name).map_err(CoreError::from)?;

        let employee = Employee {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            is_active: true,
            created_at: now_local(),
        };

        debug!(id = %employee.id, name = %employee.name, "Inserting employee");

        sqlx::query(
            "INSERT INTO employees (id, name, is_active, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&employee.id)
        .bind(&employee.name)
        .bind(employee.is_active)
        .bind(employee.created_at)
        .execute(&self.pool)
        .await?;

        Ok(employee)
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Employee>> {
        let employee = sqlx::query_as::<_, Employee>(
            "SELECT id, name, is_active, created_at FROM employees WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(employee)
    }

    /// Active employees by name.
    pub async fn list_active(&self) -> DbResult<Vec<Employee>> {
        let employees = sqlx::query_as::<_, Employee>(
            r#"
            SELECT id, name, is_active, created_at
            FROM employees
            WHERE is_active = 1
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(employees)
    }

    /// Hides an employee from the active list; history stays intact.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deactivating employee");

        let result = sqlx::query("UPDATE employees SET is_active = 0 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::EmployeeNotFound(id.to_string()).into());
        }

        Ok(())
    }
}
