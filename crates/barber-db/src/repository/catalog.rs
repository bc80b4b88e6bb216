//! # Service Catalog Repository
//!
//! The service menu (haircut, beard trim, ...). Services are priced in the
//! reference currency; the local price follows today's rate.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use crate::repository::begin_write;
use barber_core::money::Money;
use barber_core::rate::Rate;
use barber_core::validation::{validate_amount, validate_name};
use barber_core::{CoreError, ServiceOffering};

/// Repository for the service menu.
#[derive(Debug, Clone)]
pub struct ServiceCatalogRepository {
    pool: SqlitePool,
}

impl ServiceCatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ServiceCatalogRepository { pool }
    }

    pub async fn create(
        &self,
        name: &str,
        price_reference: Money,
        price_local: Money,
    ) -> DbResult<ServiceOffering> {
        validate_name(name).map_err(CoreError::from)?;
        validate_amount("price_reference", price_reference).map_err(CoreError::from)?;
        validate_amount("price_local", price_local).map_err(CoreError::from)?;

        let offering = ServiceOffering {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            price_reference,
            price_local,
            is_active: true,
        };

        debug!(id = %offering.id, name = %offering.name, "Inserting service offering");

        sqlx::query(
            r#"
            INSERT INTO service_offerings (id, name, price_reference, price_local, is_active)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&offering.id)
        .bind(&offering.name)
        .bind(offering.price_reference)
        .bind(offering.price_local)
        .bind(offering.is_active)
        .execute(&self.pool)
        .await?;

        Ok(offering)
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<ServiceOffering>> {
        let offering = sqlx::query_as::<_, ServiceOffering>(
            r#"
            SELECT id, name, price_reference, price_local, is_active
            FROM service_offerings
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(offering)
    }

    pub async fn list_active(&self) -> DbResult<Vec<ServiceOffering>> {
        let offerings = sqlx::query_as::<_, ServiceOffering>(
            r#"
            SELECT id, name, price_reference, price_local, is_active
            FROM service_offerings
            WHERE is_active = 1
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(offerings)
    }

    /// Recomputes local prices from reference prices.
    pub async fn reprice(&self, rate: Rate) -> DbResult<u64> {
        let mut tx = begin_write(&self.pool).await?;
        let count = reprice_services(&mut *tx, rate).await?;
        tx.commit().await?;
        Ok(count)
    }
}

pub(crate) async fn reprice_services(conn: &mut SqliteConnection, rate: Rate) -> DbResult<u64> {
    let offerings = sqlx::query_as::<_, ServiceOffering>(
        "SELECT id, name, price_reference, price_local, is_active FROM service_offerings",
    )
    .fetch_all(&mut *conn)
    .await?;

    for offering in &offerings {
        sqlx::query("UPDATE service_offerings SET price_local = ?2 WHERE id = ?1")
            .bind(&offering.id)
            .bind(rate.to_local(offering.price_reference))
            .execute(&mut *conn)
            .await?;
    }

    Ok(offerings.len() as u64)
}
