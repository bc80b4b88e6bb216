//! # Product Repository
//!
//! Retail products: sold to clients on tickets and consumed by employees.
//!
//! ## Stock Updates
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ❌ read stock, compute, write back   (lost update under concurrency)   │
//! │  ✅ UPDATE products SET stock = stock + ?delta                          │
//! │        WHERE id = ? AND stock + ?delta >= 0                             │
//! │                                                                         │
//! │  0 rows affected → product missing OR not enough stock                  │
//! │  (one extra SELECT tells which, for the error message)                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDateTime;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use crate::repository::begin_write;
use barber_core::day::now_local;
use barber_core::money::Money;
use barber_core::rate::Rate;
use barber_core::validation::{validate_amount, validate_name};
use barber_core::{CoreError, Product};

const PRODUCT_COLUMNS: &str = r#"
    id, name, price_reference, price_local, stock, is_active, created_at, updated_at
"#;

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Creates an active product with an initial stock.
    pub async fn create(
        &self,
        name: &str,
        price_reference: Money,
        price_local: Money,
        stock: i64,
    ) -> DbResult<Product> {
        validate_name(name).map_err(CoreError::from)?;
        validate_amount("price_reference", price_reference).map_err(CoreError::from)?;
        validate_amount("price_local", price_local).map_err(CoreError::from)?;

        let now = now_local();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            price_reference,
            price_local,
            stock: stock.max(0),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        self.insert(&product).await?;
        Ok(product)
    }

    /// Inserts a product as given.
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, price_reference, price_local,
                stock, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(product.price_reference)
        .bind(product.price_local)
        .bind(product.stock)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        get_product(&mut *conn, id).await
    }

    /// Active products by name.
    pub async fn list_active(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active = 1 ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Adds `delta` to the stock (negative to take units out).
    ///
    /// Rejects with [`CoreError::InsufficientStock`] rather than going
    /// below zero.
    pub async fn update_stock(&self, id: &str, delta: i64) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        adjust_stock(&mut *conn, id, delta).await
    }

    /// Recomputes every product's local price from its reference price.
    ///
    /// Returns the number of products repriced.
    pub async fn reprice(&self, rate: Rate) -> DbResult<u64> {
        let mut tx = begin_write(&self.pool).await?;
        let count = reprice_products(&mut *tx, rate, now_local()).await?;
        tx.commit().await?;
        Ok(count)
    }
}

pub(crate) async fn get_product(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(product)
}

/// Atomic stock delta; never lets stock go negative.
pub(crate) async fn adjust_stock(conn: &mut SqliteConnection, id: &str, delta: i64) -> DbResult<()> {
    debug!(id = %id, delta, "Updating stock");

    let result = sqlx::query(
        r#"
        UPDATE products
        SET stock = stock + ?2, updated_at = ?3
        WHERE id = ?1 AND stock + ?2 >= 0
        "#,
    )
    .bind(id)
    .bind(delta)
    .bind(now_local())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return match get_product(conn, id).await? {
            None => Err(CoreError::ProductNotFound(id.to_string()).into()),
            Some(product) => Err(CoreError::InsufficientStock {
                product_id: id.to_string(),
                available: product.stock,
                requested: -delta,
            }
            .into()),
        };
    }

    Ok(())
}

pub(crate) async fn reprice_products(
    conn: &mut SqliteConnection,
    rate: Rate,
    at: NaiveDateTime,
) -> DbResult<u64> {
    let products = sqlx::query_as::<_, Product>(&format!("SELECT {PRODUCT_COLUMNS} FROM products"))
        .fetch_all(&mut *conn)
        .await?;

    for product in &products {
        sqlx::query("UPDATE products SET price_local = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(&product.id)
            .bind(rate.to_local(product.price_reference))
            .bind(at)
            .execute(&mut *conn)
            .await?;
    }

    Ok(products.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_stock_never_goes_negative() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();
        let product = repo
            .create("Beard oil", Money::from_units(6), Money::from_units(240), 3)
            .await
            .unwrap();

        repo.update_stock(&product.id, -2).await.unwrap();
        let err = repo.update_stock(&product.id, -2).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Rule(CoreError::InsufficientStock { available: 1, requested: 2, .. })
        ));

        repo.update_stock(&product.id, 5).await.unwrap();
        assert_eq!(repo.get(&product.id).await.unwrap().unwrap().stock, 6);
    }

    #[tokio::test]
    async fn test_unknown_product() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db.products().update_stock("missing", -1).await.unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::ProductNotFound(_))));
    }

    #[tokio::test]
    async fn test_reprice_keeps_exact_decimals() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();
        let product = repo
            .create("Shampoo", Money::new(1099, 2), Money::zero(), 1)
            .await
            .unwrap();

        let rate = Rate::new(Decimal::new(3655, 2)).unwrap();
        assert_eq!(repo.reprice(rate).await.unwrap(), 1);

        // 10.99 × 36.55 = 401.6845, stored unrounded
        let product = repo.get(&product.id).await.unwrap().unwrap();
        assert_eq!(product.price_local, Money::new(4016845, 4));
    }
}
