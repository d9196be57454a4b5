//! # Catalog Store
//!
//! Stock rows for both catalog tables.
//!
//! ## Optimistic Stock Writes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  Read → Check → Compare-and-Set                         │
//! │                                                                         │
//! │  Unit of work A                    Unit of work B                      │
//! │  ──────────────                    ──────────────                      │
//! │  get(10000) → quantity 10          get(10000) → quantity 10            │
//! │  10 ≥ 4 ✓                          10 ≥ 8 ✓                            │
//! │  UPDATE ... SET quantity = 6                                           │
//! │   WHERE id = 10000                                                     │
//! │     AND quantity = 10   → 1 row    UPDATE ... SET quantity = 2         │
//! │  commit                             WHERE id = 10000                   │
//! │                                      AND quantity = 10  → 0 rows       │
//! │                                    StockWrite::Conflict                │
//! │                                    rollback, re-run: 6 ≥ 8 ✗           │
//! │                                    InsufficientStock                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The stock read and the write never drift apart: the write only lands if
//! the row still holds the quantity that was checked.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use otop_core::{CatalogTable, Category, Product};

const PRODUCT_COLUMNS: &str = "id, sequential_number, name, description, category, price_cents, \
     quantity, supplier_id, store_name, created_at, updated_at";

/// Outcome of a compare-and-set stock write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockWrite {
    /// The row held the expected quantity and now holds the new one.
    Committed,
    /// The row changed (or vanished) since it was read.
    Conflict,
}

impl StockWrite {
    fn from_rows(rows: u64) -> Self {
        if rows == 1 {
            StockWrite::Committed
        } else {
            StockWrite::Conflict
        }
    }
}

/// Repository for one catalog table.
///
/// ## Usage
/// ```rust,ignore
/// let store = db.catalog(CatalogTable::OtopProducts);
/// let mut tx = db.begin().await?;
/// let product = store.get(&mut tx, 10000).await?;
/// ```
#[derive(Debug, Clone, Copy)]
pub struct CatalogStore {
    table: CatalogTable,
}

impl CatalogStore {
    pub fn new(table: CatalogTable) -> Self {
        CatalogStore { table }
    }

    pub fn table(&self) -> CatalogTable {
        self.table
    }

    fn table_name(&self) -> &'static str {
        self.table.table_name()
    }

    /// Gets a product by id.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get(&self, conn: &mut SqliteConnection, id: i64) -> DbResult<Option<Product>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ?1",
            PRODUCT_COLUMNS,
            self.table_name()
        );
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(product)
    }

    /// Writes `new_quantity` only if the row still holds `expected`.
    pub async fn try_set_quantity(
        &self,
        conn: &mut SqliteConnection,
        id: i64,
        expected: i64,
        new_quantity: i64,
    ) -> DbResult<StockWrite> {
        let sql = format!(
            "UPDATE {} SET quantity = ?1, updated_at = ?2 WHERE id = ?3 AND quantity = ?4",
            self.table_name()
        );
        let result = sqlx::query(&sql)
            .bind(new_quantity)
            .bind(Utc::now())
            .bind(id)
            .bind(expected)
            .execute(&mut *conn)
            .await?;

        let outcome = StockWrite::from_rows(result.rows_affected());
        debug!(
            table = self.table_name(),
            id,
            expected,
            new_quantity,
            ?outcome,
            "Stock write"
        );
        Ok(outcome)
    }

    /// Lists every product, oldest id first.
    pub async fn list(&self, conn: &mut SqliteConnection) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {} FROM {} ORDER BY id",
            PRODUCT_COLUMNS,
            self.table_name()
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .fetch_all(&mut *conn)
            .await?;
        Ok(products)
    }

    pub async fn list_by_supplier(
        &self,
        conn: &mut SqliteConnection,
        supplier_id: i64,
    ) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE supplier_id = ?1 ORDER BY id",
            PRODUCT_COLUMNS,
            self.table_name()
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(supplier_id)
            .fetch_all(&mut *conn)
            .await?;
        Ok(products)
    }

    /// Every display code currently in the table.
    pub async fn sequential_numbers(&self, conn: &mut SqliteConnection) -> DbResult<Vec<String>> {
        let sql = format!("SELECT sequential_number FROM {}", self.table_name());
        let codes = sqlx::query_scalar::<_, String>(&sql)
            .fetch_all(&mut *conn)
            .await?;
        Ok(codes)
    }

    /// Highest assigned id, `None` for an empty table.
    pub async fn max_id(&self, conn: &mut SqliteConnection) -> DbResult<Option<i64>> {
        let sql = format!("SELECT MAX(id) FROM {}", self.table_name());
        let max = sqlx::query_scalar::<_, Option<i64>>(&sql)
            .fetch_one(&mut *conn)
            .await?;
        Ok(max)
    }

    /// Inserts a fully formed product (id and code already assigned).
    ///
    /// Two writers that computed the same id or code collide here with a
    /// unique violation on `<table>.id` / `<table>.sequential_number`.
    pub async fn insert(&self, conn: &mut SqliteConnection, product: &Product) -> DbResult<()> {
        let sql = format!(
            "INSERT INTO {} ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            self.table_name(),
            PRODUCT_COLUMNS
        );
        sqlx::query(&sql)
            .bind(product.id)
            .bind(&product.sequential_number)
            .bind(&product.name)
            .bind(&product.description)
            .bind(product.category)
            .bind(product.price_cents)
            .bind(product.quantity)
            .bind(product.supplier_id)
            .bind(&product.store_name)
            .bind(product.created_at)
            .bind(product.updated_at)
            .execute(&mut *conn)
            .await?;

        debug!(
            table = self.table_name(),
            id = product.id,
            code = %product.sequential_number,
            "Product inserted"
        );
        Ok(())
    }

    /// Rewrites the editable fields, guarded by the quantity that was read.
    #[allow(clippy::too_many_arguments)]
    pub async fn update_details(
        &self,
        conn: &mut SqliteConnection,
        id: i64,
        expected_quantity: i64,
        name: &str,
        description: Option<&str>,
        category: Category,
        price_cents: i64,
        quantity: i64,
        updated_at: DateTime<Utc>,
    ) -> DbResult<StockWrite> {
        let sql = format!(
            "UPDATE {} SET name = ?1, description = ?2, category = ?3, price_cents = ?4, \
             quantity = ?5, updated_at = ?6 WHERE id = ?7 AND quantity = ?8",
            self.table_name()
        );
        let result = sqlx::query(&sql)
            .bind(name)
            .bind(description)
            .bind(category)
            .bind(price_cents)
            .bind(quantity)
            .bind(updated_at)
            .bind(id)
            .bind(expected_quantity)
            .execute(&mut *conn)
            .await?;
        Ok(StockWrite::from_rows(result.rows_affected()))
    }

    /// Deletes a product. Returns false when no row matched.
    pub async fn delete(&self, conn: &mut SqliteConnection, id: i64) -> DbResult<bool> {
        let sql = format!("DELETE FROM {} WHERE id = ?1", self.table_name());
        let result = sqlx::query(&sql).bind(id).execute(&mut *conn).await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn description_exists(
        &self,
        conn: &mut SqliteConnection,
        description: &str,
    ) -> DbResult<bool> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE description = ?1)",
            self.table_name()
        );
        let exists = sqlx::query_scalar::<_, bool>(&sql)
            .bind(description)
            .fetch_one(&mut *conn)
            .await?;
        Ok(exists)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
