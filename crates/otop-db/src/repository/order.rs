//! # Order Repository
//!
//! Persistence for admin orders against the supplier catalog.
//!
//! Stock movement is not done here: the engine reserves or releases stock
//! through [`CatalogStore`](super::catalog::CatalogStore) in the same unit
//! of work that writes the order row.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use otop_core::{Order, OrderStatus};

const ORDER_COLUMNS: &str = "id, product_id, product_name, unit_price_cents, quantity, \
     description, status, supplier_id, admin_id, order_date, updated_at";

/// Row written when an order is placed.
#[derive(Debug, Clone)]
pub struct NewOrderRow<'a> {
    pub product_id: i64,
    pub product_name: &'a str,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub description: Option<&'a str>,
    pub supplier_id: i64,
    pub admin_id: i64,
    pub order_date: DateTime<Utc>,
}

/// Repository for order database operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderRepository;

impl OrderRepository {
    /// Gets an order by id.
    pub async fn get(&self, conn: &mut SqliteConnection, id: i64) -> DbResult<Option<Order>> {
        let sql = format!("SELECT {} FROM orders WHERE id = ?1", ORDER_COLUMNS);
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(order)
    }

    /// Inserts a pending order and returns it.
    pub async fn insert(&self, conn: &mut SqliteConnection, row: &NewOrderRow<'_>) -> DbResult<Order> {
        let sql = format!(
            "INSERT INTO orders (product_id, product_name, unit_price_cents, quantity, description, \
             status, supplier_id, admin_id, order_date, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
             RETURNING {}",
            ORDER_COLUMNS
        );
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(row.product_id)
            .bind(row.product_name)
            .bind(row.unit_price_cents)
            .bind(row.quantity)
            .bind(row.description)
            .bind(OrderStatus::Pending)
            .bind(row.supplier_id)
            .bind(row.admin_id)
            .bind(row.order_date)
            .bind(row.order_date)
            .fetch_one(&mut *conn)
            .await?;

        debug!(order_id = order.id, product_id = row.product_id, "Order inserted");
        Ok(order)
    }

    /// Rewrites the line of a pending order (product, snapshot, quantity).
    #[allow(clippy::too_many_arguments)]
    pub async fn update_line(
        &self,
        conn: &mut SqliteConnection,
        id: i64,
        product_id: i64,
        product_name: &str,
        unit_price_cents: i64,
        quantity: i64,
        description: Option<&str>,
        supplier_id: i64,
        updated_at: DateTime<Utc>,
    ) -> DbResult<Order> {
        let sql = format!(
            "UPDATE orders SET product_id = ?1, product_name = ?2, unit_price_cents = ?3, \
             quantity = ?4, description = ?5, supplier_id = ?6, updated_at = ?7 \
             WHERE id = ?8 RETURNING {}",
            ORDER_COLUMNS
        );
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(product_id)
            .bind(product_name)
            .bind(unit_price_cents)
            .bind(quantity)
            .bind(description)
            .bind(supplier_id)
            .bind(updated_at)
            .bind(id)
            .fetch_one(&mut *conn)
            .await?;
        Ok(order)
    }

    /// Moves an order to `status` only if it is still in `from`.
    ///
    /// Returns false when the order was not in `from` anymore.
    pub async fn set_status(
        &self,
        conn: &mut SqliteConnection,
        id: i64,
        from: OrderStatus,
        to: OrderStatus,
        updated_at: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result =
            sqlx::query("UPDATE orders SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4")
                .bind(to)
                .bind(updated_at)
                .bind(id)
                .bind(from)
                .execute(&mut *conn)
                .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn delete(&self, conn: &mut SqliteConnection, id: i64) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM orders WHERE id = ?1")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Orders owned by a supplier, newest first.
    pub async fn list_by_supplier(
        &self,
        conn: &mut SqliteConnection,
        supplier_id: i64,
    ) -> DbResult<Vec<Order>> {
        let sql = format!(
            "SELECT {} FROM orders WHERE supplier_id = ?1 ORDER BY order_date DESC, id DESC",
            ORDER_COLUMNS
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(supplier_id)
            .fetch_all(&mut *conn)
            .await?;
        Ok(orders)
    }

    /// Number of pending orders still holding stock of `product_id`.
    pub async fn count_pending_for_product(
        &self,
        conn: &mut SqliteConnection,
        product_id: i64,
    ) -> DbResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM orders WHERE product_id = ?1 AND status = ?2",
        )
        .bind(product_id)
        .bind(OrderStatus::Pending)
        .fetch_one(&mut *conn)
        .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
