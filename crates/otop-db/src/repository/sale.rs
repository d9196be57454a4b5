//! # Sale Repository
//!
//! Sale lines written by POS sale batches, and the facts sales reports are
//! built from.
//!
//! ## Two Valuation Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Where a report gets its amounts                      │
//! │                                                                         │
//! │  global_facts(since)                                                   │
//! │      quantity_sold × otop_products.price_cents  (live price, JOIN)     │
//! │      lines whose product was deleted drop out                          │
//! │                                                                         │
//! │  supplier_facts(supplier_id, since)                                    │
//! │      sale_lines.total_amount_cents              (stored at sale time)  │
//! │                                                                         │
//! │  A price change after the sale moves the global report, never the     │
//! │  supplier report.                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use otop_core::{SaleFact, SaleLine, SupplierTotal};

const SALE_COLUMNS: &str = "id, product_id, product_name, quantity_sold, unit_price_cents, \
     total_amount_cents, supplier_id, sold_at";

/// Row written for one sold line.
#[derive(Debug, Clone)]
pub struct NewSaleLineRow<'a> {
    pub product_id: i64,
    pub product_name: &'a str,
    pub quantity_sold: i64,
    pub unit_price_cents: i64,
    pub total_amount_cents: i64,
    pub supplier_id: Option<i64>,
    pub sold_at: DateTime<Utc>,
}

/// Repository for sale lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct SaleRepository;

impl SaleRepository {
    pub async fn insert(
        &self,
        conn: &mut SqliteConnection,
        row: &NewSaleLineRow<'_>,
    ) -> DbResult<SaleLine> {
        let sql = format!(
            "INSERT INTO sale_lines (product_id, product_name, quantity_sold, unit_price_cents, \
             total_amount_cents, supplier_id, sold_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) RETURNING {}",
            SALE_COLUMNS
        );
        let sale = sqlx::query_as::<_, SaleLine>(&sql)
            .bind(row.product_id)
            .bind(row.product_name)
            .bind(row.quantity_sold)
            .bind(row.unit_price_cents)
            .bind(row.total_amount_cents)
            .bind(row.supplier_id)
            .bind(row.sold_at)
            .fetch_one(&mut *conn)
            .await?;

        debug!(sale_id = sale.id, product_id = row.product_id, "Sale line inserted");
        Ok(sale)
    }

    /// Sale lines attributed to a supplier, newest first.
    pub async fn list_by_supplier(
        &self,
        conn: &mut SqliteConnection,
        supplier_id: i64,
    ) -> DbResult<Vec<SaleLine>> {
        let sql = format!(
            "SELECT {} FROM sale_lines WHERE supplier_id = ?1 ORDER BY sold_at DESC, id DESC",
            SALE_COLUMNS
        );
        let sales = sqlx::query_as::<_, SaleLine>(&sql)
            .bind(supplier_id)
            .fetch_all(&mut *conn)
            .await?;
        Ok(sales)
    }

    /// Catalog-wide facts since `since`, valued at the live product price.
    pub async fn global_facts(
        &self,
        conn: &mut SqliteConnection,
        since: DateTime<Utc>,
    ) -> DbResult<Vec<SaleFact>> {
        let facts = sqlx::query_as::<_, SaleFact>(
            r#"
            SELECT s.sold_at AS sold_at,
                   s.quantity_sold * p.price_cents AS amount_cents
            FROM sale_lines s
            INNER JOIN otop_products p ON p.id = s.product_id
            WHERE s.sold_at >= ?1
            "#,
        )
        .bind(since)
        .fetch_all(&mut *conn)
        .await?;
        Ok(facts)
    }

    /// One supplier's facts since `since`, valued at the stored amount.
    pub async fn supplier_facts(
        &self,
        conn: &mut SqliteConnection,
        supplier_id: i64,
        since: DateTime<Utc>,
    ) -> DbResult<Vec<SaleFact>> {
        let facts = sqlx::query_as::<_, SaleFact>(
            r#"
            SELECT sold_at, total_amount_cents AS amount_cents
            FROM sale_lines
            WHERE supplier_id = ?1 AND sold_at >= ?2
            "#,
        )
        .bind(supplier_id)
        .bind(since)
        .fetch_all(&mut *conn)
        .await?;
        Ok(facts)
    }

    /// Stored sale totals per supplier, every supplier included.
    pub async fn supplier_totals(&self, conn: &mut SqliteConnection) -> DbResult<Vec<SupplierTotal>> {
        let totals = sqlx::query_as::<_, SupplierTotal>(
            r#"
            SELECT sp.id AS supplier_id,
                   sp.store_name AS store_name,
                   COALESCE(SUM(s.total_amount_cents), 0) AS total_cents
            FROM suppliers sp
            LEFT JOIN sale_lines s ON s.supplier_id = sp.id
            GROUP BY sp.id, sp.store_name
            ORDER BY total_cents DESC, sp.id
            "#,
        )
        .fetch_all(&mut *conn)
        .await?;
        Ok(totals)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
