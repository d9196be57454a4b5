//! # Transaction Repository
//!
//! Checkout headers, their line items and the suppliers each checkout
//! touched.
//!
//! ```text
//! transactions            1 ──── * transaction_items      (per-line supplier)
//!   supplier_id (primary) 1 ──── * transaction_suppliers  (every supplier)
//!   idempotency_key UNIQUE
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use otop_core::{Transaction, TransactionItem};

const TRANSACTION_COLUMNS: &str =
    "id, supplier_id, total_cents, received_cents, change_cents, idempotency_key, created_at";

const ITEM_COLUMNS: &str =
    "id, transaction_id, product_id, product_name, supplier_id, quantity, price_cents, subtotal_cents";

#[derive(Debug, Clone)]
pub struct NewTransactionRow<'a> {
    pub supplier_id: Option<i64>,
    pub total_cents: i64,
    pub received_cents: i64,
    pub change_cents: i64,
    pub idempotency_key: Option<&'a str>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTransactionItemRow<'a> {
    pub product_id: i64,
    pub product_name: &'a str,
    pub supplier_id: Option<i64>,
    pub quantity: i64,
    pub price_cents: i64,
    pub subtotal_cents: i64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionRepository;

impl TransactionRepository {
    pub async fn get(&self, conn: &mut SqliteConnection, id: i64) -> DbResult<Option<Transaction>> {
        let sql = format!(
            "SELECT {} FROM transactions WHERE id = ?1",
            TRANSACTION_COLUMNS
        );
        let tx = sqlx::query_as::<_, Transaction>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(tx)
    }

    pub async fn find_by_idempotency_key(
        &self,
        conn: &mut SqliteConnection,
        key: &str,
    ) -> DbResult<Option<Transaction>> {
        let sql = format!(
            "SELECT {} FROM transactions WHERE idempotency_key = ?1",
            TRANSACTION_COLUMNS
        );
        let tx = sqlx::query_as::<_, Transaction>(&sql)
            .bind(key)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(tx)
    }

    pub async fn insert_header(
        &self,
        conn: &mut SqliteConnection,
        row: &NewTransactionRow<'_>,
    ) -> DbResult<Transaction> {
        let sql = format!(
            "INSERT INTO transactions (supplier_id, total_cents, received_cents, change_cents, \
             idempotency_key, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6) RETURNING {}",
            TRANSACTION_COLUMNS
        );
        let tx = sqlx::query_as::<_, Transaction>(&sql)
            .bind(row.supplier_id)
            .bind(row.total_cents)
            .bind(row.received_cents)
            .bind(row.change_cents)
            .bind(row.idempotency_key)
            .bind(row.created_at)
            .fetch_one(&mut *conn)
            .await?;

        debug!(transaction_id = tx.id, total_cents = tx.total_cents, "Transaction header inserted");
        Ok(tx)
    }

    pub async fn insert_item(
        &self,
        conn: &mut SqliteConnection,
        transaction_id: i64,
        row: &NewTransactionItemRow<'_>,
    ) -> DbResult<TransactionItem> {
        let sql = format!(
            "INSERT INTO transaction_items (transaction_id, product_id, product_name, supplier_id, \
             quantity, price_cents, subtotal_cents) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) RETURNING {}",
            ITEM_COLUMNS
        );
        let item = sqlx::query_as::<_, TransactionItem>(&sql)
            .bind(transaction_id)
            .bind(row.product_id)
            .bind(row.product_name)
            .bind(row.supplier_id)
            .bind(row.quantity)
            .bind(row.price_cents)
            .bind(row.subtotal_cents)
            .fetch_one(&mut *conn)
            .await?;
        Ok(item)
    }

    /// Records that a checkout touched `supplier_id`.
    pub async fn link_supplier(
        &self,
        conn: &mut SqliteConnection,
        transaction_id: i64,
        supplier_id: i64,
    ) -> DbResult<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO transaction_suppliers (transaction_id, supplier_id) VALUES (?1, ?2)",
        )
        .bind(transaction_id)
        .bind(supplier_id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Line items in insertion order.
    pub async fn items(
        &self,
        conn: &mut SqliteConnection,
        transaction_id: i64,
    ) -> DbResult<Vec<TransactionItem>> {
        let sql = format!(
            "SELECT {} FROM transaction_items WHERE transaction_id = ?1 ORDER BY id",
            ITEM_COLUMNS
        );
        let items = sqlx::query_as::<_, TransactionItem>(&sql)
            .bind(transaction_id)
            .fetch_all(&mut *conn)
            .await?;
        Ok(items)
    }

    /// Suppliers touched by a checkout, ascending.
    pub async fn supplier_ids(
        &self,
        conn: &mut SqliteConnection,
        transaction_id: i64,
    ) -> DbResult<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT supplier_id FROM transaction_suppliers WHERE transaction_id = ?1 ORDER BY supplier_id",
        )
        .bind(transaction_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support;
    use otop_core::CatalogTable;

    #[tokio::test]
    async fn test_header_items_and_suppliers() {
        let db = test_support::database().await;
        let mut tx = db.begin().await.unwrap();
        let a = test_support::supplier(&mut tx, "Store A").await;
        let b = test_support::supplier(&mut tx, "Store B").await;
        test_support::product(&mut tx, CatalogTable::OtopProducts, 10000, Some(b), 500, 10).await;

        let key = "6f1c1d4e-8f4a-4a53-9a53-0b7c2f6b1e11";
        let header = TransactionRepository
            .insert_header(
                &mut tx,
                &NewTransactionRow {
                    supplier_id: Some(a),
                    total_cents: 1000,
                    received_cents: 2000,
                    change_cents: 1000,
                    idempotency_key: Some(key),
                    created_at: Utc::now(),
                },
            )
            .await
            .unwrap();

        TransactionRepository
            .insert_item(
                &mut tx,
                header.id,
                &NewTransactionItemRow {
                    product_id: 10000,
                    product_name: "Product 10000",
                    supplier_id: Some(b),
                    quantity: 2,
                    price_cents: 500,
                    subtotal_cents: 1000,
                },
            )
            .await
            .unwrap();

        TransactionRepository.link_supplier(&mut tx, header.id, b).await.unwrap();
        TransactionRepository.link_supplier(&mut tx, header.id, a).await.unwrap();
        TransactionRepository.link_supplier(&mut tx, header.id, a).await.unwrap();
        tx.commit().await.unwrap();

        let mut conn = db.acquire().await.unwrap();
        let found = TransactionRepository
            .find_by_idempotency_key(&mut conn, key)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, header.id);

        let items = TransactionRepository.items(&mut conn, header.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].supplier_id, Some(b));

        let suppliers = TransactionRepository.supplier_ids(&mut conn, header.id).await.unwrap();
        assert_eq!(suppliers, vec![a, b]);
    }

    #[tokio::test]
    async fn test_rolled_back_header_leaves_nothing() {
        let db = test_support::database().await;
        let mut tx = db.begin().await.unwrap();
        let header = TransactionRepository
            .insert_header(
                &mut tx,
                &NewTransactionRow {
                    supplier_id: None,
                    total_cents: 500,
                    received_cents: 500,
                    change_cents: 0,
                    idempotency_key: None,
                    created_at: Utc::now(),
                },
            )
            .await
            .unwrap();
        drop(tx);

        let mut conn = db.acquire().await.unwrap();
        assert!(TransactionRepository.get(&mut conn, header.id).await.unwrap().is_none());
    }
}
