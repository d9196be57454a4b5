//! # Supplier Repository
//!
//! Stores and their running purchase counters.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use otop_core::{NewSupplier, Supplier};

const SUPPLIER_COLUMNS: &str =
    "id, store_name, owner_name, email, phone, address, purchased, created_at";

#[derive(Debug, Clone, Copy, Default)]
pub struct SupplierRepository;

impl SupplierRepository {
    pub async fn get(&self, conn: &mut SqliteConnection, id: i64) -> DbResult<Option<Supplier>> {
        let sql = format!("SELECT {} FROM suppliers WHERE id = ?1", SUPPLIER_COLUMNS);
        let supplier = sqlx::query_as::<_, Supplier>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(supplier)
    }

    /// Looks a supplier up by its unique store name.
    pub async fn get_by_store_name(
        &self,
        conn: &mut SqliteConnection,
        store_name: &str,
    ) -> DbResult<Option<Supplier>> {
        let sql = format!(
            "SELECT {} FROM suppliers WHERE store_name = ?1",
            SUPPLIER_COLUMNS
        );
        let supplier = sqlx::query_as::<_, Supplier>(&sql)
            .bind(store_name.trim())
            .fetch_optional(&mut *conn)
            .await?;
        Ok(supplier)
    }

    pub async fn insert(
        &self,
        conn: &mut SqliteConnection,
        new: &NewSupplier,
        created_at: DateTime<Utc>,
    ) -> DbResult<Supplier> {
        let sql = format!(
            "INSERT INTO suppliers (store_name, owner_name, email, phone, address, purchased, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6) RETURNING {}",
            SUPPLIER_COLUMNS
        );
        let supplier = sqlx::query_as::<_, Supplier>(&sql)
            .bind(new.store_name.trim())
            .bind(&new.owner_name)
            .bind(&new.email)
            .bind(&new.phone)
            .bind(&new.address)
            .bind(created_at)
            .fetch_one(&mut *conn)
            .await?;

        debug!(supplier_id = supplier.id, store = %supplier.store_name, "Supplier inserted");
        Ok(supplier)
    }

    /// Adds `by` to the supplier's purchase counter.
    ///
    /// Returns false when the supplier does not exist.
    pub async fn increment_purchased(
        &self,
        conn: &mut SqliteConnection,
        id: i64,
        by: i64,
    ) -> DbResult<bool> {
        let result = sqlx::query("UPDATE suppliers SET purchased = purchased + ?1 WHERE id = ?2")
            .bind(by)
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}
