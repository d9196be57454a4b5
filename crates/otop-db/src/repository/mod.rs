//! # Repository Module
//!
//! Database repository implementations for the OTOP POS engine.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repositories and Units of Work                       │
//! │                                                                         │
//! │  Engine operation                                                      │
//! │       │                                                                 │
//! │       │  let mut tx = db.begin().await?;                               │
//! │       │  db.catalog(table).get(&mut tx, id)                            │
//! │       │  db.catalog(table).try_set_quantity(&mut tx, id, 10, 6)        │
//! │       │  db.sales().insert(&mut tx, &row)                              │
//! │       │  tx.commit().await?;                                           │
//! │       ▼                                                                 │
//! │  Repositories hold no connection of their own. Every method takes      │
//! │  `&mut SqliteConnection`, so the same calls work on a pooled           │
//! │  connection (reads) or inside a transaction (units of work).           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CatalogStore`](catalog::CatalogStore) - Product stock, both catalog tables
//! - [`OrderRepository`](order::OrderRepository) - Admin orders
//! - [`SaleRepository`](sale::SaleRepository) - Sale lines and sales facts
//! - [`TransactionRepository`](transaction::TransactionRepository) - Checkout records
//! - [`SupplierRepository`](supplier::SupplierRepository) - Suppliers and purchase counters

pub mod catalog;
pub mod order;
pub mod sale;
pub mod supplier;
pub mod transaction;

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;
    use sqlx::SqliteConnection;

    use crate::pool::{Database, DbConfig};
    use crate::repository::catalog::CatalogStore;
    use crate::repository::supplier::SupplierRepository;
    use otop_core::{CatalogTable, Category, NewSupplier, Product};

    pub async fn database() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    pub async fn supplier(conn: &mut SqliteConnection, store_name: &str) -> i64 {
        SupplierRepository
            .insert(
                conn,
                &NewSupplier {
                    store_name: store_name.to_string(),
                    owner_name: None,
                    email: None,
                    phone: None,
                    address: None,
                },
                Utc::now(),
            )
            .await
            .unwrap()
            .id
    }

    pub async fn product(
        conn: &mut SqliteConnection,
        table: CatalogTable,
        id: i64,
        supplier_id: Option<i64>,
        price_cents: i64,
        quantity: i64,
    ) -> Product {
        let now = Utc::now();
        let product = Product {
            id,
            sequential_number: table.sequence_scope().format(id as u64),
            name: format!("Product {}", id),
            description: Some(format!("Description {}", id)),
            category: Category::Food,
            price_cents,
            quantity,
            supplier_id,
            store_name: None,
            created_at: now,
            updated_at: now,
        };
        CatalogStore::new(table).insert(conn, &product).await.unwrap();
        product
    }
}
