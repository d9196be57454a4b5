//! # Stock Ledger
//!
//! Single-claim reservation and release against one catalog table.
//!
//! ## Reservation Steps
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │               reserve(product, qty) inside a unit of work              │
//! │                                                                         │
//! │  1. get(product)              ── absent ──► ProductNotFound            │
//! │  2. quantity ≥ qty?           ── no ──────► InsufficientStock          │
//! │  3. try_set_quantity(product, expected = quantity, new = quantity-qty) │
//! │         │                                                               │
//! │         ├── Committed ──► Reservation { name, unit price, supplier }   │
//! │         └── Conflict ───► WriteConflict (unit of work is re-run)       │
//! │                                                                         │
//! │  Nothing here commits. The caller commits the reservation together    │
//! │  with the order, sale line or transaction item that records it.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::SqliteConnection;
use tracing::{debug, warn};

use crate::error::{EngineError, EngineResult};
use otop_core::{CatalogTable, CoreError, Product, Reservation};
use otop_db::{CatalogStore, StockWrite};

/// Reserve/release operations over one catalog table.
#[derive(Debug, Clone, Copy)]
pub struct StockLedger {
    store: CatalogStore,
}

impl StockLedger {
    pub fn new(table: CatalogTable) -> Self {
        StockLedger {
            store: CatalogStore::new(table),
        }
    }

    fn table_label(&self) -> &'static str {
        self.store.table().table_name()
    }

    /// Loads a product or fails `ProductNotFound`.
    pub async fn load(&self, conn: &mut SqliteConnection, product_id: i64) -> EngineResult<Product> {
        self.store
            .get(conn, product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id).into())
    }

    /// Takes `quantity` units from `product_id`.
    ///
    /// Fails without writing anything when the product is missing or holds
    /// fewer than `quantity` units.
    pub async fn reserve(
        &self,
        conn: &mut SqliteConnection,
        product_id: i64,
        quantity: i64,
    ) -> EngineResult<Reservation> {
        let product = self.load(conn, product_id).await?;
        product.ensure_available(quantity)?;

        let remaining = product.quantity - quantity;
        match self
            .store
            .try_set_quantity(conn, product_id, product.quantity, remaining)
            .await?
        {
            StockWrite::Committed => {
                debug!(
                    table = self.table_label(),
                    product_id,
                    quantity,
                    remaining,
                    "Stock reserved"
                );
                Ok(Reservation {
                    product_id,
                    product_name: product.name,
                    unit_price_cents: product.price_cents,
                    supplier_id: product.supplier_id,
                    quantity,
                    remaining,
                })
            }
            StockWrite::Conflict => {
                warn!(table = self.table_label(), product_id, "Stock changed under reservation");
                Err(EngineError::WriteConflict {
                    table: self.table_label(),
                    id: product_id,
                })
            }
        }
    }

    /// Gives `quantity` units back to `product_id`.
    ///
    /// A product that no longer exists has nowhere to take the units back;
    /// that is logged and skipped. Returns the new quantity when written.
    pub async fn release(
        &self,
        conn: &mut SqliteConnection,
        product_id: i64,
        quantity: i64,
    ) -> EngineResult<Option<i64>> {
        let Some(product) = self.store.get(conn, product_id).await? else {
            warn!(table = self.table_label(), product_id, quantity, "Release skipped, product is gone");
            return Ok(None);
        };

        let restored = product.quantity + quantity;
        match self
            .store
            .try_set_quantity(conn, product_id, product.quantity, restored)
            .await?
        {
            StockWrite::Committed => {
                debug!(table = self.table_label(), product_id, quantity, restored, "Stock released");
                Ok(Some(restored))
            }
            StockWrite::Conflict => Err(EngineError::WriteConflict {
                table: self.table_label(),
                id: product_id,
            }),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
