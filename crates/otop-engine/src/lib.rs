//! # otop-engine: Units of Work for the OTOP POS Engine
//!
//! Every operation that claims shared stock, and the sales reports that
//! read back what was committed.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       OTOP Engine Architecture                          │
//! │                                                                         │
//! │  Transport (principal + typed payload)                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌───────────────────────────────────────────────────────────────────┐ │
//! │  │                           Engine                                  │ │
//! │  │                                                                   │ │
//! │  │  authority check ──► payload validation ──► with_retry(...)      │ │
//! │  │                                                 │                 │ │
//! │  │                           ┌─────────────────────┘                 │ │
//! │  │                           ▼                                       │ │
//! │  │              one unit of work (db.begin())                        │ │
//! │  │   ┌──────────────┐  ┌──────────────┐  ┌──────────────────────┐   │ │
//! │  │   │ StockLedger  │  │ fact record  │  │ supplier counters /  │   │ │
//! │  │   │ reserve /    │─►│ order, sale, │─►│ attribution rows     │   │ │
//! │  │   │ release      │  │ transaction  │  │                      │   │ │
//! │  │   └──────────────┘  └──────────────┘  └──────────────────────┘   │ │
//! │  │                           │                                       │ │
//! │  │                        commit (all or nothing)                    │ │
//! │  └───────────────────────────────────────────────────────────────────┘ │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Receipt / Order / SaleLine / SalesReport   or   ApiError              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`ledger`] - Single-claim reserve and release
//! - [`orders`] - Order placement, edits and supplier confirmation
//! - [`sales`] - POS sale batches
//! - [`checkout`] - Multi-line settlement with receipts
//! - [`catalog`] - Products, suppliers and sequential codes
//! - [`reports`] - Sales aggregation
//! - [`retry`] - Conflict retry with exponential backoff
//! - [`config`] - Engine configuration
//! - [`error`] - Engine and API errors
//! - [`telemetry`] - Tracing setup
//!
//! ## Usage
//! ```rust,ignore
//! let config = EngineConfig::load_or_default(None);
//! let engine = Engine::open(&config).await?;
//!
//! let receipt = engine
//!     .checkout(Principal::cashier(3), &CheckoutRequest { .. })
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod catalog;
pub mod checkout;
pub mod config;
pub mod error;
pub mod ledger;
pub mod orders;
pub mod reports;
pub mod retry;
pub mod sales;
pub mod telemetry;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::EngineConfig;
pub use error::{ApiError, EngineError, EngineResult, ErrorCode};
pub use ledger::StockLedger;
pub use retry::RetryPolicy;
pub use telemetry::init_tracing;

use otop_core::WeekStart;
use otop_db::Database;
use tracing::info;

// =============================================================================
// Engine
// =============================================================================

/// Entry point for every engine operation.
///
/// Cheap to clone: clones share the connection pool.
#[derive(Debug, Clone)]
pub struct Engine {
    db: Database,
    retry: RetryPolicy,
    week_start: WeekStart,
}

impl Engine {
    /// Builds an engine over an already opened database.
    pub fn new(db: Database, config: &EngineConfig) -> Self {
        Engine {
            db,
            retry: RetryPolicy::from(&config.ledger),
            week_start: config.reports.week_start,
        }
    }

    /// Opens the database named by `config` (running migrations) and
    /// builds an engine over it.
    pub async fn open(config: &EngineConfig) -> EngineResult<Self> {
        let db = Database::new(config.database.db_config()).await?;
        info!(
            path = %config.database.path.display(),
            max_retries = config.ledger.max_conflict_retries,
            "Engine ready"
        );
        Ok(Engine::new(db, config))
    }

    /// Replaces the conflict retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn week_start(&self) -> WeekStart {
        self.week_start
    }
}

// =============================================================================
// Test Support
// =============================================================================

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;
    use std::path::Path;
    use std::time::Duration;

    use super::*;
    use otop_core::sequence::next_product_id;
    use otop_core::{CatalogTable, Category, NewSupplier, Product};
    use otop_db::{CatalogStore, DbConfig};

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_retries: 50,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(20),
        }
    }

    /// Single-connection in-memory engine.
    pub async fn engine() -> Engine {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        Engine::new(db, &EngineConfig::default()).with_retry_policy(fast_retry())
    }

    /// File-backed engine with several connections, for write races.
    pub async fn file_engine(dir: &Path, max_connections: u32) -> Engine {
        let config = DbConfig::new(dir.join("otop.db"))
            .max_connections(max_connections)
            .busy_timeout(Duration::from_secs(10));
        let db = Database::new(config).await.unwrap();
        Engine::new(db, &EngineConfig::default()).with_retry_policy(fast_retry())
    }

    pub async fn supplier(engine: &Engine, store_name: &str) -> i64 {
        engine
            .register_supplier(NewSupplier {
                store_name: store_name.to_string(),
                owner_name: Some("Owner".to_string()),
                email: None,
                phone: None,
                address: None,
            })
            .await
            .unwrap()
            .id
    }

    /// Inserts a product directly, bypassing authority checks.
    pub async fn product(
        engine: &Engine,
        table: CatalogTable,
        supplier_id: Option<i64>,
        price_cents: i64,
        quantity: i64,
    ) -> i64 {
        let store = CatalogStore::new(table);
        let mut conn = engine.db().acquire().await.unwrap();
        let id = next_product_id(store.max_id(&mut conn).await.unwrap());
        let codes = store.sequential_numbers(&mut conn).await.unwrap();
        let now = Utc::now();
        let product = Product {
            id,
            sequential_number: table
                .sequence_scope()
                .next_code(codes.iter().map(String::as_str)),
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
        store.insert(&mut conn, &product).await.unwrap();
        id
    }

    pub async fn otop_product(
        engine: &Engine,
        supplier_id: Option<i64>,
        price_cents: i64,
        quantity: i64,
    ) -> i64 {
        product(engine, CatalogTable::OtopProducts, supplier_id, price_cents, quantity).await
    }

    pub async fn catalog_product(
        engine: &Engine,
        supplier_id: Option<i64>,
        price_cents: i64,
        quantity: i64,
    ) -> i64 {
        product(engine, CatalogTable::Products, supplier_id, price_cents, quantity).await
    }

    pub async fn quantity(engine: &Engine, table: CatalogTable, id: i64) -> i64 {
        engine.get_product(table, id).await.unwrap().quantity
    }

    pub async fn otop_quantity(engine: &Engine, id: i64) -> i64 {
        quantity(engine, CatalogTable::OtopProducts, id).await
    }
}
