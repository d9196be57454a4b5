//! # otop-db: Database Layer for the OTOP POS Engine
//!
//! SQLite persistence for catalog stock, orders, sale lines, checkout
//! transactions and suppliers.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        OTOP POS Data Flow                               │
//! │                                                                         │
//! │  Engine operation (checkout, create_order, record_sales, ...)          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     otop-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ CatalogStore  │    │              │  │   │
//! │  │   │ SqlitePool    │    │ OrderRepo     │    │ 001_initial  │  │   │
//! │  │   │ UnitOfWork    │◄───│ SaleRepo      │    │ _schema.sql  │  │   │
//! │  │   │               │    │ TransactionRe │    │              │  │   │
//! │  │   │               │    │ SupplierRepo  │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool, configuration and units of work
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use otop_db::{Database, DbConfig};
//! use otop_core::CatalogTable;
//!
//! let db = Database::new(DbConfig::new("otop.db")).await?;
//!
//! let mut tx = db.begin().await?;
//! let product = db.catalog(CatalogTable::OtopProducts).get(&mut tx, 10000).await?;
//! tx.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig, UnitOfWork};

// Repository re-exports for convenience
pub use repository::catalog::{CatalogStore, StockWrite};
pub use repository::order::{NewOrderRow, OrderRepository};
pub use repository::sale::{NewSaleLineRow, SaleRepository};
pub use repository::supplier::SupplierRepository;
pub use repository::transaction::{NewTransactionItemRow, NewTransactionRow, TransactionRepository};
