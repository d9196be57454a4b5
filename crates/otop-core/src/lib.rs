//! # otop-core: Pure Business Logic for the OTOP POS Engine
//!
//! Domain types and every rule that can be decided without touching the
//! database: validation, the order state machine, checkout attribution,
//! sequential display codes and sales bucketing.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        OTOP POS Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │          Transport (admin dashboard, POS counter)               │   │
//! │  │    principal {id, role} + typed payloads                        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 otop-engine (units of work)                     │   │
//! │  │   stock ledger • orders • checkout • catalog • sales reports    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ otop-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │  ┌────────┐ ┌───────┐ ┌───────┐ ┌──────────┐ ┌──────┐ ┌──────┐ │   │
//! │  │  │ types  │ │ money │ │ order │ │ checkout │ │ seq. │ │report│ │   │
//! │  │  └────────┘ └───────┘ └───────┘ └──────────┘ └──────┘ └──────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    otop-db (Database Layer)                     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Order, SaleLine, Transaction, ...)
//! - [`money`] - Money type with integer arithmetic
//! - [`error`] - Domain error types
//! - [`validation`] - Payload validation
//! - [`order`] - Order state machine and update reconciliation
//! - [`checkout`] - Payment check and supplier attribution
//! - [`sequence`] - Sequential display codes
//! - [`report`] - Sales bucketing by day/week/month/year
//!
//! ## Example Usage
//!
//! ```rust
//! use otop_core::sequence::SequenceScope;
//! use otop_core::Money;
//!
//! let price = Money::from_cents(500);
//! assert_eq!(price.multiply_quantity(4).to_string(), "$20.00");
//!
//! assert_eq!(SequenceScope::OtopProduct.next_code(["SP-0041"]), "SP-0042");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod error;
pub mod money;
pub mod order;
pub mod report;
pub mod sequence;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use report::{Period, SaleFact, SalesBucket, SalesReport, SupplierTotal, WeekStart};
pub use sequence::SequenceScope;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single cart or sale batch.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single POS line.
///
/// Guards against a mistyped quantity at the counter (1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Highest catalog price in cents (10,000,000.00).
///
/// A full cart at this price and [`MAX_ITEM_QUANTITY`] per line still fits
/// in an i64 amount.
pub const MAX_PRICE_CENTS: i64 = 1_000_000_000;
