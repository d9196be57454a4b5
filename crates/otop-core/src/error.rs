//! # Error Types
//!
//! Domain-specific error types for otop-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Hierarchy                                 │
//! │                                                                         │
//! │  CoreError (business rules, detected BEFORE any mutation)              │
//! │  ├── ProductNotFound / OrderNotFound / SupplierNotFound / ...          │
//! │  ├── InsufficientStock { product, available, requested }               │
//! │  ├── InvalidOrderStatus / ProductInUse     (invalid state)             │
//! │  ├── Forbidden { reason }                                              │
//! │  ├── NoValidSupplier / InsufficientPayment (invalid input)             │
//! │  ├── AmountOverflow { context }            (invalid input)             │
//! │  ├── Duplicate { field, value }            (conflict)                  │
//! │  └── Validation(ValidationError)                                       │
//! │       ├── Required { field }                                           │
//! │       ├── TooLong { field, max }                                       │
//! │       ├── OutOfRange { field, min, max }                               │
//! │       ├── MustBePositive { field }                                     │
//! │       ├── InvalidFormat { field, reason }                              │
//! │       └── NotAllowed { field, allowed }                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (product, order id, etc.)
//! 3. Each variant maps to exactly one outward error category

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// Every variant is a business-rule failure: the engine returns it before
/// any stock has moved, or rolls the whole unit of work back.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product cannot be found in the catalog table it was looked up in.
    #[error("Product not found: {0}")]
    ProductNotFound(i64),

    /// Order cannot be found.
    #[error("Order not found: {0}")]
    OrderNotFound(i64),

    /// Checkout transaction cannot be found.
    #[error("Transaction not found: {0}")]
    TransactionNotFound(i64),

    /// Supplier cannot be found (by id or by store name).
    #[error("Supplier not found: {0}")]
    SupplierNotFound(String),

    /// Requested quantity exceeds what is on hand.
    ///
    /// ## User Workflow
    /// ```text
    /// reserve(product=1, qty=10)
    ///      ▼
    /// Check stock: available=6
    ///      ▼
    /// InsufficientStock { product: "Dried Mango", available: 6, requested: 10 }
    ///      ▼
    /// Nothing was decremented
    /// ```
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// Order is not in a state that allows the requested operation.
    #[error("Order {order_id} is {current_status}, cannot perform operation")]
    InvalidOrderStatus {
        order_id: i64,
        current_status: String,
    },

    /// Product still backs pending orders and cannot be removed.
    #[error("Product {product_id} is referenced by {pending_orders} pending order(s)")]
    ProductInUse {
        product_id: i64,
        pending_orders: i64,
    },

    /// The principal has no authority over the resource.
    #[error("Forbidden: {reason}")]
    Forbidden { reason: String },

    /// None of the checkout lines belongs to a supplier.
    #[error("No valid supplier found for the cart")]
    NoValidSupplier,

    /// Amount received does not cover the expected total.
    #[error("Received amount {received} is less than the total {total}")]
    InsufficientPayment { received: Money, total: Money },

    /// Cart has exceeded maximum allowed lines.
    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    /// A line or cart total does not fit in a money amount.
    #[error("Amount for {context} is too large")]
    AmountOverflow { context: String },

    /// Unique value already taken (store name, product description).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a Forbidden error.
    pub fn forbidden(reason: impl Into<String>) -> Self {
        CoreError::Forbidden {
            reason: reason.into(),
        }
    }

    /// Creates a Duplicate error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        CoreError::Duplicate {
            field: field.into(),
            value: value.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised by the `validation` module before a unit of work begins.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
