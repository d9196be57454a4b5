//! # Engine Error Types
//!
//! `EngineError` is what every engine operation returns; `ApiError` is the
//! serializable form handed to a transport.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in the OTOP Engine                        │
//! │                                                                         │
//! │  CoreError (business rule) ──┐                                         │
//! │                              │                                          │
//! │  DbError (persistence) ──────┼──► EngineError ──┬─► is_retryable()?    │
//! │                              │                  │     yes: roll back,   │
//! │  WriteConflict (CAS miss) ───┘                  │     back off, re-run  │
//! │                                                 │                       │
//! │                                                 ▼                       │
//! │                                            ApiError { code, message }   │
//! │                                                                         │
//! │  {                                                                      │
//! │    "code": "INSUFFICIENT_STOCK",                                        │
//! │    "message": "Insufficient stock for Dried Mango: available 6, ...",  │
//! │    "retryable": false                                                   │
//! │  }                                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::error;

use otop_core::{CoreError, ValidationError};
use otop_db::DbError;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine error covering business rules, persistence and write races.
#[derive(Debug, Error)]
pub enum EngineError {
    // =========================================================================
    // Business Rules
    // =========================================================================
    #[error(transparent)]
    Core(#[from] CoreError),

    // =========================================================================
    // Persistence
    // =========================================================================
    #[error(transparent)]
    Db(#[from] DbError),

    // =========================================================================
    // Concurrency
    // =========================================================================
    /// A compare-and-set stock write found the row changed since it was read.
    #[error("Stock of {table} {id} changed concurrently")]
    WriteConflict { table: &'static str, id: i64 },

    /// Every attempt of a unit of work lost a write race.
    #[error("{operation} gave up after {attempts} conflicting attempts")]
    RetriesExhausted {
        operation: &'static str,
        attempts: u32,
    },

    // =========================================================================
    // Configuration
    // =========================================================================
    /// Invalid engine configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::Core(CoreError::Validation(err))
    }
}

/// Commit and rollback failures come straight from sqlx.
impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::Db(DbError::from(err))
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(err: toml::de::Error) -> Self {
        EngineError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for EngineError {
    fn from(err: toml::ser::Error) -> Self {
        EngineError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

/// Unique columns whose collision means "another writer got there first"
/// rather than "the caller sent a duplicate".
const RACE_COLUMNS: [&str; 5] = [
    "products.id",
    "products.sequential_number",
    "otop_products.id",
    "otop_products.sequential_number",
    "transactions.idempotency_key",
];

impl EngineError {
    /// Returns true if the unit of work lost a write race and may be re-run.
    ///
    /// ## Retryable Errors
    /// - CAS miss on a stock row
    /// - SQLite BUSY / LOCKED / BUSY_SNAPSHOT
    /// - Unique collision on a computed id, sequential code or a
    ///   concurrently inserted idempotency key
    ///
    /// ## Non-Retryable Errors
    /// - Every business-rule failure
    /// - Any other persistence failure
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::WriteConflict { .. } => true,
            EngineError::Db(db) => {
                db.is_busy() || RACE_COLUMNS.iter().any(|c| db.is_unique_violation_on(c))
            }
            _ => false,
        }
    }
}

// =============================================================================
// API Error
// =============================================================================

/// Stable error categories exposed to collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    InsufficientStock,
    InvalidState,
    Forbidden,
    InvalidInput,
    Conflict,
    Internal,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::InsufficientStock => "INSUFFICIENT_STOCK",
            ErrorCode::InvalidState => "INVALID_STATE",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::Internal => "INTERNAL",
        };
        f.write_str(code)
    }
}

/// Structured error returned to the transport layer.
///
/// ## Serialization
/// ```json
/// { "code": "FORBIDDEN", "message": "...", "retryable": false }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,

    /// True when the caller may safely resubmit the same request.
    pub retryable: bool,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
            retryable: false,
        }
    }

    fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let code = match &err {
            CoreError::ProductNotFound(_)
            | CoreError::OrderNotFound(_)
            | CoreError::TransactionNotFound(_)
            | CoreError::SupplierNotFound(_) => ErrorCode::NotFound,
            CoreError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
            CoreError::InvalidOrderStatus { .. } | CoreError::ProductInUse { .. } => {
                ErrorCode::InvalidState
            }
            CoreError::Forbidden { .. } => ErrorCode::Forbidden,
            CoreError::NoValidSupplier
            | CoreError::InsufficientPayment { .. }
            | CoreError::CartTooLarge { .. }
            | CoreError::AmountOverflow { .. }
            | CoreError::Validation(_) => ErrorCode::InvalidInput,
            CoreError::Duplicate { .. } => ErrorCode::Conflict,
        };
        ApiError::new(code, err.to_string())
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => {
                ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", entity, id))
            }
            DbError::UniqueViolation { field, value } => ApiError::new(
                ErrorCode::Conflict,
                format!("{} '{}' already exists", field, value),
            ),
            DbError::Busy(e) => {
                error!("Write conflict reached the API: {}", e);
                ApiError::new(ErrorCode::Conflict, "Concurrent update, please retry").retryable()
            }
            DbError::ForeignKeyViolation { message } => {
                error!("Foreign key violation: {}", message);
                ApiError::new(ErrorCode::InvalidInput, "Invalid reference")
            }
            other => {
                // Log the actual error but return a generic message
                error!("Database failure: {}", other);
                ApiError::new(ErrorCode::Internal, "Database operation failed")
            }
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Core(core) => core.into(),
            EngineError::Db(db) => db.into(),
            EngineError::WriteConflict { .. } | EngineError::RetriesExhausted { .. } => {
                ApiError::new(ErrorCode::Conflict, err.to_string()).retryable()
            }
            EngineError::InvalidConfig(_)
            | EngineError::ConfigLoadFailed(_)
            | EngineError::ConfigSaveFailed(_) => {
                error!("Configuration failure: {}", err);
                ApiError::new(ErrorCode::Internal, "Engine misconfigured")
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use otop_core::Money;

    #[test]
    fn test_retryable_classification() {
        assert!(EngineError::WriteConflict {
            table: "otop_products",
            id: 1
        }
        .is_retryable());
        assert!(EngineError::Db(DbError::Busy("database is locked".into())).is_retryable());
        assert!(EngineError::Db(DbError::duplicate("otop_products.sequential_number", "x"))
            .is_retryable());
        assert!(!EngineError::Db(DbError::duplicate("otop_products.description", "x"))
            .is_retryable());
        assert!(!EngineError::Core(CoreError::NoValidSupplier).is_retryable());
    }

    #[test]
    fn test_api_codes() {
        let stock: ApiError = EngineError::Core(CoreError::InsufficientStock {
            product: "Dried Mango".into(),
            available: 6,
            requested: 10,
        })
        .into();
        assert_eq!(stock.code, ErrorCode::InsufficientStock);
        assert!(!stock.retryable);

        let state: ApiError = CoreError::InvalidOrderStatus {
            order_id: 1,
            current_status: "verified".into(),
        }
        .into();
        assert_eq!(state.code, ErrorCode::InvalidState);

        let payment: ApiError = CoreError::InsufficientPayment {
            received: Money::from_cents(100),
            total: Money::from_cents(500),
        }
        .into();
        assert_eq!(payment.code, ErrorCode::InvalidInput);

        let dup: ApiError = CoreError::duplicate("description", "Silk").into();
        assert_eq!(dup.code, ErrorCode::Conflict);

        let exhausted: ApiError = EngineError::RetriesExhausted {
            operation: "checkout",
            attempts: 9,
        }
        .into();
        assert_eq!(exhausted.code, ErrorCode::Conflict);
        assert!(exhausted.retryable);
    }

    #[test]
    fn test_internal_message_is_generic() {
        let api: ApiError = DbError::QueryFailed("no such column: secret".into()).into();
        assert_eq!(api.code, ErrorCode::Internal);
        assert!(!api.message.contains("secret"));
    }

    #[test]
    fn test_serialized_shape() {
        let api = ApiError::new(ErrorCode::Forbidden, "nope");
        let json = serde_json::to_value(&api).unwrap();
        assert_eq!(json["code"], "FORBIDDEN");
        assert_eq!(json["retryable"], false);
    }
}
