//! # Domain Types
//!
//! Core domain types used throughout the OTOP POS engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │     Order       │   │    SaleLine     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (i64)       │   │  product_id     │   │  product_id     │       │
//! │  │  seq. number    │◄──│  name snapshot  │   │  name snapshot  │       │
//! │  │  category       │   │  price snapshot │   │  total_amount   │       │
//! │  │  quantity ≥ 0   │   │  status         │   │  supplier_id    │       │
//! │  │  supplier_id    │   │  supplier_id    │   │  sold_at        │       │
//! │  └────────┬────────┘   └─────────────────┘   └─────────────────┘       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Supplier     │◄──│  Transaction    │──►│ TransactionItem │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  store_name     │   │  supplier_id    │   │  price snapshot │       │
//! │  │  purchased      │   │  total/received │   │  subtotal       │       │
//! │  └─────────────────┘   │  change         │   │  supplier_id    │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! Orders, sale lines and transaction items copy the product name and unit
//! price at the moment stock is reserved. The product reference becomes
//! `None` when the product is deleted; the snapshot survives.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::sequence::SequenceScope;

// =============================================================================
// Category
// =============================================================================

/// Product category. Only two values are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[ts(export)]
pub enum Category {
    #[serde(rename = "Food")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "Food"))]
    Food,
    #[serde(rename = "Non-Food")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "Non-Food"))]
    NonFood,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Food, Category::NonFood];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Food => "Food",
            Category::NonFood => "Non-Food",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Food" => Ok(Category::Food),
            "Non-Food" => Ok(Category::NonFood),
            _ => Err(ValidationError::NotAllowed {
                field: "category".to_string(),
                allowed: Category::ALL.iter().map(|c| c.to_string()).collect(),
            }),
        }
    }
}

// =============================================================================
// Catalog Table
// =============================================================================

/// Which catalog a product lives in.
///
/// ```text
/// Products     ── supplier catalog, claimed by admin orders    (P-10001)
/// OtopProducts ── marketplace stock sold at the POS counter    (SP-0001)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CatalogTable {
    Products,
    OtopProducts,
}

impl CatalogTable {
    /// The sequence scope that numbers this table's display codes.
    pub fn sequence_scope(&self) -> SequenceScope {
        match self {
            CatalogTable::Products => SequenceScope::Product,
            CatalogTable::OtopProducts => SequenceScope::OtopProduct,
        }
    }

    /// SQL table name.
    pub fn table_name(&self) -> &'static str {
        match self {
            CatalogTable::Products => "products",
            CatalogTable::OtopProducts => "otop_products",
        }
    }
}

// =============================================================================
// Principal
// =============================================================================

/// Role carried by an authenticated principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Supplier,
    Cashier,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Supplier => write!(f, "supplier"),
            Role::Cashier => write!(f, "cashier"),
        }
    }
}

/// The authenticated caller attached to every mutating request.
///
/// Credentials are validated upstream; the engine only checks authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Principal {
    pub id: i64,
    pub role: Role,
}

impl Principal {
    pub fn admin(id: i64) -> Self {
        Principal { id, role: Role::Admin }
    }

    pub fn supplier(id: i64) -> Self {
        Principal {
            id,
            role: Role::Supplier,
        }
    }

    pub fn cashier(id: i64) -> Self {
        Principal {
            id,
            role: Role::Cashier,
        }
    }

    /// Fails `Forbidden` unless the principal holds one of `roles`.
    pub fn require_any(&self, roles: &[Role], action: &str) -> CoreResult<()> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(CoreError::forbidden(format!(
                "{} {} may not {}",
                self.role, self.id, action
            )))
        }
    }

    /// Fails `Forbidden` unless the principal is the supplier `owner`.
    pub fn require_supplier(&self, owner: Option<i64>, action: &str) -> CoreResult<()> {
        if self.role == Role::Supplier && owner == Some(self.id) {
            Ok(())
        } else {
            Err(CoreError::forbidden(format!(
                "{} {} does not own the resource and may not {}",
                self.role, self.id, action
            )))
        }
    }
}

// =============================================================================
// Product
// =============================================================================

/// A stocked product, in either catalog table.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Numeric identity (seeded at 10000).
    pub id: i64,

    /// Human-facing display code ("P-10001", "SP-0001").
    pub sequential_number: String,

    pub name: String,

    pub description: Option<String>,

    pub category: Category,

    /// Price in cents.
    pub price_cents: i64,

    /// Quantity on hand. Never negative.
    pub quantity: i64,

    /// Owning supplier. `None` once the supplier has been removed.
    pub supplier_id: Option<i64>,

    /// Store name of the owning supplier at creation time.
    pub store_name: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Checks that `requested` units can be taken from stock.
    pub fn ensure_available(&self, requested: i64) -> CoreResult<()> {
        if self.quantity < requested {
            return Err(CoreError::InsufficientStock {
                product: self.name.clone(),
                available: self.quantity,
                requested,
            });
        }
        Ok(())
    }
}

/// Payload for a supplier adding a product to their own catalog.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub price_cents: i64,
    pub quantity: i64,
}

/// Payload for an admin listing a marketplace product for a store.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewOtopProduct {
    pub name: String,
    /// Required and unique across the marketplace catalog.
    pub description: String,
    pub category: String,
    pub price_cents: i64,
    pub quantity: i64,
    /// Supplier is resolved by store name.
    pub store_name: String,
}

/// Explicit supplier edit of an existing product.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductUpdate {
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub price_cents: i64,
    pub quantity: i64,
}

/// Result of one stock reservation: what the caller embeds in its record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Reservation {
    pub product_id: i64,
    pub product_name: String,
    pub unit_price_cents: i64,
    pub supplier_id: Option<i64>,
    pub quantity: i64,
    /// Stock left after the decrement.
    pub remaining: i64,
}

impl Reservation {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Unit price × reserved quantity.
    pub fn line_total(&self) -> CoreResult<Money> {
        self.unit_price()
            .checked_multiply_quantity(self.quantity)
            .ok_or_else(|| CoreError::AmountOverflow {
                context: format!("product {}", self.product_id),
            })
    }
}

// =============================================================================
// Supplier
// =============================================================================

/// A store that owns catalog stock.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Supplier {
    pub id: i64,
    /// Unique store name.
    pub store_name: String,
    pub owner_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    /// Running count of sales attributed to this supplier.
    pub purchased: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewSupplier {
    pub store_name: String,
    pub owner_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

// =============================================================================
// Order
// =============================================================================

/// Order lifecycle: `pending` → `verified`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Verified,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::Verified => write!(f, "verified"),
        }
    }
}

/// An admin-initiated claim against one supplier product.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    pub id: i64,
    /// `None` once the product has been deleted.
    pub product_id: Option<i64>,
    /// Product name at order time (frozen).
    pub product_name: String,
    /// Unit price in cents at order time (frozen).
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub description: Option<String>,
    pub status: OrderStatus,
    /// Supplier owning the ordered product.
    pub supplier_id: i64,
    /// Admin who placed the order.
    pub admin_id: i64,
    #[ts(as = "String")]
    pub order_date: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Order value at the frozen price, `None` if it overflows.
    #[inline]
    pub fn total(&self) -> Option<Money> {
        self.unit_price().checked_multiply_quantity(self.quantity)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewOrder {
    pub product_id: i64,
    pub quantity: i64,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderUpdate {
    pub product_id: i64,
    pub quantity: i64,
    pub description: Option<String>,
}

// =============================================================================
// Sale Line
// =============================================================================

/// One sold product in a POS sale batch.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleLine {
    pub id: i64,
    pub product_id: Option<i64>,
    /// Product name at sale time (frozen).
    pub product_name: String,
    pub quantity_sold: i64,
    /// Unit price in cents at sale time (frozen).
    pub unit_price_cents: i64,
    /// quantity_sold × unit_price_cents.
    pub total_amount_cents: i64,
    /// Supplier copied from the product at the moment of sale.
    pub supplier_id: Option<i64>,
    #[ts(as = "String")]
    pub sold_at: DateTime<Utc>,
}

impl SaleLine {
    #[inline]
    pub fn total_amount(&self) -> Money {
        Money::from_cents(self.total_amount_cents)
    }
}

/// One requested line of a sale batch or a checkout cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineRequest {
    pub product_id: i64,
    pub quantity: i64,
}

/// A committed sale line together with the supplier it was attributed to.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RecordedSale {
    pub sale: SaleLine,
    pub supplier: Option<Supplier>,
}

// =============================================================================
// Checkout
// =============================================================================

/// A POS checkout request.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutRequest {
    pub lines: Vec<LineRequest>,
    pub received_cents: i64,
    pub expected_total_cents: i64,
    /// Client-generated UUID; a replay returns the stored receipt.
    pub idempotency_key: Option<String>,
}

/// Transaction header.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Transaction {
    pub id: i64,
    /// Attributed supplier (lowest id among the suppliers touched).
    pub supplier_id: Option<i64>,
    pub total_cents: i64,
    pub received_cents: i64,
    pub change_cents: i64,
    pub idempotency_key: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Line item of a checkout transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct TransactionItem {
    pub id: i64,
    pub transaction_id: i64,
    pub product_id: Option<i64>,
    pub product_name: String,
    /// Per-line attribution.
    pub supplier_id: Option<i64>,
    pub quantity: i64,
    pub price_cents: i64,
    pub subtotal_cents: i64,
}

/// What the cashier hands back to the customer.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Receipt {
    pub transaction_id: i64,
    /// `%Y-%m-%d %H:%M:%S`, UTC.
    pub date: String,
    pub items: Vec<TransactionItem>,
    pub total_cents: i64,
    pub received_cents: i64,
    pub change_cents: i64,
    /// Supplier the header is attributed to.
    pub supplier_id: Option<i64>,
    /// Every supplier touched by the cart, ascending.
    pub supplier_ids: Vec<i64>,
    /// True when the receipt was returned for a repeated idempotency key.
    pub replayed: bool,
}

impl Receipt {
    /// Receipt timestamp format.
    pub const DATE_FORMAT: &'static str = "%Y-%m-%d %H:%M:%S";

    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    pub fn change(&self) -> Money {
        Money::from_cents(self.change_cents)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn product(quantity: i64) -> Product {
        Product {
            id: 10000,
            sequential_number: "SP-0001".to_string(),
            name: "Dried Mango".to_string(),
            description: Some("Sun dried".to_string()),
            category: Category::Food,
            price_cents: 500,
            quantity,
            supplier_id: Some(7),
            store_name: Some("Chiang Mai Farm".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!("Food".parse::<Category>().unwrap(), Category::Food);
        assert_eq!("Non-Food".parse::<Category>().unwrap(), Category::NonFood);
        assert!("Drinks".parse::<Category>().is_err());
        assert!("food".parse::<Category>().is_err());
    }

    #[test]
    fn test_category_serde_uses_display_names() {
        let json = serde_json::to_string(&Category::NonFood).unwrap();
        assert_eq!(json, "\"Non-Food\"");
    }

    #[test]
    fn test_ensure_available() {
        let p = product(6);
        assert!(p.ensure_available(6).is_ok());
        match p.ensure_available(10) {
            Err(CoreError::InsufficientStock {
                available,
                requested,
                ..
            }) => {
                assert_eq!(available, 6);
                assert_eq!(requested, 10);
            }
            other => panic!("expected InsufficientStock, got {:?}", other),
        }
    }

    #[test]
    fn test_principal_authority() {
        let admin = Principal::admin(1);
        assert!(admin.require_any(&[Role::Admin], "create orders").is_ok());
        assert!(matches!(
            Principal::cashier(2).require_any(&[Role::Admin], "create orders"),
            Err(CoreError::Forbidden { .. })
        ));

        let supplier = Principal::supplier(7);
        assert!(supplier.require_supplier(Some(7), "edit").is_ok());
        assert!(supplier.require_supplier(Some(8), "edit").is_err());
        assert!(supplier.require_supplier(None, "edit").is_err());
        // Same id, wrong role
        assert!(Principal::admin(7).require_supplier(Some(7), "edit").is_err());
    }

    #[test]
    fn test_order_status_default() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
        assert_eq!(OrderStatus::Verified.to_string(), "verified");
    }

    #[test]
    fn test_reservation_line_total() {
        let r = Reservation {
            product_id: 1,
            product_name: "Dried Mango".to_string(),
            unit_price_cents: 1000,
            supplier_id: Some(7),
            quantity: 2,
            remaining: 3,
        };
        assert_eq!(r.line_total().unwrap(), Money::from_cents(2000));

        let huge = Reservation {
            unit_price_cents: i64::MAX / 2,
            quantity: 3,
            ..r
        };
        assert!(matches!(
            huge.line_total(),
            Err(CoreError::AmountOverflow { .. })
        ));
    }
}
