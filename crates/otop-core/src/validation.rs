//! # Validation Module
//!
//! Input validation run before any unit of work begins.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Where Validation Happens                            │
//! │                                                                         │
//! │  Payload (already typed by transport)                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validation::* ── shape: required, ranges, category, uuid              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  unit of work ── state: stock, ownership, uniqueness                   │
//! │                                                                         │
//! │  A payload that fails here never opens a transaction.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use uuid::Uuid;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{
    CatalogTable, Category, CheckoutRequest, LineRequest, NewOrder, NewOtopProduct, NewProduct, NewSupplier,
    OrderUpdate, ProductUpdate,
};
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY, MAX_PRICE_CENTS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Field Validators
// =============================================================================

fn required(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(())
}

/// Validates a product name.
///
/// ```rust
/// use otop_core::validation::validate_product_name;
///
/// assert!(validate_product_name("Dried Mango").is_ok());
/// assert!(validate_product_name("  ").is_err());
/// ```
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    required("name", name, 200)
}

/// Validates a marketplace product description (required, it is the
/// uniqueness key of the marketplace catalog).
pub fn validate_description(description: &str) -> ValidationResult<()> {
    required("description", description, 1000)
}

pub fn validate_store_name(store_name: &str) -> ValidationResult<()> {
    required("store_name", store_name, 200)
}

/// Parses a category, accepting only `Food` and `Non-Food`.
pub fn validate_category(category: &str) -> ValidationResult<Category> {
    category.parse()
}

/// Validates a catalog price in cents (1..=MAX_PRICE_CENTS).
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "price".to_string(),
        });
    }
    if cents > MAX_PRICE_CENTS {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 1,
            max: MAX_PRICE_CENTS,
        });
    }
    Ok(())
}

/// Validates a stock level on creation (must be greater than zero).
pub fn validate_initial_stock(quantity: i64) -> ValidationResult<()> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    Ok(())
}

/// Validates a stock level set by an edit (zero allowed).
pub fn validate_stock_level(quantity: i64) -> ValidationResult<()> {
    if quantity < 0 {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Validates an order quantity (positive, no upper bound).
pub fn validate_order_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    Ok(())
}

/// Validates a POS line quantity (1..=MAX_ITEM_QUANTITY).
pub fn validate_line_quantity(quantity: i64) -> ValidationResult<()> {
    if !(1..=MAX_ITEM_QUANTITY).contains(&quantity) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }
    Ok(())
}

/// Validates a payment amount in cents.
pub fn validate_amount_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Validates an idempotency key (UUID text).
pub fn validate_idempotency_key(key: &str) -> ValidationResult<()> {
    normalize_idempotency_key(key).map(|_| ())
}

/// Canonical stored form of an idempotency key: lowercase hyphenated UUID.
///
/// ```rust
/// use otop_core::validation::normalize_idempotency_key;
///
/// let key = normalize_idempotency_key(" 67E55044-10B1-426F-9247-BB680E5FE0C8 ").unwrap();
/// assert_eq!(key, "67e55044-10b1-426f-9247-bb680e5fe0c8");
/// ```
pub fn normalize_idempotency_key(key: &str) -> ValidationResult<String> {
    Uuid::parse_str(key.trim())
        .map(|uuid| uuid.hyphenated().to_string())
        .map_err(|e| ValidationError::InvalidFormat {
            field: "idempotency_key".to_string(),
            reason: e.to_string(),
        })
}

// =============================================================================
// Payload Validators
// =============================================================================

/// Validates a supplier's own product and returns its parsed category.
pub fn validate_new_product(p: &NewProduct) -> ValidationResult<Category> {
    validate_product_name(&p.name)?;
    validate_price_cents(p.price_cents)?;
    validate_initial_stock(p.quantity)?;
    validate_category(&p.category)
}

/// Validates a marketplace listing and returns its parsed category.
pub fn validate_new_otop_product(p: &NewOtopProduct) -> ValidationResult<Category> {
    validate_product_name(&p.name)?;
    validate_description(&p.description)?;
    validate_store_name(&p.store_name)?;
    validate_price_cents(p.price_cents)?;
    validate_stock_level(p.quantity)?;
    validate_category(&p.category)
}

/// Validates a product edit against the table it targets.
///
/// Marketplace products must keep a description; supplier products may
/// drop theirs.
pub fn validate_product_update(table: CatalogTable, p: &ProductUpdate) -> ValidationResult<Category> {
    validate_product_name(&p.name)?;
    match (table, p.description.as_deref()) {
        (CatalogTable::OtopProducts, Some(description)) => validate_description(description)?,
        (CatalogTable::OtopProducts, None) => {
            return Err(ValidationError::Required {
                field: "description".to_string(),
            })
        }
        (CatalogTable::Products, _) => {}
    }
    validate_price_cents(p.price_cents)?;
    validate_stock_level(p.quantity)?;
    validate_category(&p.category)
}

pub fn validate_new_supplier(s: &NewSupplier) -> ValidationResult<()> {
    validate_store_name(&s.store_name)
}

pub fn validate_new_order(o: &NewOrder) -> ValidationResult<()> {
    validate_order_quantity(o.quantity)
}

pub fn validate_order_update(o: &OrderUpdate) -> ValidationResult<()> {
    validate_order_quantity(o.quantity)
}

/// Validates the lines of a sale batch or cart.
pub fn validate_lines(lines: &[LineRequest]) -> CoreResult<()> {
    if lines.len() > MAX_CART_ITEMS {
        return Err(CoreError::CartTooLarge {
            max: MAX_CART_ITEMS,
        });
    }
    for line in lines {
        validate_line_quantity(line.quantity)?;
    }
    Ok(())
}

/// Validates everything about a checkout request that does not need stock.
pub fn validate_checkout(req: &CheckoutRequest) -> CoreResult<()> {
    validate_amount_cents("received", req.received_cents)?;
    validate_amount_cents("expected_total", req.expected_total_cents)?;
    if let Some(key) = &req.idempotency_key {
        validate_idempotency_key(key)?;
    }
    validate_lines(&req.lines)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn otop(description: &str, category: &str, price: i64, qty: i64) -> NewOtopProduct {
        NewOtopProduct {
            name: "Silk Scarf".to_string(),
            description: description.to_string(),
            category: category.to_string(),
            price_cents: price,
            quantity: qty,
            store_name: "Lamphun Weavers".to_string(),
        }
    }

    #[test]
    fn test_otop_product_rules() {
        assert_eq!(
            validate_new_otop_product(&otop("Hand woven", "Non-Food", 1500, 0)).unwrap(),
            Category::NonFood
        );
        assert!(matches!(
            validate_new_otop_product(&otop("", "Food", 1500, 1)),
            Err(ValidationError::Required { .. })
        ));
        assert!(matches!(
            validate_new_otop_product(&otop("Hand woven", "Textiles", 1500, 1)),
            Err(ValidationError::NotAllowed { .. })
        ));
        assert!(matches!(
            validate_new_otop_product(&otop("Hand woven", "Food", 0, 1)),
            Err(ValidationError::MustBePositive { .. })
        ));
        assert!(matches!(
            validate_new_otop_product(&otop("Hand woven", "Food", 100, -1)),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_price_upper_bound() {
        assert!(validate_price_cents(MAX_PRICE_CENTS).is_ok());
        assert!(matches!(
            validate_price_cents(MAX_PRICE_CENTS + 1),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert!(matches!(
            validate_new_otop_product(&otop("Hand woven", "Food", i64::MAX / 2, 1)),
            Err(ValidationError::OutOfRange { .. })
        ));
        // A full cart at the cap still fits
        assert!((MAX_PRICE_CENTS as i128) * (MAX_ITEM_QUANTITY as i128) * (MAX_CART_ITEMS as i128)
            < i64::MAX as i128);
    }

    #[test]
    fn test_new_product_needs_stock() {
        let p = NewProduct {
            name: "Rice".to_string(),
            description: None,
            category: "Food".to_string(),
            price_cents: 100,
            quantity: 0,
        };
        assert!(validate_new_product(&p).is_err());
    }

    #[test]
    fn test_update_description_depends_on_table() {
        let update = |description: Option<&str>| ProductUpdate {
            name: "Silk Scarf".to_string(),
            description: description.map(str::to_string),
            category: "Non-Food".to_string(),
            price_cents: 1500,
            quantity: 3,
        };

        assert!(validate_product_update(CatalogTable::Products, &update(None)).is_ok());
        assert!(validate_product_update(CatalogTable::OtopProducts, &update(Some("Hand woven"))).is_ok());
        assert!(matches!(
            validate_product_update(CatalogTable::OtopProducts, &update(None)),
            Err(ValidationError::Required { field }) if field == "description"
        ));
        assert!(matches!(
            validate_product_update(CatalogTable::OtopProducts, &update(Some("  "))),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_line_quantity_bounds() {
        assert!(validate_line_quantity(1).is_ok());
        assert!(validate_line_quantity(MAX_ITEM_QUANTITY).is_ok());
        assert!(validate_line_quantity(0).is_err());
        assert!(validate_line_quantity(MAX_ITEM_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_cart_too_large() {
        let lines = vec![
            LineRequest {
                product_id: 1,
                quantity: 1
            };
            MAX_CART_ITEMS + 1
        ];
        assert!(matches!(
            validate_lines(&lines),
            Err(CoreError::CartTooLarge { .. })
        ));
    }

    #[test]
    fn test_checkout_idempotency_key() {
        let mut req = CheckoutRequest {
            lines: vec![LineRequest {
                product_id: 1,
                quantity: 1,
            }],
            received_cents: 1000,
            expected_total_cents: 500,
            idempotency_key: Some("not-a-uuid".to_string()),
        };
        assert!(validate_checkout(&req).is_err());

        req.idempotency_key = Some(Uuid::new_v4().to_string());
        assert!(validate_checkout(&req).is_ok());
    }

    #[test]
    fn test_idempotency_key_canonical_form() {
        let key = Uuid::new_v4();
        let canonical = key.hyphenated().to_string();
        let padded = format!("  {}\n", canonical.to_uppercase());

        assert_eq!(normalize_idempotency_key(&padded).unwrap(), canonical);
        assert_eq!(
            normalize_idempotency_key(&key.simple().to_string()).unwrap(),
            canonical
        );
        assert!(normalize_idempotency_key("").is_err());
    }
}
