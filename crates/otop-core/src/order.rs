//! # Order Lifecycle
//!
//! State machine and stock reconciliation rules for admin orders.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   create ──► ┌─────────┐  confirm (owning supplier)  ┌──────────┐      │
//! │              │ pending │ ──────────────────────────► │ verified │      │
//! │              └────┬────┘                             └──────────┘      │
//! │                   │ update / delete                     terminal        │
//! │                   ▼                                                     │
//! │        reconcile reserved stock                                        │
//! │                                                                         │
//! │  confirm checks, in order:                                             │
//! │    1. order exists          → NotFound                                 │
//! │    2. status == pending     → InvalidState                             │
//! │    3. principal owns order  → Forbidden                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::{Order, OrderStatus, OrderUpdate, Principal};

/// Fails `InvalidOrderStatus` unless the order is still pending.
pub fn ensure_pending(order: &Order) -> CoreResult<()> {
    if order.status != OrderStatus::Pending {
        return Err(CoreError::InvalidOrderStatus {
            order_id: order.id,
            current_status: order.status.to_string(),
        });
    }
    Ok(())
}

/// Validates the `pending → verified` transition for `principal`.
///
/// The caller has already established that the order exists.
pub fn check_confirm(order: &Order, principal: &Principal) -> CoreResult<()> {
    ensure_pending(order)?;
    principal.require_supplier(Some(order.supplier_id), "confirm this order")
}

/// A single stock movement needed to reconcile an order edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockAdjustment {
    /// Take more units from the product.
    Reserve { product_id: i64, quantity: i64 },
    /// Give units back to the product.
    Release { product_id: i64, quantity: i64 },
}

/// The movements an order update needs, and whether the price/name
/// snapshot must be retaken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePlan {
    pub adjustments: Vec<StockAdjustment>,
    pub product_changed: bool,
}

/// Plans the stock reconciliation for an order edit.
///
/// Same product: only the delta moves, so stock is never decremented twice
/// for the units the order already holds. Different product: the old
/// quantity goes back first, then the new quantity is reserved.
///
/// ```rust
/// use otop_core::order::{plan_update, StockAdjustment};
/// # use otop_core::{Order, OrderStatus, OrderUpdate};
/// # let order = Order {
/// #     id: 1, product_id: Some(10000), product_name: "Rice".into(),
/// #     unit_price_cents: 100, quantity: 4, description: None,
/// #     status: OrderStatus::Pending, supplier_id: 7, admin_id: 1,
/// #     order_date: chrono::Utc::now(), updated_at: chrono::Utc::now(),
/// # };
/// let plan = plan_update(&order, &OrderUpdate { product_id: 10000, quantity: 6, description: None });
/// assert_eq!(plan.adjustments, vec![StockAdjustment::Reserve { product_id: 10000, quantity: 2 }]);
/// ```
pub fn plan_update(order: &Order, update: &OrderUpdate) -> UpdatePlan {
    let mut adjustments = Vec::new();

    if order.product_id == Some(update.product_id) {
        let delta = update.quantity - order.quantity;
        if delta > 0 {
            adjustments.push(StockAdjustment::Reserve {
                product_id: update.product_id,
                quantity: delta,
            });
        } else if delta < 0 {
            adjustments.push(StockAdjustment::Release {
                product_id: update.product_id,
                quantity: -delta,
            });
        }
        return UpdatePlan {
            adjustments,
            product_changed: false,
        };
    }

    // Old product may already be gone; its units have nowhere to return to.
    if let Some(old_product) = order.product_id {
        adjustments.push(StockAdjustment::Release {
            product_id: old_product,
            quantity: order.quantity,
        });
    }
    adjustments.push(StockAdjustment::Reserve {
        product_id: update.product_id,
        quantity: update.quantity,
    });

    UpdatePlan {
        adjustments,
        product_changed: true,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn order(status: OrderStatus, product_id: Option<i64>, quantity: i64) -> Order {
        Order {
            id: 1,
            product_id,
            product_name: "Jasmine Rice".to_string(),
            unit_price_cents: 2500,
            quantity,
            description: None,
            status,
            supplier_id: 7,
            admin_id: 1,
            order_date: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn update(product_id: i64, quantity: i64) -> OrderUpdate {
        OrderUpdate {
            product_id,
            quantity,
            description: None,
        }
    }

    #[test]
    fn test_confirm_by_owner() {
        let o = order(OrderStatus::Pending, Some(10000), 2);
        assert!(check_confirm(&o, &Principal::supplier(7)).is_ok());
    }

    #[test]
    fn test_confirm_by_other_supplier_is_forbidden() {
        let o = order(OrderStatus::Pending, Some(10000), 2);
        assert!(matches!(
            check_confirm(&o, &Principal::supplier(8)),
            Err(CoreError::Forbidden { .. })
        ));
        assert!(matches!(
            check_confirm(&o, &Principal::admin(7)),
            Err(CoreError::Forbidden { .. })
        ));
    }

    #[test]
    fn test_state_checked_before_ownership() {
        let o = order(OrderStatus::Verified, Some(10000), 2);
        assert!(matches!(
            check_confirm(&o, &Principal::supplier(8)),
            Err(CoreError::InvalidOrderStatus { .. })
        ));
    }

    #[test]
    fn test_plan_same_product_delta() {
        let o = order(OrderStatus::Pending, Some(10000), 4);

        let grow = plan_update(&o, &update(10000, 6));
        assert_eq!(
            grow.adjustments,
            vec![StockAdjustment::Reserve {
                product_id: 10000,
                quantity: 2
            }]
        );
        assert!(!grow.product_changed);

        let shrink = plan_update(&o, &update(10000, 1));
        assert_eq!(
            shrink.adjustments,
            vec![StockAdjustment::Release {
                product_id: 10000,
                quantity: 3
            }]
        );

        assert!(plan_update(&o, &update(10000, 4)).adjustments.is_empty());
    }

    #[test]
    fn test_plan_product_switch() {
        let o = order(OrderStatus::Pending, Some(10000), 4);
        let plan = plan_update(&o, &update(10001, 5));
        assert!(plan.product_changed);
        assert_eq!(
            plan.adjustments,
            vec![
                StockAdjustment::Release {
                    product_id: 10000,
                    quantity: 4
                },
                StockAdjustment::Reserve {
                    product_id: 10001,
                    quantity: 5
                },
            ]
        );
    }

    #[test]
    fn test_plan_from_deleted_product() {
        let o = order(OrderStatus::Pending, None, 4);
        let plan = plan_update(&o, &update(10001, 5));
        assert_eq!(
            plan.adjustments,
            vec![StockAdjustment::Reserve {
                product_id: 10001,
                quantity: 5
            }]
        );
    }
}
