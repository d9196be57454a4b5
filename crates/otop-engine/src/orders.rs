//! # Order Operations
//!
//! Admin orders against supplier products. An order holds its units from
//! creation until it is deleted; confirmation does not touch stock.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   create_order ──► reserve(qty) + INSERT order ──► [pending]           │
//! │                                                    │   │   │            │
//! │        update_order: release/reserve the delta ◄───┘   │   │            │
//! │        delete_order: release(qty) + DELETE ◄───────────┘   │            │
//! │        confirm_order (owning supplier) ────────────────────┘            │
//! │                              │                                          │
//! │                              ▼                                          │
//! │                         [verified]  (terminal, stock stays claimed)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use tracing::{debug, info};

use crate::error::EngineResult;
use crate::ledger::StockLedger;
use crate::retry::with_retry;
use crate::Engine;
use otop_core::order::{check_confirm, ensure_pending, plan_update, StockAdjustment};
use otop_core::validation::{validate_new_order, validate_order_update};
use otop_core::{
    CatalogTable, CoreError, NewOrder, Order, OrderStatus, OrderUpdate, Principal, Reservation,
    Role,
};
use otop_db::NewOrderRow;

impl Engine {
    fn order_ledger(&self) -> StockLedger {
        StockLedger::new(CatalogTable::Products)
    }

    /// An admin orders `quantity` units of a supplier product.
    ///
    /// The units are reserved in the same unit of work that records the
    /// order; the order snapshots the product name and price.
    ///
    /// ## Errors
    /// - `ProductNotFound` / `InsufficientStock` from the reservation
    /// - `NoValidSupplier` when the product has no owning supplier
    pub async fn create_order(&self, principal: Principal, new: NewOrder) -> EngineResult<Order> {
        principal.require_any(&[Role::Admin], "place orders")?;
        validate_new_order(&new)?;

        let order = with_retry(&self.retry, "create_order", || {
            self.create_order_once(principal.id, &new)
        })
        .await?;

        info!(
            order_id = order.id,
            product_id = new.product_id,
            quantity = order.quantity,
            supplier_id = order.supplier_id,
            "Order placed"
        );
        Ok(order)
    }

    async fn create_order_once(&self, admin_id: i64, new: &NewOrder) -> EngineResult<Order> {
        let ledger = self.order_ledger();
        let mut tx = self.db.begin().await?;

        let product = ledger.load(&mut tx, new.product_id).await?;
        let supplier_id = product.supplier_id.ok_or(CoreError::NoValidSupplier)?;
        let reservation = ledger.reserve(&mut tx, new.product_id, new.quantity).await?;

        let order = self
            .db
            .orders()
            .insert(
                &mut tx,
                &NewOrderRow {
                    product_id: reservation.product_id,
                    product_name: &reservation.product_name,
                    unit_price_cents: reservation.unit_price_cents,
                    quantity: reservation.quantity,
                    description: new.description.as_deref(),
                    supplier_id,
                    admin_id,
                    order_date: Utc::now(),
                },
            )
            .await?;

        tx.commit().await?;
        Ok(order)
    }

    /// An admin edits a pending order.
    ///
    /// Same product: only the difference in quantity moves. Different
    /// product: the old units go back and the new product is reserved and
    /// re-snapshotted. Either way the edit commits or nothing moves.
    pub async fn update_order(
        &self,
        principal: Principal,
        order_id: i64,
        update: OrderUpdate,
    ) -> EngineResult<Order> {
        principal.require_any(&[Role::Admin], "edit orders")?;
        validate_order_update(&update)?;

        let order = with_retry(&self.retry, "update_order", || {
            self.update_order_once(order_id, &update)
        })
        .await?;

        info!(order_id, product_id = update.product_id, quantity = order.quantity, "Order updated");
        Ok(order)
    }

    async fn update_order_once(&self, order_id: i64, update: &OrderUpdate) -> EngineResult<Order> {
        let ledger = self.order_ledger();
        let orders = self.db.orders();
        let mut tx = self.db.begin().await?;

        let order = orders
            .get(&mut tx, order_id)
            .await?
            .ok_or(CoreError::OrderNotFound(order_id))?;
        ensure_pending(&order)?;

        let plan = plan_update(&order, update);
        let mut new_product: Option<Reservation> = None;

        for adjustment in &plan.adjustments {
            match *adjustment {
                StockAdjustment::Release {
                    product_id,
                    quantity,
                } => {
                    ledger.release(&mut tx, product_id, quantity).await?;
                }
                StockAdjustment::Reserve {
                    product_id,
                    quantity,
                } => {
                    let reservation = ledger.reserve(&mut tx, product_id, quantity).await?;
                    if plan.product_changed {
                        new_product = Some(reservation);
                    }
                }
            }
        }
        debug!(order_id, adjustments = plan.adjustments.len(), "Order stock reconciled");

        let (product_name, unit_price_cents, supplier_id) = match new_product {
            Some(reservation) => (
                reservation.product_name,
                reservation.unit_price_cents,
                reservation.supplier_id.ok_or(CoreError::NoValidSupplier)?,
            ),
            None => (order.product_name, order.unit_price_cents, order.supplier_id),
        };

        let updated = orders
            .update_line(
                &mut tx,
                order_id,
                update.product_id,
                &product_name,
                unit_price_cents,
                update.quantity,
                update.description.as_deref(),
                supplier_id,
                Utc::now(),
            )
            .await?;

        tx.commit().await?;
        Ok(updated)
    }

    /// An admin withdraws a pending order; its units go back to stock.
    pub async fn delete_order(&self, principal: Principal, order_id: i64) -> EngineResult<()> {
        principal.require_any(&[Role::Admin], "delete orders")?;

        with_retry(&self.retry, "delete_order", || self.delete_order_once(order_id)).await?;

        info!(order_id, "Order deleted");
        Ok(())
    }

    async fn delete_order_once(&self, order_id: i64) -> EngineResult<()> {
        let orders = self.db.orders();
        let mut tx = self.db.begin().await?;

        let order = orders
            .get(&mut tx, order_id)
            .await?
            .ok_or(CoreError::OrderNotFound(order_id))?;
        ensure_pending(&order)?;

        if let Some(product_id) = order.product_id {
            self.order_ledger()
                .release(&mut tx, product_id, order.quantity)
                .await?;
        }
        orders.delete(&mut tx, order_id).await?;

        tx.commit().await?;
        Ok(())
    }

    /// The owning supplier confirms a pending order.
    ///
    /// ## Checks (in order)
    /// 1. The order exists (`OrderNotFound`)
    /// 2. The order is pending (`InvalidOrderStatus`)
    /// 3. The caller is the supplier named on the order (`Forbidden`)
    pub async fn confirm_order(&self, principal: Principal, order_id: i64) -> EngineResult<Order> {
        let order = with_retry(&self.retry, "confirm_order", || {
            self.confirm_order_once(principal, order_id)
        })
        .await?;

        info!(order_id, supplier_id = principal.id, "Order confirmed");
        Ok(order)
    }

    async fn confirm_order_once(&self, principal: Principal, order_id: i64) -> EngineResult<Order> {
        let orders = self.db.orders();
        let mut tx = self.db.begin().await?;

        let order = orders
            .get(&mut tx, order_id)
            .await?
            .ok_or(CoreError::OrderNotFound(order_id))?;
        check_confirm(&order, &principal)?;

        let moved = orders
            .set_status(
                &mut tx,
                order_id,
                OrderStatus::Pending,
                OrderStatus::Verified,
                Utc::now(),
            )
            .await?;
        if !moved {
            // Someone else confirmed it between the read and the write.
            return Err(CoreError::InvalidOrderStatus {
                order_id,
                current_status: OrderStatus::Verified.to_string(),
            }
            .into());
        }

        let confirmed = orders
            .get(&mut tx, order_id)
            .await?
            .ok_or(CoreError::OrderNotFound(order_id))?;
        tx.commit().await?;
        Ok(confirmed)
    }

    pub async fn get_order(&self, order_id: i64) -> EngineResult<Order> {
        let mut conn = self.db.acquire().await?;
        self.db
            .orders()
            .get(&mut conn, order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id).into())
    }

    /// Orders against a supplier's products, newest first.
    pub async fn orders_for_supplier(&self, supplier_id: i64) -> EngineResult<Vec<Order>> {
        let mut conn = self.db.acquire().await?;
        Ok(self.db.orders().list_by_supplier(&mut conn, supplier_id).await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::test_support;

    fn order_of(product_id: i64, quantity: i64) -> NewOrder {
        NewOrder {
            product_id,
            quantity,
            description: Some("For the weekend market".to_string()),
        }
    }

    fn edit(product_id: i64, quantity: i64) -> OrderUpdate {
        OrderUpdate {
            product_id,
            quantity,
            description: None,
        }
    }

    async fn stock(engine: &Engine, product: i64) -> i64 {
        test_support::quantity(engine, CatalogTable::Products, product).await
    }

    #[tokio::test]
    async fn test_create_order_reserves_and_snapshots() {
        let engine = test_support::engine().await;
        let supplier = test_support::supplier(&engine, "Nan Coffee").await;
        let product = test_support::catalog_product(&engine, Some(supplier), 2500, 10).await;

        let order = engine
            .create_order(Principal::admin(1), order_of(product, 4))
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.supplier_id, supplier);
        assert_eq!(order.unit_price_cents, 2500);
        assert_eq!(order.admin_id, 1);
        assert_eq!(stock(&engine, product).await, 6);

        let err = engine
            .create_order(Principal::admin(1), order_of(product, 7))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::InsufficientStock {
                available: 6,
                requested: 7,
                ..
            })
        ));
        assert_eq!(stock(&engine, product).await, 6);
    }

    #[tokio::test]
    async fn test_create_order_needs_admin_and_supplier() {
        let engine = test_support::engine().await;
        let orphan = test_support::catalog_product(&engine, None, 2500, 10).await;

        let err = engine
            .create_order(Principal::cashier(3), order_of(orphan, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::Forbidden { .. })));

        let err = engine
            .create_order(Principal::admin(1), order_of(orphan, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::NoValidSupplier)));
        assert_eq!(stock(&engine, orphan).await, 10);
    }

    #[tokio::test]
    async fn test_update_moves_only_the_delta() {
        let engine = test_support::engine().await;
        let supplier = test_support::supplier(&engine, "Nan Coffee").await;
        let product = test_support::catalog_product(&engine, Some(supplier), 2500, 10).await;
        let admin = Principal::admin(1);

        let order = engine.create_order(admin, order_of(product, 4)).await.unwrap();
        assert_eq!(stock(&engine, product).await, 6);

        let order = engine.update_order(admin, order.id, edit(product, 6)).await.unwrap();
        assert_eq!(order.quantity, 6);
        assert_eq!(stock(&engine, product).await, 4);

        let order = engine.update_order(admin, order.id, edit(product, 1)).await.unwrap();
        assert_eq!(order.quantity, 1);
        assert_eq!(stock(&engine, product).await, 9);
    }

    #[tokio::test]
    async fn test_update_to_other_product_swaps_stock() {
        let engine = test_support::engine().await;
        let first_supplier = test_support::supplier(&engine, "Nan Coffee").await;
        let second_supplier = test_support::supplier(&engine, "Phrae Indigo").await;
        let coffee = test_support::catalog_product(&engine, Some(first_supplier), 2500, 10).await;
        let indigo = test_support::catalog_product(&engine, Some(second_supplier), 9000, 3).await;
        let admin = Principal::admin(1);

        let order = engine.create_order(admin, order_of(coffee, 4)).await.unwrap();

        let err = engine
            .update_order(admin, order.id, edit(indigo, 5))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::InsufficientStock { .. })));
        assert_eq!(stock(&engine, coffee).await, 6);
        assert_eq!(stock(&engine, indigo).await, 3);

        let moved = engine.update_order(admin, order.id, edit(indigo, 2)).await.unwrap();
        assert_eq!(moved.product_id, Some(indigo));
        assert_eq!(moved.unit_price_cents, 9000);
        assert_eq!(moved.supplier_id, second_supplier);
        assert_eq!(stock(&engine, coffee).await, 10);
        assert_eq!(stock(&engine, indigo).await, 1);
    }

    #[tokio::test]
    async fn test_delete_returns_units() {
        let engine = test_support::engine().await;
        let supplier = test_support::supplier(&engine, "Nan Coffee").await;
        let product = test_support::catalog_product(&engine, Some(supplier), 2500, 10).await;
        let admin = Principal::admin(1);

        let order = engine.create_order(admin, order_of(product, 4)).await.unwrap();
        engine.delete_order(admin, order.id).await.unwrap();

        assert_eq!(stock(&engine, product).await, 10);
        assert!(matches!(
            engine.get_order(order.id).await,
            Err(EngineError::Core(CoreError::OrderNotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_confirm_checks_in_order() {
        let engine = test_support::engine().await;
        let owner = test_support::supplier(&engine, "Nan Coffee").await;
        let stranger = test_support::supplier(&engine, "Phrae Indigo").await;
        let product = test_support::catalog_product(&engine, Some(owner), 2500, 10).await;
        let order = engine
            .create_order(Principal::admin(1), order_of(product, 2))
            .await
            .unwrap();

        assert!(matches!(
            engine.confirm_order(Principal::supplier(owner), 999).await,
            Err(EngineError::Core(CoreError::OrderNotFound(999)))
        ));

        let err = engine
            .confirm_order(Principal::supplier(stranger), order.id)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::Forbidden { .. })));
        assert_eq!(
            engine.get_order(order.id).await.unwrap().status,
            OrderStatus::Pending
        );

        let confirmed = engine
            .confirm_order(Principal::supplier(owner), order.id)
            .await
            .unwrap();
        assert_eq!(confirmed.status, OrderStatus::Verified);
        assert_eq!(stock(&engine, product).await, 8);

        // A verified order is terminal, whoever asks.
        let err = engine
            .confirm_order(Principal::supplier(stranger), order.id)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::InvalidOrderStatus { .. })));
        assert!(matches!(
            engine.delete_order(Principal::admin(1), order.id).await,
            Err(EngineError::Core(CoreError::InvalidOrderStatus { .. }))
        ));

        let listed = engine.orders_for_supplier(owner).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_orders_never_oversell() {
        let dir = tempfile::tempdir().unwrap();
        let engine = test_support::file_engine(dir.path(), 4).await;
        let supplier = test_support::supplier(&engine, "Nan Coffee").await;
        let product = test_support::catalog_product(&engine, Some(supplier), 2500, 5).await;

        let mut handles = Vec::new();
        for _ in 0..2 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine
                    .create_order(Principal::admin(1), order_of(product, 4))
                    .await
            }));
        }

        let mut placed = 0;
        let mut refused = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => placed += 1,
                Err(EngineError::Core(CoreError::InsufficientStock { .. })) => refused += 1,
                Err(other) => panic!("unexpected error: {:?}", other),
            }
        }

        assert_eq!((placed, refused), (1, 1));
        assert_eq!(stock(&engine, product).await, 1);
    }
}
