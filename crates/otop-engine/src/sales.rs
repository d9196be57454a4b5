//! # POS Sale Batches
//!
//! Records a batch of marketplace sales. Every line reserves stock and
//! writes its own sale line; the batch commits whole or not at all.
//!
//! ```text
//! record_sales([{SP-0001 × 2}, {SP-0007 × 1}])
//!      │
//!      ├─ line 1: reserve ─► INSERT sale_line ─► supplier.purchased += 1
//!      ├─ line 2: reserve ─► INSERT sale_line ─► supplier.purchased += 1
//!      │
//!      └─ COMMIT   (any failure: nothing above survives)
//! ```

use chrono::Utc;
use tracing::{info, warn};

use crate::error::EngineResult;
use crate::ledger::StockLedger;
use crate::retry::with_retry;
use crate::Engine;
use otop_core::validation::validate_lines;
use otop_core::{
    CatalogTable, LineRequest, Principal, RecordedSale, Role, SaleLine, ValidationError,
};
use otop_db::NewSaleLineRow;

impl Engine {
    /// Records one sale line per requested line.
    ///
    /// Each line snapshots the product's name, price and supplier. The
    /// supplier each line is attributed to has its purchase counter bumped
    /// once per line.
    pub async fn record_sales(
        &self,
        principal: Principal,
        lines: &[LineRequest],
    ) -> EngineResult<Vec<RecordedSale>> {
        principal.require_any(&[Role::Admin, Role::Cashier], "record sales")?;
        if lines.is_empty() {
            return Err(ValidationError::Required {
                field: "lines".to_string(),
            }
            .into());
        }
        validate_lines(lines)?;

        let recorded = with_retry(&self.retry, "record_sales", || {
            self.record_sales_once(lines)
        })
        .await?;

        let total_cents = recorded
            .iter()
            .fold(0i64, |acc, r| acc.saturating_add(r.sale.total_amount_cents));
        info!(lines = recorded.len(), total_cents, cashier = principal.id, "Sales recorded");
        Ok(recorded)
    }

    async fn record_sales_once(&self, lines: &[LineRequest]) -> EngineResult<Vec<RecordedSale>> {
        let ledger = StockLedger::new(CatalogTable::OtopProducts);
        let sales = self.db.sales();
        let suppliers = self.db.suppliers();
        let sold_at = Utc::now();
        let mut tx = self.db.begin().await?;

        let mut recorded = Vec::with_capacity(lines.len());
        for line in lines {
            let reservation = ledger.reserve(&mut tx, line.product_id, line.quantity).await?;

            let sale = sales
                .insert(
                    &mut tx,
                    &NewSaleLineRow {
                        product_id: reservation.product_id,
                        product_name: &reservation.product_name,
                        quantity_sold: reservation.quantity,
                        unit_price_cents: reservation.unit_price_cents,
                        total_amount_cents: reservation.line_total()?.cents(),
                        supplier_id: reservation.supplier_id,
                        sold_at,
                    },
                )
                .await?;

            let supplier = match reservation.supplier_id {
                Some(supplier_id) => {
                    if !suppliers.increment_purchased(&mut tx, supplier_id, 1).await? {
                        warn!(supplier_id, product_id = line.product_id, "Sale attributed to a missing supplier");
                    }
                    suppliers.get(&mut tx, supplier_id).await?
                }
                None => None,
            };

            recorded.push(RecordedSale { sale, supplier });
        }

        tx.commit().await?;
        Ok(recorded)
    }

    /// Sale lines attributed to a supplier, newest first.
    pub async fn sales_for_supplier(&self, supplier_id: i64) -> EngineResult<Vec<SaleLine>> {
        let mut conn = self.db.acquire().await?;
        Ok(self.db.sales().list_by_supplier(&mut conn, supplier_id).await?)
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
    use otop_core::CoreError;

    fn line(product_id: i64, quantity: i64) -> LineRequest {
        LineRequest {
            product_id,
            quantity,
        }
    }

    #[tokio::test]
    async fn test_batch_records_every_line() {
        let engine = test_support::engine().await;
        let supplier = test_support::supplier(&engine, "Sukhothai Weaves").await;
        let scarf = test_support::otop_product(&engine, Some(supplier), 1500, 10).await;
        let basket = test_support::otop_product(&engine, Some(supplier), 800, 4).await;

        let recorded = engine
            .record_sales(Principal::cashier(7), &[line(scarf, 3), line(basket, 2)])
            .await
            .unwrap();

        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].sale.total_amount_cents, 4500);
        assert_eq!(recorded[0].sale.supplier_id, Some(supplier));
        assert_eq!(recorded[1].sale.total_amount_cents, 1600);
        assert_eq!(recorded[1].supplier.as_ref().map(|s| s.purchased), Some(2));

        assert_eq!(test_support::otop_quantity(&engine, scarf).await, 7);
        assert_eq!(test_support::otop_quantity(&engine, basket).await, 2);
        assert_eq!(engine.sales_for_supplier(supplier).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failing_line_rolls_back_batch() {
        let engine = test_support::engine().await;
        let supplier = test_support::supplier(&engine, "Sukhothai Weaves").await;
        let scarf = test_support::otop_product(&engine, Some(supplier), 1500, 10).await;
        let basket = test_support::otop_product(&engine, Some(supplier), 800, 1).await;

        let err = engine
            .record_sales(Principal::admin(1), &[line(scarf, 3), line(basket, 2)])
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::InsufficientStock { .. })));

        assert_eq!(test_support::otop_quantity(&engine, scarf).await, 10);
        assert!(engine.sales_for_supplier(supplier).await.unwrap().is_empty());
        assert_eq!(engine.get_supplier(supplier).await.unwrap().purchased, 0);
    }

    #[tokio::test]
    async fn test_missing_product_rolls_back_batch() {
        let engine = test_support::engine().await;
        let supplier = test_support::supplier(&engine, "Sukhothai Weaves").await;
        let scarf = test_support::otop_product(&engine, Some(supplier), 1500, 10).await;
        let basket = test_support::otop_product(&engine, Some(supplier), 800, 4).await;

        let err = engine
            .record_sales(
                Principal::cashier(7),
                &[line(scarf, 3), line(basket, 1), line(424242, 1)],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::ProductNotFound(424242))));

        assert_eq!(test_support::otop_quantity(&engine, scarf).await, 10);
        assert_eq!(test_support::otop_quantity(&engine, basket).await, 4);
        assert!(engine.sales_for_supplier(supplier).await.unwrap().is_empty());
        assert_eq!(engine.get_supplier(supplier).await.unwrap().purchased, 0);
    }

    #[tokio::test]
    async fn test_overflowing_line_total_is_refused() {
        let engine = test_support::engine().await;
        let supplier = test_support::supplier(&engine, "Sukhothai Weaves").await;
        let scarf = test_support::otop_product(&engine, Some(supplier), i64::MAX / 2, 10).await;

        let err = engine
            .record_sales(Principal::cashier(7), &[line(scarf, 3)])
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Core(CoreError::AmountOverflow { .. })));
        assert_eq!(test_support::otop_quantity(&engine, scarf).await, 10);
        assert!(engine.sales_for_supplier(supplier).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unattributed_line_is_still_recorded() {
        let engine = test_support::engine().await;
        let orphan = test_support::otop_product(&engine, None, 500, 5).await;

        let recorded = engine
            .record_sales(Principal::cashier(7), &[line(orphan, 1)])
            .await
            .unwrap();
        assert_eq!(recorded[0].sale.supplier_id, None);
        assert!(recorded[0].supplier.is_none());
    }

    #[tokio::test]
    async fn test_rejected_batches() {
        let engine = test_support::engine().await;
        let product = test_support::otop_product(&engine, None, 500, 5).await;

        assert!(matches!(
            engine.record_sales(Principal::cashier(7), &[]).await,
            Err(EngineError::Core(CoreError::Validation(ValidationError::Required { .. })))
        ));
        assert!(matches!(
            engine.record_sales(Principal::supplier(2), &[line(product, 1)]).await,
            Err(EngineError::Core(CoreError::Forbidden { .. }))
        ));
        assert!(matches!(
            engine.record_sales(Principal::cashier(7), &[line(product, 0)]).await,
            Err(EngineError::Core(CoreError::Validation(_)))
        ));
        assert_eq!(test_support::otop_quantity(&engine, product).await, 5);
    }
}
