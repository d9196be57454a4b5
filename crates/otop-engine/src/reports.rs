//! # Sales Reports
//!
//! Reads committed sale lines and groups them into zero-filled buckets.
//!
//! ```text
//! period   buckets                      catalog-wide amount
//! ───────  ───────────────────────────  ─────────────────────────────
//! daily    Monday..Sunday (this week)   quantity × current price
//! weekly   Week 1..Week 5 (this month)  supplier report:
//! monthly  January..December            stored line total
//! yearly   the last five years
//! ```

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::EngineResult;
use crate::Engine;
use otop_core::report::{bucket_sales, window_start};
use otop_core::{Period, SalesReport, SupplierTotal};

impl Engine {
    /// Sales of the current `period`, catalog-wide or for one supplier.
    pub async fn sales_report(
        &self,
        period: Period,
        supplier_id: Option<i64>,
    ) -> EngineResult<SalesReport> {
        self.sales_report_at(period, supplier_id, Utc::now()).await
    }

    /// Same as [`Engine::sales_report`] with an explicit clock.
    pub async fn sales_report_at(
        &self,
        period: Period,
        supplier_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> EngineResult<SalesReport> {
        let since = window_start(period, now, self.week_start);
        let sales = self.db.sales();
        let mut conn = self.db.acquire().await?;

        let facts = match supplier_id {
            Some(id) => sales.supplier_facts(&mut conn, id, since).await?,
            None => sales.global_facts(&mut conn, since).await?,
        };
        debug!(?period, ?supplier_id, facts = facts.len(), %since, "Building sales report");

        Ok(bucket_sales(period, now, self.week_start, supplier_id, &facts))
    }

    /// All-time sales per supplier, highest first.
    pub async fn supplier_totals(&self) -> EngineResult<Vec<SupplierTotal>> {
        let mut conn = self.db.acquire().await?;
        Ok(self.db.sales().supplier_totals(&mut conn).await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use chrono::TimeZone;
    use otop_core::{CatalogTable, LineRequest, Principal, ProductUpdate};
    use otop_db::NewSaleLineRow;

    async fn sale_at(engine: &Engine, product_id: i64, supplier_id: i64, quantity: i64, price: i64, at: DateTime<Utc>) {
        let mut conn = engine.db().acquire().await.unwrap();
        engine
            .db()
            .sales()
            .insert(
                &mut conn,
                &NewSaleLineRow {
                    product_id,
                    product_name: "Dried Mango",
                    quantity_sold: quantity,
                    unit_price_cents: price,
                    total_amount_cents: quantity * price,
                    supplier_id: Some(supplier_id),
                    sold_at: at,
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_daily_report_buckets_by_weekday() {
        // Friday 2026-10-16; a sale of 2 × 10.00 on Wednesday the 14th
        let engine = test_support::engine().await;
        let supplier = test_support::supplier(&engine, "Chanthaburi Fruits").await;
        let product = test_support::otop_product(&engine, Some(supplier), 1000, 10).await;

        let wednesday = Utc.with_ymd_and_hms(2026, 10, 14, 10, 30, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        sale_at(&engine, product, supplier, 2, 1000, wednesday).await;

        let report = engine
            .sales_report_at(Period::Daily, None, now)
            .await
            .unwrap();

        assert_eq!(report.buckets.len(), 7);
        assert_eq!(report.buckets[0].label, "Monday");
        assert_eq!(report.get("Wednesday").map(|m| m.cents()), Some(2000));
        for bucket in report.buckets.iter().filter(|b| b.label != "Wednesday") {
            assert_eq!(bucket.total_cents, 0, "{} should be empty", bucket.label);
        }
    }

    #[tokio::test]
    async fn test_catalog_wide_uses_live_price() {
        let engine = test_support::engine().await;
        let supplier = test_support::supplier(&engine, "Chanthaburi Fruits").await;
        let product = test_support::otop_product(&engine, Some(supplier), 1000, 10).await;

        engine
            .record_sales(Principal::cashier(4), &[LineRequest { product_id: product, quantity: 3 }])
            .await
            .unwrap();

        engine
            .update_product(
                Principal::supplier(supplier),
                CatalogTable::OtopProducts,
                product,
                ProductUpdate {
                    name: "Dried Mango".to_string(),
                    description: Some(format!("Description {}", product)),
                    category: "Food".to_string(),
                    price_cents: 1200,
                    quantity: 7,
                },
            )
            .await
            .unwrap();

        let global = engine.sales_report(Period::Yearly, None).await.unwrap();
        let own = engine.sales_report(Period::Yearly, Some(supplier)).await.unwrap();

        assert_eq!(global.total().cents(), 3600);
        assert_eq!(own.total().cents(), 3000);
        assert_eq!(own.supplier_id, Some(supplier));
    }

    #[tokio::test]
    async fn test_supplier_totals_rank_highest_first() {
        let engine = test_support::engine().await;
        let small = test_support::supplier(&engine, "Chanthaburi Fruits").await;
        let big = test_support::supplier(&engine, "Surin Silk").await;
        let mango = test_support::otop_product(&engine, Some(small), 500, 10).await;
        let silk = test_support::otop_product(&engine, Some(big), 9000, 10).await;

        let now = Utc::now();
        sale_at(&engine, mango, small, 2, 500, now).await;
        sale_at(&engine, silk, big, 1, 9000, now).await;

        let totals = engine.supplier_totals().await.unwrap();
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].supplier_id, big);
        assert_eq!(totals[0].total_cents, 9000);
        assert_eq!(totals[1].store_name, "Chanthaburi Fruits");
        assert_eq!(totals[1].total_cents, 1000);
    }
}
