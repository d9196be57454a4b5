//! # Catalog Operations
//!
//! Suppliers, supplier-owned products and admin-listed marketplace products.
//!
//! ## Code Allocation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │              add_product / create_otop_product (one attempt)            │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    codes = SELECT sequential_number FROM <table>                       │
//! │    code  = scope.next_code(codes)        P-10004 → P-10005             │
//! │    id    = MAX(id) + 1                   (10000 on an empty table)     │
//! │    INSERT ... (id, code, ...)                                           │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  Two creators reading the same max both try the same code. The loser  │
//! │  hits UNIQUE(sequential_number) or a stale snapshot, rolls back and    │
//! │  re-reads, so committed codes stay distinct and gapless.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::info;

use crate::error::{EngineError, EngineResult};
use crate::retry::with_retry;
use crate::Engine;
use otop_core::sequence::next_product_id;
use otop_core::validation::{
    validate_new_otop_product, validate_new_product, validate_new_supplier,
    validate_product_update,
};
use otop_core::{
    CatalogTable, Category, CoreError, NewOtopProduct, NewProduct, NewSupplier, Principal,
    Product, ProductUpdate, Role, Supplier,
};
use otop_db::{CatalogStore, DbError, StockWrite};

/// Fields of a product about to be inserted, before id and code exist.
struct ProductDraft<'a> {
    name: &'a str,
    description: Option<&'a str>,
    category: Category,
    price_cents: i64,
    quantity: i64,
    supplier_id: i64,
    store_name: &'a str,
}

/// Maps a unique violation on the marketplace description to `Duplicate`.
fn description_taken(err: DbError, description: Option<&str>) -> EngineError {
    if err.is_unique_violation_on("otop_products.description") {
        CoreError::duplicate("description", description.unwrap_or_default()).into()
    } else {
        err.into()
    }
}

/// Allocates the next id and display code of `table` and inserts the draft.
async fn insert_next(
    conn: &mut SqliteConnection,
    table: CatalogTable,
    draft: &ProductDraft<'_>,
) -> EngineResult<Product> {
    let store = CatalogStore::new(table);
    let codes = store.sequential_numbers(conn).await?;
    let id = next_product_id(store.max_id(conn).await?);
    let now = Utc::now();

    let product = Product {
        id,
        sequential_number: table
            .sequence_scope()
            .next_code(codes.iter().map(String::as_str)),
        name: draft.name.to_string(),
        description: draft.description.map(str::to_string),
        category: draft.category,
        price_cents: draft.price_cents,
        quantity: draft.quantity,
        supplier_id: Some(draft.supplier_id),
        store_name: Some(draft.store_name.to_string()),
        created_at: now,
        updated_at: now,
    };

    store
        .insert(conn, &product)
        .await
        .map_err(|e| description_taken(e, draft.description))?;
    Ok(product)
}

impl Engine {
    // =========================================================================
    // Suppliers
    // =========================================================================

    /// Registers a store. Store names are unique.
    pub async fn register_supplier(&self, new: NewSupplier) -> EngineResult<Supplier> {
        validate_new_supplier(&new)?;
        let repo = self.db.suppliers();
        let store_name = new.store_name.trim();

        let mut conn = self.db.acquire().await?;
        if repo.get_by_store_name(&mut conn, store_name).await?.is_some() {
            return Err(CoreError::duplicate("store_name", store_name).into());
        }

        let supplier = repo
            .insert(&mut conn, &new, Utc::now())
            .await
            .map_err(|e| {
                if e.is_unique_violation_on("suppliers.store_name") {
                    CoreError::duplicate("store_name", store_name).into()
                } else {
                    EngineError::from(e)
                }
            })?;

        info!(supplier_id = supplier.id, store = %supplier.store_name, "Supplier registered");
        Ok(supplier)
    }

    pub async fn get_supplier(&self, id: i64) -> EngineResult<Supplier> {
        let mut conn = self.db.acquire().await?;
        self.db
            .suppliers()
            .get(&mut conn, id)
            .await?
            .ok_or_else(|| CoreError::SupplierNotFound(id.to_string()).into())
    }

    // =========================================================================
    // Product Creation
    // =========================================================================

    /// A supplier adds a product to their own catalog.
    ///
    /// The product gets the next id and the next `P-` code.
    pub async fn add_product(&self, principal: Principal, new: NewProduct) -> EngineResult<Product> {
        principal.require_any(&[Role::Supplier], "add products")?;
        let category = validate_new_product(&new)?;

        let product = with_retry(&self.retry, "add_product", || {
            self.add_product_once(principal.id, &new, category)
        })
        .await?;

        info!(
            product_id = product.id,
            code = %product.sequential_number,
            supplier_id = principal.id,
            "Product added"
        );
        Ok(product)
    }

    async fn add_product_once(
        &self,
        supplier_id: i64,
        new: &NewProduct,
        category: Category,
    ) -> EngineResult<Product> {
        let mut tx = self.db.begin().await?;

        let supplier = self
            .db
            .suppliers()
            .get(&mut tx, supplier_id)
            .await?
            .ok_or_else(|| CoreError::SupplierNotFound(supplier_id.to_string()))?;

        let draft = ProductDraft {
            name: new.name.trim(),
            description: new.description.as_deref().map(str::trim),
            category,
            price_cents: new.price_cents,
            quantity: new.quantity,
            supplier_id: supplier.id,
            store_name: &supplier.store_name,
        };
        let product = insert_next(&mut tx, CatalogTable::Products, &draft).await?;

        tx.commit().await?;
        Ok(product)
    }

    /// An admin lists a marketplace product for the store named in the
    /// payload.
    ///
    /// ## Errors
    /// - `Duplicate` when another marketplace product has the description
    /// - `SupplierNotFound` when no store has the name
    pub async fn create_otop_product(
        &self,
        principal: Principal,
        new: NewOtopProduct,
    ) -> EngineResult<Product> {
        principal.require_any(&[Role::Admin], "list marketplace products")?;
        let category = validate_new_otop_product(&new)?;

        let product = with_retry(&self.retry, "create_otop_product", || {
            self.create_otop_product_once(&new, category)
        })
        .await?;

        info!(
            product_id = product.id,
            code = %product.sequential_number,
            store = %new.store_name.trim(),
            "Marketplace product listed"
        );
        Ok(product)
    }

    async fn create_otop_product_once(
        &self,
        new: &NewOtopProduct,
        category: Category,
    ) -> EngineResult<Product> {
        let mut tx = self.db.begin().await?;
        let description = new.description.trim();

        if self
            .db
            .catalog(CatalogTable::OtopProducts)
            .description_exists(&mut tx, description)
            .await?
        {
            return Err(CoreError::duplicate("description", description).into());
        }

        let supplier = self
            .db
            .suppliers()
            .get_by_store_name(&mut tx, &new.store_name)
            .await?
            .ok_or_else(|| CoreError::SupplierNotFound(new.store_name.trim().to_string()))?;

        let draft = ProductDraft {
            name: new.name.trim(),
            description: Some(description),
            category,
            price_cents: new.price_cents,
            quantity: new.quantity,
            supplier_id: supplier.id,
            store_name: &supplier.store_name,
        };
        let product = insert_next(&mut tx, CatalogTable::OtopProducts, &draft).await?;

        tx.commit().await?;
        Ok(product)
    }

    // =========================================================================
    // Product Edits
    // =========================================================================

    /// The owning supplier edits a product, including an explicit stock level.
    ///
    /// The write is conditioned on the quantity read in the same unit of
    /// work, so a concurrent reservation forces a re-run instead of being
    /// overwritten.
    pub async fn update_product(
        &self,
        principal: Principal,
        table: CatalogTable,
        id: i64,
        update: ProductUpdate,
    ) -> EngineResult<Product> {
        let category = validate_product_update(table, &update)?;

        let product = with_retry(&self.retry, "update_product", || {
            self.update_product_once(principal, table, id, &update, category)
        })
        .await?;

        info!(table = table.table_name(), product_id = id, quantity = product.quantity, "Product updated");
        Ok(product)
    }

    async fn update_product_once(
        &self,
        principal: Principal,
        table: CatalogTable,
        id: i64,
        update: &ProductUpdate,
        category: Category,
    ) -> EngineResult<Product> {
        let store = self.db.catalog(table);
        let mut tx = self.db.begin().await?;

        let current = store
            .get(&mut tx, id)
            .await?
            .ok_or(CoreError::ProductNotFound(id))?;
        principal.require_supplier(current.supplier_id, "edit this product")?;

        let description = update.description.as_deref().map(str::trim);
        let write = store
            .update_details(
                &mut tx,
                id,
                current.quantity,
                update.name.trim(),
                description,
                category,
                update.price_cents,
                update.quantity,
                Utc::now(),
            )
            .await
            .map_err(|e| description_taken(e, description))?;

        if write == StockWrite::Conflict {
            return Err(EngineError::WriteConflict {
                table: table.table_name(),
                id,
            });
        }

        let updated = store
            .get(&mut tx, id)
            .await?
            .ok_or(CoreError::ProductNotFound(id))?;
        tx.commit().await?;
        Ok(updated)
    }

    /// The owning supplier removes a product.
    ///
    /// A supplier product that still backs pending orders is refused with
    /// `ProductInUse`; confirm or delete those orders first.
    pub async fn delete_product(
        &self,
        principal: Principal,
        table: CatalogTable,
        id: i64,
    ) -> EngineResult<()> {
        with_retry(&self.retry, "delete_product", || {
            self.delete_product_once(principal, table, id)
        })
        .await?;

        info!(table = table.table_name(), product_id = id, "Product deleted");
        Ok(())
    }

    async fn delete_product_once(
        &self,
        principal: Principal,
        table: CatalogTable,
        id: i64,
    ) -> EngineResult<()> {
        let store = self.db.catalog(table);
        let mut tx = self.db.begin().await?;

        let product = store
            .get(&mut tx, id)
            .await?
            .ok_or(CoreError::ProductNotFound(id))?;
        principal.require_supplier(product.supplier_id, "delete this product")?;

        if table == CatalogTable::Products {
            let pending_orders = self.db.orders().count_pending_for_product(&mut tx, id).await?;
            if pending_orders > 0 {
                return Err(CoreError::ProductInUse {
                    product_id: id,
                    pending_orders,
                }
                .into());
            }
        }

        store.delete(&mut tx, id).await?;
        tx.commit().await?;
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get_product(&self, table: CatalogTable, id: i64) -> EngineResult<Product> {
        let mut conn = self.db.acquire().await?;
        self.db
            .catalog(table)
            .get(&mut conn, id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(id).into())
    }

    pub async fn list_products(&self, table: CatalogTable) -> EngineResult<Vec<Product>> {
        let mut conn = self.db.acquire().await?;
        Ok(self.db.catalog(table).list(&mut conn).await?)
    }

    pub async fn products_for_supplier(
        &self,
        table: CatalogTable,
        supplier_id: i64,
    ) -> EngineResult<Vec<Product>> {
        let mut conn = self.db.acquire().await?;
        Ok(self
            .db
            .catalog(table)
            .list_by_supplier(&mut conn, supplier_id)
            .await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use crate::error::{ApiError, ErrorCode};
    use otop_core::{NewOrder, OrderStatus, ValidationError};
    use std::collections::HashSet;

    fn new_product(name: &str, quantity: i64) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            description: Some("Sticky rice".to_string()),
            category: "Food".to_string(),
            price_cents: 4500,
            quantity,
        }
    }

    fn listing(description: &str, store_name: &str) -> NewOtopProduct {
        NewOtopProduct {
            name: "Silk Scarf".to_string(),
            description: description.to_string(),
            category: "Non-Food".to_string(),
            price_cents: 89000,
            quantity: 12,
            store_name: store_name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_store_names_are_unique() {
        let engine = test_support::engine().await;
        test_support::supplier(&engine, "Lamphun Silk").await;

        let err = engine
            .register_supplier(NewSupplier {
                store_name: "  Lamphun Silk ".to_string(),
                owner_name: None,
                email: None,
                phone: None,
                address: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::Duplicate { .. })));
    }

    #[tokio::test]
    async fn test_add_product_allocates_codes() {
        let engine = test_support::engine().await;
        let supplier = test_support::supplier(&engine, "Lamphun Silk").await;

        let first = engine
            .add_product(Principal::supplier(supplier), new_product("Rice", 10))
            .await
            .unwrap();
        let second = engine
            .add_product(Principal::supplier(supplier), new_product("Chili Paste", 5))
            .await
            .unwrap();

        assert_eq!(first.id, 10000);
        assert_eq!(first.sequential_number, "P-10001");
        assert_eq!(first.store_name.as_deref(), Some("Lamphun Silk"));
        assert_eq!(second.id, 10001);
        assert_eq!(second.sequential_number, "P-10002");
    }

    #[tokio::test]
    async fn test_add_product_requires_supplier_role() {
        let engine = test_support::engine().await;

        let err = engine
            .add_product(Principal::cashier(1), new_product("Rice", 10))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::Forbidden { .. })));
        assert!(engine.list_products(CatalogTable::Products).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_otop_product() {
        let engine = test_support::engine().await;
        test_support::supplier(&engine, "Lamphun Silk").await;
        let admin = Principal::admin(1);

        let product = engine
            .create_otop_product(admin, listing("Hand-woven silk", "Lamphun Silk"))
            .await
            .unwrap();
        assert_eq!(product.sequential_number, "SP-0001");
        assert_eq!(product.category, Category::NonFood);

        let duplicate = engine
            .create_otop_product(admin, listing("Hand-woven silk", "Lamphun Silk"))
            .await
            .unwrap_err();
        assert!(matches!(duplicate, EngineError::Core(CoreError::Duplicate { .. })));

        let unknown = engine
            .create_otop_product(admin, listing("Cotton scarf", "Nowhere Store"))
            .await
            .unwrap_err();
        assert!(matches!(unknown, EngineError::Core(CoreError::SupplierNotFound(_))));

        let forbidden = engine
            .create_otop_product(Principal::cashier(2), listing("Cotton scarf", "Lamphun Silk"))
            .await
            .unwrap_err();
        assert!(matches!(forbidden, EngineError::Core(CoreError::Forbidden { .. })));
    }

    #[tokio::test]
    async fn test_only_owner_edits() {
        let engine = test_support::engine().await;
        let owner = test_support::supplier(&engine, "Lamphun Silk").await;
        let other = test_support::supplier(&engine, "Nan Coffee").await;
        let product = test_support::catalog_product(&engine, Some(owner), 1000, 4).await;

        let update = ProductUpdate {
            name: "Jasmine Rice".to_string(),
            description: None,
            category: "Food".to_string(),
            price_cents: 1200,
            quantity: 40,
        };

        let err = engine
            .update_product(Principal::supplier(other), CatalogTable::Products, product, update.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::Forbidden { .. })));

        let updated = engine
            .update_product(Principal::supplier(owner), CatalogTable::Products, product, update)
            .await
            .unwrap();
        assert_eq!(updated.name, "Jasmine Rice");
        assert_eq!(updated.quantity, 40);
        assert_eq!(updated.price_cents, 1200);
    }

    #[tokio::test]
    async fn test_marketplace_edit_keeps_description() {
        let engine = test_support::engine().await;
        let owner = test_support::supplier(&engine, "Lamphun Silk").await;
        let product = test_support::otop_product(&engine, Some(owner), 1000, 4).await;

        let err = engine
            .update_product(
                Principal::supplier(owner),
                CatalogTable::OtopProducts,
                product,
                ProductUpdate {
                    name: "Silk Scarf".to_string(),
                    description: None,
                    category: "Non-Food".to_string(),
                    price_cents: 1200,
                    quantity: 9,
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(
            &err,
            EngineError::Core(CoreError::Validation(ValidationError::Required { field }))
                if field == "description"
        ));
        assert_eq!(ApiError::from(err).code, ErrorCode::InvalidInput);

        let unchanged = engine
            .get_product(CatalogTable::OtopProducts, product)
            .await
            .unwrap();
        assert_eq!(unchanged.price_cents, 1000);
        assert_eq!(unchanged.quantity, 4);
    }

    #[tokio::test]
    async fn test_delete_refused_while_orders_pending() {
        let engine = test_support::engine().await;
        let owner = test_support::supplier(&engine, "Lamphun Silk").await;
        let product = test_support::catalog_product(&engine, Some(owner), 1000, 10).await;

        let order = engine
            .create_order(
                Principal::admin(1),
                NewOrder {
                    product_id: product,
                    quantity: 2,
                    description: None,
                },
            )
            .await
            .unwrap();

        let err = engine
            .delete_product(Principal::supplier(owner), CatalogTable::Products, product)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::ProductInUse {
                pending_orders: 1,
                ..
            })
        ));

        let confirmed = engine
            .confirm_order(Principal::supplier(owner), order.id)
            .await
            .unwrap();
        assert_eq!(confirmed.status, OrderStatus::Verified);

        engine
            .delete_product(Principal::supplier(owner), CatalogTable::Products, product)
            .await
            .unwrap();
        assert!(matches!(
            engine.get_product(CatalogTable::Products, product).await,
            Err(EngineError::Core(CoreError::ProductNotFound(_)))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creation_keeps_codes_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let engine = test_support::file_engine(dir.path(), 4).await;
        let supplier = test_support::supplier(&engine, "Lamphun Silk").await;

        let mut handles = Vec::new();
        for n in 0..8 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine
                    .add_product(Principal::supplier(supplier), new_product(&format!("Item {}", n), 1))
                    .await
                    .unwrap()
            }));
        }

        let mut codes = HashSet::new();
        let mut ids = HashSet::new();
        for handle in handles {
            let product = handle.await.unwrap();
            codes.insert(product.sequential_number);
            ids.insert(product.id);
        }

        let expected: HashSet<String> = (10001..=10008).map(|n| format!("P-{}", n)).collect();
        assert_eq!(codes, expected);
        assert_eq!(ids.len(), 8);
    }
}
