//! # POS Checkout
//!
//! Settles a multi-line cart in one unit of work and returns a receipt.
//!
//! ## Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           checkout(cart)                                │
//! │                                                                         │
//! │  role / payload / received ≥ expected_total      (nothing read yet)    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN ─► idempotency key already stored? ──yes──► same cart?          │
//! │       │                          yes: stored receipt (replayed = true)  │
//! │       │                          no:  Duplicate, nothing reserved       │
//! │       ▼ no                                                              │
//! │  reserve every line ──── any miss ──► roll back, no receipt            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  attribute: distinct suppliers, lowest id on the header                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  INSERT header, items, transaction_suppliers; purchased += 1 each      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT ─► Receipt { id, date, items, total, received, change }        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::{info, warn};

use crate::error::EngineResult;
use crate::ledger::StockLedger;
use crate::retry::with_retry;
use crate::Engine;
use otop_core::checkout::{
    attribute, check_payment, format_receipt_date, lines_total, same_settlement,
};
use otop_core::validation::{normalize_idempotency_key, validate_checkout};
use otop_core::{
    CatalogTable, CheckoutRequest, CoreError, Money, Principal, Receipt, Reservation, Role,
    Transaction, ValidationError,
};
use otop_db::{NewTransactionItemRow, NewTransactionRow};

impl Engine {
    /// Settles a cart.
    ///
    /// Either every line is reserved and the transaction with its items is
    /// stored, or nothing changes. A request carrying an idempotency key
    /// that was already settled gets the stored receipt back.
    ///
    /// ## Errors
    /// - `InsufficientPayment` when `received_cents < expected_total_cents`
    /// - `ProductNotFound` / `InsufficientStock` for the first failing line
    /// - `NoValidSupplier` when no line belongs to a supplier
    /// - `Duplicate` when the idempotency key already settled a different cart
    pub async fn checkout(
        &self,
        principal: Principal,
        request: &CheckoutRequest,
    ) -> EngineResult<Receipt> {
        principal.require_any(&[Role::Admin, Role::Cashier], "check out carts")?;
        if request.lines.is_empty() {
            return Err(ValidationError::Required {
                field: "lines".to_string(),
            }
            .into());
        }
        validate_checkout(request)?;
        check_payment(
            Money::from_cents(request.received_cents),
            Money::from_cents(request.expected_total_cents),
        )?;

        let key = request
            .idempotency_key
            .as_deref()
            .map(normalize_idempotency_key)
            .transpose()?;

        let receipt = with_retry(&self.retry, "checkout", || {
            self.checkout_once(request, key.as_deref())
        })
        .await?;

        if receipt.replayed {
            info!(transaction_id = receipt.transaction_id, "Checkout replayed");
        } else {
            info!(
                transaction_id = receipt.transaction_id,
                lines = receipt.items.len(),
                total_cents = receipt.total_cents,
                change_cents = receipt.change_cents,
                cashier = principal.id,
                "Checkout settled"
            );
        }
        Ok(receipt)
    }

    async fn checkout_once(
        &self,
        request: &CheckoutRequest,
        key: Option<&str>,
    ) -> EngineResult<Receipt> {
        let transactions = self.db.transactions();
        let suppliers = self.db.suppliers();
        let ledger = StockLedger::new(CatalogTable::OtopProducts);
        let mut tx = self.db.begin().await?;

        if let Some(key) = key {
            if let Some(existing) = transactions.find_by_idempotency_key(&mut tx, key).await? {
                let items = transactions.items(&mut tx, existing.id).await?;
                if !same_settlement(request, &existing, &items) {
                    warn!(
                        transaction_id = existing.id,
                        "Idempotency key reused for a different cart"
                    );
                    return Err(CoreError::duplicate("idempotency_key", key).into());
                }
                return self.receipt_of(&mut tx, existing, true).await;
            }
        }

        let mut reservations: Vec<Reservation> = Vec::with_capacity(request.lines.len());
        for line in &request.lines {
            reservations.push(ledger.reserve(&mut tx, line.product_id, line.quantity).await?);
        }

        let attribution = attribute(&reservations)?;

        let computed = lines_total(&reservations)?;
        if computed.cents() != request.expected_total_cents {
            warn!(
                expected_total_cents = request.expected_total_cents,
                computed_cents = computed.cents(),
                "Cart total differs from the reserved lines"
            );
        }

        let created_at = Utc::now();
        let header = transactions
            .insert_header(
                &mut tx,
                &NewTransactionRow {
                    supplier_id: Some(attribution.primary),
                    total_cents: request.expected_total_cents,
                    received_cents: request.received_cents,
                    change_cents: request.received_cents - request.expected_total_cents,
                    idempotency_key: key,
                    created_at,
                },
            )
            .await?;

        let mut items = Vec::with_capacity(reservations.len());
        for reservation in &reservations {
            let item = transactions
                .insert_item(
                    &mut tx,
                    header.id,
                    &NewTransactionItemRow {
                        product_id: reservation.product_id,
                        product_name: &reservation.product_name,
                        supplier_id: reservation.supplier_id,
                        quantity: reservation.quantity,
                        price_cents: reservation.unit_price_cents,
                        subtotal_cents: reservation.line_total()?.cents(),
                    },
                )
                .await?;
            items.push(item);
        }

        for &supplier_id in &attribution.suppliers {
            transactions.link_supplier(&mut tx, header.id, supplier_id).await?;
            suppliers.increment_purchased(&mut tx, supplier_id, 1).await?;
        }

        tx.commit().await?;

        Ok(Receipt {
            transaction_id: header.id,
            date: format_receipt_date(created_at),
            items,
            total_cents: header.total_cents,
            received_cents: header.received_cents,
            change_cents: header.change_cents,
            supplier_id: header.supplier_id,
            supplier_ids: attribution.suppliers,
            replayed: false,
        })
    }

    /// Rebuilds the receipt of a settled checkout.
    pub async fn get_receipt(&self, transaction_id: i64) -> EngineResult<Receipt> {
        let mut conn = self.db.acquire().await?;
        let header = self
            .db
            .transactions()
            .get(&mut conn, transaction_id)
            .await?
            .ok_or(CoreError::TransactionNotFound(transaction_id))?;
        self.receipt_of(&mut conn, header, false).await
    }

    async fn receipt_of(
        &self,
        conn: &mut SqliteConnection,
        header: Transaction,
        replayed: bool,
    ) -> EngineResult<Receipt> {
        let transactions = self.db.transactions();
        let items = transactions.items(conn, header.id).await?;
        let supplier_ids = transactions.supplier_ids(conn, header.id).await?;

        Ok(Receipt {
            transaction_id: header.id,
            date: format_receipt_date(header.created_at),
            items,
            total_cents: header.total_cents,
            received_cents: header.received_cents,
            change_cents: header.change_cents,
            supplier_id: header.supplier_id,
            supplier_ids,
            replayed,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
